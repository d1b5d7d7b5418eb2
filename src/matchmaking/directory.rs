//! Session directory - waiting slot, match table and per-connection routing

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::game::{spawn_ticker, Match, MatchId, MatchIdGenerator, Slot, TickHandle, TickOutcome};
use crate::ws::protocol::{GameState, ServerMsg};
use crate::ws::ConnId;

use super::outbound::{self, Outbound, OutboundStream};
use super::queue::{WaitingPlayer, WaitingSlot};

/// Result of a join request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Connection now holds the waiting slot
    Waiting,
    /// Connection was already waiting; notice re-sent
    AlreadyWaiting,
    /// Paired; the connection plays in `slot`
    Matched { match_id: MatchId, slot: Slot },
    /// Connection is in a running match; request ignored
    AlreadyInMatch(MatchId),
}

/// Result of a disconnect
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisconnectOutcome {
    /// Connection was waiting, slot cleared
    LeftQueue,
    /// Connection's match was torn down
    MatchEnded { match_id: MatchId, final_state: GameState },
    /// Connection had no role
    Unknown,
}

/// Outbound delivery failure
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("connection {0} is not registered")]
    Unknown(ConnId),

    #[error("connection {0} is closed")]
    Closed(ConnId),
}

#[derive(Debug, Clone, Copy)]
struct Membership {
    match_id: MatchId,
    slot: Slot,
}

/// Everything the directory guards with its single lock
struct DirectoryInner {
    waiting: WaitingSlot,
    matches: HashMap<MatchId, Match>,
    memberships: HashMap<ConnId, Membership>,
    connections: HashMap<ConnId, Outbound>,
    ids: MatchIdGenerator,
}

impl DirectoryInner {
    fn new() -> Self {
        Self {
            waiting: WaitingSlot::new(),
            matches: HashMap::new(),
            memberships: HashMap::new(),
            connections: HashMap::new(),
            ids: MatchIdGenerator::new(),
        }
    }

    fn deliver(&self, conn_id: ConnId, msg: ServerMsg) -> Result<(), DeliveryError> {
        self.connections
            .get(&conn_id)
            .ok_or(DeliveryError::Unknown(conn_id))?
            .send(msg)
            .map_err(|_| DeliveryError::Closed(conn_id))
    }

    fn deliver_or_log(&self, conn_id: ConnId, msg: ServerMsg) {
        if let Err(e) = self.deliver(conn_id, msg) {
            debug!(conn_id = %conn_id, error = %e, "Outbound message not delivered");
        }
    }

    /// One scheduled tick for `match_id`. Breaks once the match is gone.
    fn run_tick(&mut self, match_id: MatchId) -> ControlFlow<()> {
        let Some(game) = self.matches.get_mut(&match_id) else {
            return ControlFlow::Break(());
        };

        if let TickOutcome::Point(slot) = game.step() {
            debug!(
                match_id = %match_id,
                scorer = slot.number(),
                score1 = game.state.score1,
                score2 = game.state.score2,
                "Point scored"
            );
        }

        let state = game.state;
        let participants = game.participants();
        for conn_id in participants {
            if let Some(outbound) = self.connections.get(&conn_id) {
                outbound.publish(state);
            }
        }

        ControlFlow::Continue(())
    }
}

/// Owner of all matchmaking state.
///
/// Cheap to clone; clones share the same state. Every operation, and every
/// scheduled tick, runs under one lock, so ticks for a match never overlap
/// and a torn-down match never ticks again.
#[derive(Clone)]
pub struct SessionDirectory {
    inner: Arc<Mutex<DirectoryInner>>,
    tick_period: Duration,
}

impl SessionDirectory {
    pub fn new(tick_period: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DirectoryInner::new())),
            tick_period,
        }
    }

    /// Register a new connection and hand back its outbound stream
    pub fn connect(&self) -> (ConnId, OutboundStream) {
        let conn_id = ConnId::new();
        let (tx, rx) = outbound::channel();
        self.inner.lock().connections.insert(conn_id, tx);
        (conn_id, rx)
    }

    /// Pair `conn_id` with the waiting connection, or make it wait
    pub fn request_match(&self, conn_id: ConnId) -> JoinOutcome {
        let mut inner = self.inner.lock();

        if let Some(membership) = inner.memberships.get(&conn_id) {
            return JoinOutcome::AlreadyInMatch(membership.match_id);
        }

        let opponent = match inner.waiting.take() {
            None => {
                inner.waiting.occupy(WaitingPlayer::new(conn_id));
                inner.deliver_or_log(conn_id, ServerMsg::waiting());
                info!(conn_id = %conn_id, "Player waiting for opponent");
                return JoinOutcome::Waiting;
            }
            Some(waiting) if waiting.conn_id == conn_id => {
                inner.waiting.occupy(waiting);
                inner.deliver_or_log(conn_id, ServerMsg::waiting());
                return JoinOutcome::AlreadyWaiting;
            }
            Some(waiting) => waiting,
        };

        let match_id = inner.ids.next_id();
        let seed = rand::random::<u64>();
        let mut game = Match::new(match_id, opponent.conn_id, conn_id, seed);
        game.attach_ticker(self.spawn_match_ticker(match_id));

        for slot in [Slot::One, Slot::Two] {
            inner
                .memberships
                .insert(game.participant(slot), Membership { match_id, slot });
        }
        let participants = game.participants();
        inner.matches.insert(match_id, game);

        for slot in [Slot::One, Slot::Two] {
            inner.deliver_or_log(
                participants[slot.index()],
                ServerMsg::StartGame {
                    room: match_id,
                    player_number: slot.number(),
                },
            );
        }

        info!(
            match_id = %match_id,
            player1 = %participants[0],
            player2 = %participants[1],
            seed,
            waited_ms = opponent.wait_time().as_millis() as u64,
            "Created new match"
        );

        JoinOutcome::Matched {
            match_id,
            slot: Slot::Two,
        }
    }

    /// Apply a paddle move. Stale or foreign input is ignored.
    pub fn handle_input(&self, conn_id: ConnId, match_id: MatchId, position: f32) {
        let mut inner = self.inner.lock();

        let Some(game) = inner.matches.get_mut(&match_id) else {
            debug!(conn_id = %conn_id, match_id = %match_id, "Input for unknown match");
            return;
        };

        let Some(slot) = game.slot_of(conn_id) else {
            debug!(conn_id = %conn_id, match_id = %match_id, "Input from non-participant");
            return;
        };

        game.set_paddle(slot, position);
    }

    /// Tear down whatever `conn_id` was part of and forget the connection
    pub fn handle_disconnect(&self, conn_id: ConnId) -> DisconnectOutcome {
        let mut inner = self.inner.lock();
        inner.connections.remove(&conn_id);

        if inner.waiting.remove(conn_id).is_some() {
            info!(conn_id = %conn_id, "Waiting player left");
            return DisconnectOutcome::LeftQueue;
        }

        let Some(membership) = inner.memberships.remove(&conn_id) else {
            return DisconnectOutcome::Unknown;
        };

        let Some(mut game) = inner.matches.remove(&membership.match_id) else {
            return DisconnectOutcome::Unknown;
        };

        let was_running = game.stop();

        let opponent = game.participant(membership.slot.opponent());
        if let Some(outbound) = inner.connections.get(&opponent) {
            outbound.clear_state();
        }
        inner.deliver_or_log(opponent, ServerMsg::opponent_left());
        inner.memberships.remove(&opponent);

        info!(
            match_id = %game.id,
            conn_id = %conn_id,
            ticks = game.tick,
            seed = game.seed,
            was_running,
            score1 = game.state.score1,
            score2 = game.state.score2,
            "Player disconnected, match removed"
        );

        DisconnectOutcome::MatchEnded {
            match_id: game.id,
            final_state: game.state,
        }
    }

    /// Send a message to one connection
    pub fn send_to(&self, conn_id: ConnId, msg: ServerMsg) -> Result<(), DeliveryError> {
        self.inner.lock().deliver(conn_id, msg)
    }

    /// Connection currently holding the waiting slot
    pub fn waiting(&self) -> Option<ConnId> {
        self.inner.lock().waiting.occupant()
    }

    /// Match and slot of a connection
    #[cfg(test)]
    pub fn match_of(&self, conn_id: ConnId) -> Option<(MatchId, Slot)> {
        self.inner
            .lock()
            .memberships
            .get(&conn_id)
            .map(|m| (m.match_id, m.slot))
    }

    /// Current simulation state of a match
    #[cfg(test)]
    pub fn match_state(&self, match_id: MatchId) -> Option<GameState> {
        self.inner.lock().matches.get(&match_id).map(|m| m.state)
    }

    pub fn active_matches(&self) -> usize {
        self.inner.lock().matches.len()
    }

    pub fn connected(&self) -> usize {
        self.inner.lock().connections.len()
    }

    fn spawn_match_ticker(&self, match_id: MatchId) -> TickHandle {
        let shared: Weak<Mutex<DirectoryInner>> = Arc::downgrade(&self.inner);
        spawn_ticker(self.tick_period, move || {
            let Some(shared) = shared.upgrade() else {
                return ControlFlow::Break(());
            };
            let mut inner = shared.lock();
            inner.run_tick(match_id)
        })
    }
}
