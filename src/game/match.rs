//! Match state and lifecycle

use std::fmt;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::ws::protocol::GameState;
use crate::ws::ConnId;

use super::physics::{PhysicsSystem, TickOutcome};
use super::scheduler::TickHandle;
use super::Slot;

/// Identifier of a match, unique for the lifetime of the directory that made it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(u64);

impl MatchId {
    #[cfg(test)]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "match-{}", self.0)
    }
}

/// Monotonic match id source; ids are never reused
#[derive(Debug)]
pub struct MatchIdGenerator {
    next: u64,
}

impl MatchIdGenerator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_id(&mut self) -> MatchId {
        let id = MatchId(self.next);
        self.next += 1;
        id
    }
}

impl Default for MatchIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// One running two-player match
pub struct Match {
    pub id: MatchId,
    /// Participants indexed by slot
    participants: [ConnId; 2],
    pub state: GameState,
    /// Seed the match rng was built from
    pub seed: u64,
    /// Ticks simulated so far
    pub tick: u64,
    rng: ChaCha8Rng,
    ticker: Option<TickHandle>,
}

impl Match {
    /// `first` takes slot 1, `second` slot 2
    pub fn new(id: MatchId, first: ConnId, second: ConnId, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let state = PhysicsSystem::init_state(&mut rng);

        Self {
            id,
            participants: [first, second],
            state,
            seed,
            tick: 0,
            rng,
            ticker: None,
        }
    }

    pub fn participants(&self) -> [ConnId; 2] {
        self.participants
    }

    pub fn participant(&self, slot: Slot) -> ConnId {
        self.participants[slot.index()]
    }

    /// Slot held by `conn`, if it plays in this match
    pub fn slot_of(&self, conn: ConnId) -> Option<Slot> {
        [Slot::One, Slot::Two]
            .into_iter()
            .find(|slot| self.participant(*slot) == conn)
    }

    /// Move a paddle, clamped to the field. Returns the stored offset.
    pub fn set_paddle(&mut self, slot: Slot, position: f32) -> f32 {
        let clamped = PhysicsSystem::clamp_paddle(position);
        match slot {
            Slot::One => self.state.paddle1_y = clamped,
            Slot::Two => self.state.paddle2_y = clamped,
        }
        clamped
    }

    /// Run one simulation tick
    pub fn step(&mut self) -> TickOutcome {
        self.tick += 1;
        PhysicsSystem::tick(&mut self.state, &mut self.rng)
    }

    pub fn attach_ticker(&mut self, ticker: TickHandle) {
        if let Some(previous) = self.ticker.replace(ticker) {
            previous.cancel();
        }
    }

    /// Cancel the tick task. Returns false if it was not running.
    pub fn stop(&mut self) -> bool {
        match self.ticker.take() {
            Some(ticker) => {
                ticker.cancel();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_match() -> (Match, ConnId, ConnId) {
        let first = ConnId::new();
        let second = ConnId::new();
        let game = Match::new(MatchId::from_raw(1), first, second, 11);
        (game, first, second)
    }

    #[test]
    fn ids_are_monotonic() {
        let mut ids = MatchIdGenerator::new();
        let a = ids.next_id();
        let b = ids.next_id();
        assert_ne!(a, b);
        assert_eq!(a, MatchId::from_raw(1));
        assert_eq!(b.to_string(), "match-2");
    }

    #[test]
    fn slots_follow_join_order() {
        let (game, first, second) = new_match();
        assert_eq!(game.slot_of(first), Some(Slot::One));
        assert_eq!(game.slot_of(second), Some(Slot::Two));
        assert_eq!(game.slot_of(ConnId::new()), None);
        assert_eq!(game.participant(Slot::Two), second);
    }

    #[test]
    fn set_paddle_clamps_and_targets_slot() {
        let (mut game, _, _) = new_match();

        assert_eq!(game.set_paddle(Slot::One, -30.0), 0.0);
        assert_eq!(game.set_paddle(Slot::Two, 9_999.0), 500.0);
        assert_eq!(game.state.paddle1_y, 0.0);
        assert_eq!(game.state.paddle2_y, 500.0);

        game.set_paddle(Slot::Two, 42.0);
        assert_eq!(game.state.paddle2_y, 42.0);
        assert_eq!(game.state.paddle1_y, 0.0);
    }

    #[test]
    fn same_seed_same_match() {
        let first = ConnId::new();
        let second = ConnId::new();
        let mut a = Match::new(MatchId::from_raw(1), first, second, 1234);
        let mut b = Match::new(MatchId::from_raw(2), first, second, 1234);

        for _ in 0..1_000 {
            a.step();
            b.step();
        }
        assert_eq!(a.state, b.state);
        assert_eq!(a.tick, 1_000);
    }

    #[test]
    fn stop_without_ticker_is_noop() {
        let (mut game, _, _) = new_match();
        assert!(!game.stop());
    }
}
