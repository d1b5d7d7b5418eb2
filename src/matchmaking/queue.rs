//! Single-seat waiting slot

use std::time::{Duration, Instant};

use crate::ws::ConnId;

/// Connection waiting for an opponent
#[derive(Debug, Clone, Copy)]
pub struct WaitingPlayer {
    pub conn_id: ConnId,
    pub queued_at: Instant,
}

impl WaitingPlayer {
    pub fn new(conn_id: ConnId) -> Self {
        Self {
            conn_id,
            queued_at: Instant::now(),
        }
    }

    /// How long this player has been waiting
    pub fn wait_time(&self) -> Duration {
        self.queued_at.elapsed()
    }
}

/// Holds at most one unmatched connection
#[derive(Debug, Default)]
pub struct WaitingSlot {
    occupant: Option<WaitingPlayer>,
}

impl WaitingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seat a player, returning whoever was displaced
    pub fn occupy(&mut self, player: WaitingPlayer) -> Option<WaitingPlayer> {
        self.occupant.replace(player)
    }

    /// Empty the slot
    pub fn take(&mut self) -> Option<WaitingPlayer> {
        self.occupant.take()
    }

    /// Empty the slot only if `conn_id` holds it
    pub fn remove(&mut self, conn_id: ConnId) -> Option<WaitingPlayer> {
        if self.contains(conn_id) {
            self.occupant.take()
        } else {
            None
        }
    }

    pub fn contains(&self, conn_id: ConnId) -> bool {
        self.occupant.is_some_and(|p| p.conn_id == conn_id)
    }

    pub fn occupant(&self) -> Option<ConnId> {
        self.occupant.map(|p| p.conn_id)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.occupant.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_one_player() {
        let mut slot = WaitingSlot::new();
        assert!(slot.is_empty());

        let a = ConnId::new();
        assert!(slot.occupy(WaitingPlayer::new(a)).is_none());
        assert!(slot.contains(a));
        assert_eq!(slot.occupant(), Some(a));

        let taken = slot.take().map(|p| p.conn_id);
        assert_eq!(taken, Some(a));
        assert!(slot.is_empty());
    }

    #[test]
    fn remove_ignores_other_connections() {
        let mut slot = WaitingSlot::new();
        let a = ConnId::new();
        slot.occupy(WaitingPlayer::new(a));

        assert!(slot.remove(ConnId::new()).is_none());
        assert!(slot.contains(a));
        assert!(slot.remove(a).is_some());
        assert!(slot.is_empty());
    }
}
