//! Game simulation modules

pub mod r#match;
pub mod physics;
pub mod scheduler;

pub use r#match::{Match, MatchId, MatchIdGenerator};
pub use physics::TickOutcome;
pub use scheduler::{spawn_ticker, TickHandle};

/// A participant's side of the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Left paddle, first to have joined
    One,
    /// Right paddle
    Two,
}

impl Slot {
    /// Player number as sent to clients
    pub fn number(self) -> u8 {
        match self {
            Slot::One => 1,
            Slot::Two => 2,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Slot::One => 0,
            Slot::Two => 1,
        }
    }

    pub fn opponent(self) -> Slot {
        match self {
            Slot::One => Slot::Two,
            Slot::Two => Slot::One,
        }
    }
}
