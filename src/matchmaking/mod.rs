//! Matchmaking: pairing connections into matches and routing their traffic

pub mod directory;
pub mod outbound;
pub mod queue;

pub use directory::{JoinOutcome, SessionDirectory};
