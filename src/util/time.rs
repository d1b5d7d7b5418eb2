//! Time utilities for game simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Simulation ticks per second for every match
pub const FRAME_RATE: u32 = 60;
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / FRAME_RATE as u64;

/// Wall-clock time between two ticks of a match
pub fn tick_period() -> Duration {
    Duration::from_micros(TICK_DURATION_MICROS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_period_is_sixty_hertz() {
        assert_eq!(tick_period(), Duration::from_micros(16_666));
    }

    #[test]
    fn uptime_starts_after_init() {
        init_server_time();
        assert!(uptime_secs() < 60);
        assert!(unix_millis() > 0);
    }
}
