//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::matchmaking::SessionDirectory;
use crate::util::time::tick_period;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: SessionDirectory,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            sessions: SessionDirectory::new(tick_period()),
        }
    }
}
