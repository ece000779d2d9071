//! Shared application state handed to every route module.

use std::time::Instant;

use sprint_lifecycle::Services;

/// The wired domain components plus process metadata for health checks.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            start_time: Instant::now(),
        }
    }
}
