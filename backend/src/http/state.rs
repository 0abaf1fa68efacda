//! Application state for the HTTP server.

use std::sync::Arc;

use crate::db::repository::FullRepository;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Repository instance for database operations
    pub repository: Arc<dyn FullRepository>,
    /// Serve targets that are not yet published.
    pub include_unpublished: bool,
}

impl AppState {
    /// Create a new application state that only serves published targets.
    pub fn new(repository: Arc<dyn FullRepository>) -> Self {
        Self {
            repository,
            include_unpublished: false,
        }
    }

    pub fn with_unpublished(mut self, include_unpublished: bool) -> Self {
        self.include_unpublished = include_unpublished;
        self
    }
}
