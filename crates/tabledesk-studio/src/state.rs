use crate::config::StudioConfig;
use crate::session::Database;
use std::sync::Arc;
use tabledesk_core::SuggestionService;

/// Application state shared across all routes
#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub suggester: Arc<dyn SuggestionService>,
    pub config: StudioConfig,
}

impl AppState {
    pub fn new(config: StudioConfig, suggester: Arc<dyn SuggestionService>) -> Self {
        Self {
            database: Database::new(config.database.clone(), config.busy_timeout),
            suggester,
            config,
        }
    }
}
