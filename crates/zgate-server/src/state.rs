//! Shared application state.

use crate::config::Config;
use std::sync::Arc;
use zgate_core::{ProfileStore, SessionOrchestrator, SqliteProfileStore};

/// Shared application state.
pub struct AppState {
    pub orchestrator: Arc<SessionOrchestrator>,
    pub profiles: Arc<dyn ProfileStore>,
    pub config: Config,
}

impl AppState {
    /// Open the profile database and prepare the snapshot directory.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let profiles = Arc::new(SqliteProfileStore::open(&config.db_path)?);
        let orchestrator = Arc::new(SessionOrchestrator::new(config.orchestrator()?)?);

        Ok(Self {
            orchestrator,
            profiles,
            config,
        })
    }
}
