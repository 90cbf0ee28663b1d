//! Shared application state for the regflow server.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::workflow::WorkflowDefinition;

/// Shared resources handed to health and system handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,

    pub config: Arc<AppConfig>,

    pub workflow: Arc<WorkflowDefinition>,

    /// Whether a NATS publisher was set up at start-up.
    pub nats_connected: bool,

    /// Server start time for uptime calculation
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        db: DbPool,
        config: AppConfig,
        workflow: Arc<WorkflowDefinition>,
        nats_connected: bool,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            workflow,
            nats_connected,
            start_time: std::time::Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn has_nats(&self) -> bool {
        self.nats_connected
    }
}
