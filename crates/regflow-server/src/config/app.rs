//! Application configuration for the regflow server.

use std::path::PathBuf;

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// Environment variables are prefixed with `REGFLOW_`:
/// - `REGFLOW_HOST`: Server bind address (default: "0.0.0.0")
/// - `REGFLOW_PORT`: Server port (default: 8082)
/// - `REGFLOW_DEBUG`: Enable debug mode (default: false)
/// - `REGFLOW_SERVER_NAME`: Server name for identification
/// - `REGFLOW_NATS_URL`: NATS server for log notifications (optional)
/// - `REGFLOW_NATS_SUBJECT_PREFIX`: Notification subject prefix
/// - `REGFLOW_WORKFLOW_FILE`: YAML workflow definition replacing the built-in one
/// - `REGFLOW_AUTO_INIT_SCHEMA`: Apply the schema DDL at start-up (default: true)
/// - `REGFLOW_MAX_BULK_ENTRIES`: Upper bound for bulk creates (default: 100)
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub debug: bool,

    #[serde(default = "default_server_name")]
    pub server_name: String,

    #[serde(default)]
    pub nats_url: Option<String>,

    #[serde(default = "default_subject_prefix")]
    pub nats_subject_prefix: String,

    #[serde(default)]
    pub workflow_file: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub auto_init_schema: bool,

    #[serde(default = "default_max_bulk_entries")]
    pub max_bulk_entries: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_server_name() -> String {
    "regflow-server".to_string()
}

fn default_subject_prefix() -> String {
    "regflow.application_logs".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_bulk_entries() -> usize {
    100
}

impl AppConfig {
    /// Load configuration from `REGFLOW_*` environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("REGFLOW_").from_env::<AppConfig>()
    }

    /// Get the server bind address as a string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            debug: false,
            server_name: default_server_name(),
            nats_url: None,
            nats_subject_prefix: default_subject_prefix(),
            workflow_file: None,
            auto_init_schema: true,
            max_bulk_entries: default_max_bulk_entries(),
        }
    }
}
