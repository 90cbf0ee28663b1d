//! NATS log-change notification publisher.
//!
//! After a write commits, the server publishes a small notification on
//! `<prefix>.<main_db_id>` so dashboards can refresh the affected record.
//! Subscribers fetch the rows themselves through the REST API.

use async_nats::jetstream::{self, Context};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::models::ApplicationLogEntry;

/// Default JetStream stream name.
pub const DEFAULT_STREAM: &str = "regflow_application_logs";

#[derive(Debug, Error)]
pub enum NatsError {
    #[error("JetStream error: {0}")]
    JetStream(String),

    #[error("Publish error: {0}")]
    Publish(String),
}

/// What happened to the log chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogChangeKind {
    Transition,
    Created,
    Updated,
    Deleted,
}

/// Notification message published to NATS.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogNotification {
    pub main_db_id: i64,
    pub kind: LogChangeKind,
    pub del_indexes: Vec<i64>,
    pub steps: Vec<String>,
    pub emitted_at: DateTime<Utc>,
}

impl LogNotification {
    pub fn from_entries(kind: LogChangeKind, main_db_id: i64, entries: &[ApplicationLogEntry]) -> Self {
        let mut steps: Vec<String> = Vec::new();
        for entry in entries {
            if !steps.contains(&entry.application_step) {
                steps.push(entry.application_step.clone());
            }
        }

        Self {
            main_db_id,
            kind,
            del_indexes: entries.iter().map(|e| e.del_index).collect(),
            steps,
            emitted_at: Utc::now(),
        }
    }
}

/// Subject a notification for `main_db_id` is published on.
pub fn subject_for(prefix: &str, main_db_id: i64) -> String {
    format!("{}.{}", prefix, main_db_id)
}

/// JetStream publisher for log notifications.
///
/// Optional: the server runs without NATS and simply skips publishing.
#[derive(Clone)]
pub struct LogPublisher {
    js: Context,
    prefix: String,
}

impl LogPublisher {
    /// Create a publisher and make sure its stream exists.
    pub async fn new(client: async_nats::Client, prefix: &str) -> Result<Self, NatsError> {
        let js = jetstream::new(client);
        Self::ensure_stream(&js, DEFAULT_STREAM, prefix).await?;

        Ok(Self {
            js,
            prefix: prefix.to_string(),
        })
    }

    async fn ensure_stream(js: &Context, stream: &str, prefix: &str) -> Result<(), NatsError> {
        match js.get_stream(stream).await {
            Ok(_) => {
                tracing::debug!(stream = %stream, "Using existing NATS stream");
                Ok(())
            }
            Err(_) => {
                let config = jetstream::stream::Config {
                    name: stream.to_string(),
                    subjects: vec![format!("{}.>", prefix)],
                    max_age: std::time::Duration::from_secs(24 * 3600),
                    storage: jetstream::stream::StorageType::File,
                    ..Default::default()
                };

                js.create_stream(config)
                    .await
                    .map_err(|e| NatsError::JetStream(e.to_string()))?;

                tracing::info!(stream = %stream, prefix = %prefix, "Created NATS stream");
                Ok(())
            }
        }
    }

    pub async fn publish(&self, notification: &LogNotification) -> Result<(), NatsError> {
        let payload = serde_json::to_vec(notification)
            .map_err(|e| NatsError::Publish(format!("Serialization error: {}", e)))?;

        self.js
            .publish(subject_for(&self.prefix, notification.main_db_id), payload.into())
            .await
            .map_err(|e| NatsError::Publish(e.to_string()))?
            .await
            .map_err(|e| NatsError::Publish(e.to_string()))?;

        tracing::debug!(
            main_db_id = notification.main_db_id,
            kind = ?notification.kind,
            del_indexes = ?notification.del_indexes,
            "Published log notification"
        );

        Ok(())
    }
}
