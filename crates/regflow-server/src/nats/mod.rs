//! NATS JetStream integration.
//!
//! Publishes log-change notifications for dashboards.

pub mod publisher;

pub use publisher::{LogChangeKind, LogNotification, LogPublisher};
