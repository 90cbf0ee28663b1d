//! Application record model.
//!
//! Only the identity and status columns of the record table are modelled.
//! Establishment, product and fee fields travel in `payload` untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Row of `regflow.main_db`, resolved when log rows are listed by DTN.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: i64,

    /// Document Tracking Number.
    pub dtn: String,

    /// Record-level status exactly as stored.
    pub app_status: String,

    /// Opaque establishment/product payload.
    pub payload: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,
}
