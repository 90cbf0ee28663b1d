//! Application log model for the workflow activity chain.
//!
//! Every step transition of an application appends one or more immutable
//! rows to `regflow.application_logs`. Rows are linked through `del_index`
//! (position in the per-application sequence) and `del_previous` (the
//! `del_index` this row succeeds).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{AppError, AppResult};

/// Status written on a row that closes the actor's step.
pub const STATUS_COMPLETED: &str = "COMPLETED";

/// Status written on a row that opens a step for the next actor.
pub const STATUS_IN_PROGRESS: &str = "IN PROGRESS";

/// Open/close marker of a log row.
///
/// Stored twice for compatibility with existing consumers: as the numeric
/// `del_last_index` flag (`0` closes, `1` opens) and as the `del_thread`
/// text. Both columns are always written from this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DelThread {
    Open,
    Close,
}

impl DelThread {
    /// Value stored in the `del_last_index` column.
    pub fn last_index_flag(self) -> i32 {
        match self {
            DelThread::Open => 1,
            DelThread::Close => 0,
        }
    }

    /// Value stored in the `del_thread` column.
    pub fn as_str(self) -> &'static str {
        match self {
            DelThread::Open => "Open",
            DelThread::Close => "Close",
        }
    }

    /// Decode the numeric flag.
    pub fn from_flag(flag: i32) -> Option<Self> {
        match flag {
            1 => Some(DelThread::Open),
            0 => Some(DelThread::Close),
            _ => None,
        }
    }

    /// Reconcile the flag/text pair supplied by a client.
    ///
    /// Either side may be omitted. When both are present they must agree.
    pub fn from_parts(flag: Option<i32>, thread: Option<&str>) -> AppResult<Self> {
        let from_flag = match flag {
            Some(f) => Some(DelThread::from_flag(f).ok_or_else(|| {
                AppError::Validation(format!("del_last_index must be 0 or 1, got {}", f))
            })?),
            None => None,
        };

        let from_text = match thread {
            Some(t) => Some(DelThread::try_from(t)?),
            None => None,
        };

        match (from_flag, from_text) {
            (Some(a), Some(b)) if a != b => Err(AppError::Validation(format!(
                "del_last_index {} does not match del_thread '{}'",
                a.last_index_flag(),
                b
            ))),
            (Some(t), _) | (None, Some(t)) => Ok(t),
            (None, None) => Err(AppError::Validation(
                "Either del_last_index or del_thread is required".to_string(),
            )),
        }
    }
}

impl std::fmt::Display for DelThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for DelThread {
    type Error = AppError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(DelThread::Open),
            "close" | "closed" => Ok(DelThread::Close),
            other => Err(AppError::Validation(format!(
                "del_thread must be 'Open' or 'Close', got '{}'",
                other
            ))),
        }
    }
}

/// Stored application log row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct ApplicationLogEntry {
    /// Primary key.
    pub id: i64,

    /// Application (main_db) identifier.
    pub main_db_id: i64,

    /// Step name (Decking, S&E, Checking, ...).
    pub application_step: String,

    /// Actor assigned to or performing this step.
    pub user_name: String,

    /// Step instance status (COMPLETED, IN PROGRESS, ...).
    pub application_status: String,

    pub application_decision: Option<String>,

    pub application_remarks: Option<String>,

    pub start_date: DateTime<Utc>,

    /// Null while the step is open.
    pub accomplished_date: Option<DateTime<Utc>>,

    /// Position in the per-application sequence.
    pub del_index: i64,

    /// `del_index` of the row this one succeeds.
    pub del_previous: i64,

    /// `0` closes a thread, `1` opens one.
    pub del_last_index: i32,

    /// `Open` or `Close`.
    pub del_thread: String,

    pub created_at: DateTime<Utc>,
}

impl ApplicationLogEntry {
    /// Thread marker decoded from the numeric flag.
    pub fn thread(&self) -> Option<DelThread> {
        DelThread::from_flag(self.del_last_index)
    }

    /// Whether the step instance is still waiting on its actor.
    pub fn is_in_progress(&self) -> bool {
        self.accomplished_date.is_none()
    }
}

/// A row ready to be inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLogEntry {
    pub main_db_id: i64,
    pub application_step: String,
    pub user_name: String,
    pub application_status: String,
    pub application_decision: Option<String>,
    pub application_remarks: Option<String>,
    pub start_date: DateTime<Utc>,
    pub accomplished_date: Option<DateTime<Utc>>,
    pub del_index: i64,
    pub del_previous: i64,
    pub thread: DelThread,
}

/// Client payload for creating or replacing a single log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntryRequest {
    pub main_db_id: i64,
    pub application_step: String,
    pub user_name: String,
    pub application_status: String,
    #[serde(default)]
    pub application_decision: Option<String>,
    #[serde(default)]
    pub application_remarks: Option<String>,
    /// Defaults to the time of the request.
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub accomplished_date: Option<DateTime<Utc>>,
    pub del_index: i64,
    #[serde(default)]
    pub del_previous: i64,
    #[serde(default)]
    pub del_last_index: Option<i32>,
    #[serde(default)]
    pub del_thread: Option<String>,
}

impl LogEntryRequest {
    /// Validate the payload and convert it into an insertable row.
    pub fn into_new_entry(self, now: DateTime<Utc>) -> AppResult<NewLogEntry> {
        if self.main_db_id <= 0 {
            return Err(AppError::Validation(
                "main_db_id must be a positive integer".to_string(),
            ));
        }
        require_text("application_step", &self.application_step)?;
        require_text("user_name", &self.user_name)?;
        require_text("application_status", &self.application_status)?;

        if self.del_index <= 0 {
            return Err(AppError::Validation(
                "del_index must be a positive integer".to_string(),
            ));
        }
        if self.del_previous < 0 || self.del_previous >= self.del_index {
            return Err(AppError::Validation(format!(
                "del_previous {} must be between 0 and del_index {}",
                self.del_previous, self.del_index
            )));
        }

        let thread = DelThread::from_parts(self.del_last_index, self.del_thread.as_deref())?;

        Ok(NewLogEntry {
            main_db_id: self.main_db_id,
            application_step: self.application_step,
            user_name: self.user_name,
            application_status: self.application_status,
            application_decision: self.application_decision,
            application_remarks: self.application_remarks,
            start_date: self.start_date.unwrap_or(now),
            accomplished_date: self.accomplished_date,
            del_index: self.del_index,
            del_previous: self.del_previous,
            thread,
        })
    }
}

fn require_text(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Bulk create payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkCreateRequest {
    pub entries: Vec<LogEntryRequest>,
}

/// Bulk create response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkCreateResponse {
    pub created: usize,
    pub entries: Vec<ApplicationLogEntry>,
}

/// Response of the last-index endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LastIndexResponse {
    pub main_db_id: i64,
    pub last_index: i64,
    pub next_index: i64,
}
