//! Per-application `del_index` sequencing.

use serde::{Deserialize, Serialize};

use crate::db::models::{ApplicationLogEntry, LastIndexResponse};
use crate::error::{AppError, AppResult};

/// Index reported for an application with no log rows.
pub const BASE_INDEX: i64 = 0;

/// Last allocated index of an application and the next free one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogIndex {
    pub last_index: i64,
    pub next_index: i64,
}

fn exhausted(last_index: i64) -> AppError {
    AppError::Conflict(format!(
        "del_index sequence is exhausted after {}",
        last_index
    ))
}

impl LogIndex {
    /// Build from the maximum stored `del_index`, if any.
    pub fn from_last(last: Option<i64>) -> AppResult<Self> {
        let last_index = last.unwrap_or(BASE_INDEX).max(BASE_INDEX);
        let next_index = last_index
            .checked_add(1)
            .ok_or_else(|| exhausted(last_index))?;
        Ok(Self {
            last_index,
            next_index,
        })
    }

    /// Compute from a chain in any order.
    pub fn from_entries(entries: &[ApplicationLogEntry]) -> AppResult<Self> {
        Self::from_last(entries.iter().map(|e| e.del_index).max())
    }

    /// Index of the row written `offset` places after `next_index`.
    pub fn slot(self, offset: usize) -> AppResult<i64> {
        i64::try_from(offset)
            .ok()
            .and_then(|offset| self.next_index.checked_add(offset))
            .ok_or_else(|| exhausted(self.last_index))
    }

    pub fn into_response(self, main_db_id: i64) -> LastIndexResponse {
        LastIndexResponse {
            main_db_id,
            last_index: self.last_index,
            next_index: self.next_index,
        }
    }
}
