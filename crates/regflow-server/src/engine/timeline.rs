//! Timeline projection of an application's log chain.
//!
//! The store hands back rows newest-first; the projection always re-sorts by
//! `del_index` so the current step does not depend on the input order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{ApplicationLogEntry, DelThread};

/// One row of the timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineStep {
    pub del_index: i64,
    pub del_previous: i64,
    pub step: String,
    pub user_name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub thread: Option<DelThread>,
    pub start_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accomplished_date: Option<DateTime<Utc>>,
    pub in_progress: bool,
    pub is_current: bool,
}

/// Every row index recorded under one step name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepHistory {
    pub step: String,
    pub del_indexes: Vec<i64>,
}

/// Projected timeline of an application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Timeline {
    pub main_db_id: i64,

    /// Rows in ascending `del_index` order.
    pub steps: Vec<TimelineStep>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_status: Option<String>,

    /// Per step name, in order of first appearance.
    pub history: Vec<StepHistory>,

    /// Steps whose latest row is still open.
    pub active_steps: Vec<String>,
}

impl Timeline {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn current(&self) -> Option<&TimelineStep> {
        self.steps.last()
    }
}

impl From<ApplicationLogEntry> for TimelineStep {
    fn from(e: ApplicationLogEntry) -> Self {
        let thread = e.thread();
        let in_progress = e.is_in_progress();
        Self {
            del_index: e.del_index,
            del_previous: e.del_previous,
            step: e.application_step,
            user_name: e.user_name,
            status: e.application_status,
            decision: e.application_decision,
            remarks: e.application_remarks,
            thread,
            start_date: e.start_date,
            accomplished_date: e.accomplished_date,
            in_progress,
            is_current: false,
        }
    }
}

/// Project a chain given in any order.
pub fn project(main_db_id: i64, mut entries: Vec<ApplicationLogEntry>) -> Timeline {
    entries.sort_by_key(|e| (e.del_index, e.id));

    let mut steps: Vec<TimelineStep> = entries.into_iter().map(TimelineStep::from).collect();
    if let Some(last) = steps.last_mut() {
        last.is_current = true;
    }

    let mut history: Vec<StepHistory> = Vec::new();
    for step in &steps {
        match history.iter_mut().find(|h| h.step == step.step) {
            Some(h) => h.del_indexes.push(step.del_index),
            None => history.push(StepHistory {
                step: step.step.clone(),
                del_indexes: vec![step.del_index],
            }),
        }
    }

    let active_steps = history
        .iter()
        .filter_map(|h| {
            let latest = h.del_indexes.last()?;
            let row = steps
                .iter()
                .rev()
                .find(|s| s.del_index == *latest && s.step == h.step)?;
            (row.in_progress && row.thread == Some(DelThread::Open)).then(|| h.step.clone())
        })
        .collect();

    let current_step = steps.last().map(|s| s.step.clone());
    let current_status = steps.last().map(|s| s.status.clone());

    Timeline {
        main_db_id,
        steps,
        current_step,
        current_status,
        history,
        active_steps,
    }
}
