//! Linkage checks over a stored log chain.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::db::models::{ApplicationLogEntry, DelThread};

/// A broken chain invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainViolation {
    /// More than one row carries the same index.
    DuplicateIndex { del_index: i64, count: usize },

    /// Indexes jump over `missing_from..=missing_to`.
    Gap { missing_from: i64, missing_to: i64 },

    /// `del_previous` names an index not present in the chain.
    DanglingPrevious { del_index: i64, del_previous: i64 },

    /// `del_previous` does not point backwards.
    ForwardPrevious { del_index: i64, del_previous: i64 },

    /// Numeric flag and thread text disagree or are unknown.
    ThreadMismatch {
        del_index: i64,
        del_last_index: i32,
        del_thread: String,
    },

    /// A close row without an accomplished date.
    UnaccomplishedClose { del_index: i64 },

    /// An open row that already carries an accomplished date.
    AccomplishedOpen { del_index: i64 },
}

/// Verification result for one application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainReport {
    pub main_db_id: i64,
    pub entry_count: usize,
    pub valid: bool,
    pub violations: Vec<ChainViolation>,
}

fn thread_of(entry: &ApplicationLogEntry) -> Option<DelThread> {
    let from_flag = DelThread::from_flag(entry.del_last_index)?;
    let from_text = DelThread::try_from(entry.del_thread.as_str()).ok()?;
    (from_flag == from_text).then_some(from_flag)
}

/// Check every chain invariant for the rows of one application.
pub fn verify_chain(main_db_id: i64, entries: &[ApplicationLogEntry]) -> ChainReport {
    let mut violations = Vec::new();

    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for entry in entries {
        *counts.entry(entry.del_index).or_default() += 1;
    }

    for (&del_index, &count) in &counts {
        if count > 1 {
            violations.push(ChainViolation::DuplicateIndex { del_index, count });
        }
    }

    let indexes: Vec<i64> = counts.keys().copied().collect();
    for pair in indexes.windows(2) {
        if pair[1] - pair[0] > 1 {
            violations.push(ChainViolation::Gap {
                missing_from: pair[0] + 1,
                missing_to: pair[1] - 1,
            });
        }
    }

    let first = indexes.first().copied();
    let known: HashSet<i64> = indexes.iter().copied().collect();

    let mut ordered: Vec<&ApplicationLogEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| (e.del_index, e.id));

    for entry in ordered {
        if Some(entry.del_index) != first {
            if entry.del_previous >= entry.del_index {
                violations.push(ChainViolation::ForwardPrevious {
                    del_index: entry.del_index,
                    del_previous: entry.del_previous,
                });
            } else if !known.contains(&entry.del_previous) {
                violations.push(ChainViolation::DanglingPrevious {
                    del_index: entry.del_index,
                    del_previous: entry.del_previous,
                });
            }
        }

        match thread_of(entry) {
            None => violations.push(ChainViolation::ThreadMismatch {
                del_index: entry.del_index,
                del_last_index: entry.del_last_index,
                del_thread: entry.del_thread.clone(),
            }),
            Some(DelThread::Close) if entry.accomplished_date.is_none() => {
                violations.push(ChainViolation::UnaccomplishedClose {
                    del_index: entry.del_index,
                })
            }
            Some(DelThread::Open) if entry.accomplished_date.is_some() => {
                violations.push(ChainViolation::AccomplishedOpen {
                    del_index: entry.del_index,
                })
            }
            Some(_) => {}
        }
    }

    ChainReport {
        main_db_id,
        entry_count: entries.len(),
        valid: violations.is_empty(),
        violations,
    }
}
