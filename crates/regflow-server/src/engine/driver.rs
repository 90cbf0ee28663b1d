//! Workflow transition planning.
//!
//! A decision taken at a stage produces one close row for the acting user,
//! followed by one open row per stage the decision routes to:
//!
//! ```text
//! last=5 ── close(6, prev 5) ─┬─ open(7, prev 6)  S&E
//!                             └─ open(8, prev 6)  Quality Evaluation
//! ```
//!
//! A decision is only accepted at a stage that is currently open in the
//! application's chain. An application without rows can only be decided at
//! the workflow's first stage.
//!
//! Planning is pure. The service layer reads the chain and writes the
//! planned rows in one transaction after locking the application.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{
    ApplicationLogEntry, DelThread, NewLogEntry, STATUS_COMPLETED, STATUS_IN_PROGRESS,
};
use crate::engine::sequencer::LogIndex;
use crate::engine::timeline::project;
use crate::error::{AppError, AppResult};
use crate::workflow::WorkflowDefinition;

/// A decision taken by `actor` at `stage`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionRequest {
    /// Stage the actor is closing.
    pub stage: String,

    /// User performing the step.
    pub actor: String,

    pub decision: String,

    #[serde(default)]
    pub remarks: Option<String>,

    /// Next actor per target stage.
    #[serde(default)]
    pub assignees: BTreeMap<String, String>,

    /// Shorthand for routes that open a single stage.
    #[serde(default)]
    pub assignee: Option<String>,
}

impl TransitionRequest {
    /// Copy with surrounding whitespace stripped from every name and blank
    /// optional text dropped.
    pub fn normalized(&self) -> Self {
        Self {
            stage: self.stage.trim().to_string(),
            actor: self.actor.trim().to_string(),
            decision: self.decision.trim().to_string(),
            remarks: non_blank(self.remarks.as_deref()).map(str::to_string),
            assignees: self
                .assignees
                .iter()
                .filter_map(|(stage, user)| {
                    non_blank(Some(user)).map(|user| (stage.trim().to_string(), user.to_string()))
                })
                .collect(),
            assignee: non_blank(self.assignee.as_deref()).map(str::to_string),
        }
    }
}

/// Stage opened by a transition and the user it is assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub step: String,
    pub user_name: String,
}

/// Rows a transition will append, in write order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionPlan {
    pub main_db_id: i64,

    /// Index state the plan was computed against.
    pub index: LogIndex,

    pub entries: Vec<NewLogEntry>,
}

impl TransitionPlan {
    /// The close row for the acting user.
    pub fn close_entry(&self) -> &NewLogEntry {
        &self.entries[0]
    }

    /// Rows opening the next stages.
    pub fn open_entries(&self) -> &[NewLogEntry] {
        &self.entries[1..]
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Check required fields and resolve who each next stage goes to.
///
/// Nothing may be written when this fails.
pub fn validate_transition(
    workflow: &WorkflowDefinition,
    request: &TransitionRequest,
) -> AppResult<Vec<Assignment>> {
    let request = request.normalized();

    if request.stage.is_empty() {
        return Err(AppError::Validation("stage is required".to_string()));
    }
    if request.actor.is_empty() {
        return Err(AppError::Validation("actor is required".to_string()));
    }
    if request.decision.is_empty() {
        return Err(AppError::Validation("decision is required".to_string()));
    }

    let route = workflow.route(&request.stage, &request.decision)?;

    let shorthand = if route.next.len() == 1 {
        request.assignee.as_deref()
    } else {
        None
    };

    route
        .next
        .iter()
        .map(|target| {
            request
                .assignees
                .get(target)
                .map(String::as_str)
                .or(shorthand)
                .map(|user| Assignment {
                    step: target.clone(),
                    user_name: user.to_string(),
                })
                .ok_or_else(|| {
                    AppError::Validation(format!(
                        "An assignee for '{}' is required by decision '{}'",
                        target, request.decision
                    ))
                })
        })
        .collect()
}

/// Check that `stage` is waiting on a decision in `chain`.
pub fn ensure_stage_open(
    workflow: &WorkflowDefinition,
    main_db_id: i64,
    chain: &[ApplicationLogEntry],
    stage: &str,
) -> AppResult<()> {
    let stage = stage.trim();

    if chain.is_empty() {
        let first = workflow
            .initial_stage()
            .ok_or_else(|| AppError::Config("Workflow defines no stages".to_string()))?;
        if first.name == stage {
            return Ok(());
        }
        return Err(AppError::Conflict(format!(
            "Application {} has no log yet; the first decision must be taken at '{}', not '{}'",
            main_db_id, first.name, stage
        )));
    }

    let active = project(main_db_id, chain.to_vec()).active_steps;
    if active.iter().any(|s| s == stage) {
        return Ok(());
    }

    let open = if active.is_empty() {
        "none".to_string()
    } else {
        active.join(", ")
    };
    Err(AppError::Conflict(format!(
        "Stage '{}' is not open for application {}. Open stages: {}",
        stage, main_db_id, open
    )))
}

/// Plan the rows for `request` on top of the stored `chain`.
pub fn plan_transition(
    workflow: &WorkflowDefinition,
    main_db_id: i64,
    chain: &[ApplicationLogEntry],
    request: &TransitionRequest,
    now: DateTime<Utc>,
) -> AppResult<TransitionPlan> {
    let request = request.normalized();
    let assignments = validate_transition(workflow, &request)?;
    ensure_stage_open(workflow, main_db_id, chain, &request.stage)?;
    let index = LogIndex::from_entries(chain)?;
    plan_rows(main_db_id, index, &request, assignments, now)
}

/// Lay out the close row and one open row per assignment after `index`.
fn plan_rows(
    main_db_id: i64,
    index: LogIndex,
    request: &TransitionRequest,
    assignments: Vec<Assignment>,
    now: DateTime<Utc>,
) -> AppResult<TransitionPlan> {
    let close_index = index.slot(0)?;

    let mut entries = Vec::with_capacity(1 + assignments.len());
    entries.push(NewLogEntry {
        main_db_id,
        application_step: request.stage.clone(),
        user_name: request.actor.clone(),
        application_status: STATUS_COMPLETED.to_string(),
        application_decision: Some(request.decision.clone()),
        application_remarks: request.remarks.clone(),
        start_date: now,
        accomplished_date: Some(now),
        del_index: close_index,
        del_previous: index.last_index,
        thread: DelThread::Close,
    });

    for (offset, assignment) in assignments.into_iter().enumerate() {
        entries.push(NewLogEntry {
            main_db_id,
            application_step: assignment.step,
            user_name: assignment.user_name,
            application_status: STATUS_IN_PROGRESS.to_string(),
            application_decision: None,
            application_remarks: None,
            start_date: now,
            accomplished_date: None,
            del_index: index.slot(1 + offset)?,
            del_previous: close_index,
            thread: DelThread::Open,
        });
    }

    Ok(TransitionPlan {
        main_db_id,
        index,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{parse_workflow, BUILTIN_WORKFLOW};

    fn workflow() -> WorkflowDefinition {
        parse_workflow(BUILTIN_WORKFLOW).unwrap()
    }

    /// Rows as the store would return them after inserting `plan`.
    fn store(chain: &mut Vec<ApplicationLogEntry>, plan: TransitionPlan) {
        for entry in plan.entries {
            let id = chain.len() as i64 + 1;
            chain.push(ApplicationLogEntry {
                id,
                main_db_id: entry.main_db_id,
                application_step: entry.application_step,
                user_name: entry.user_name,
                application_status: entry.application_status,
                application_decision: entry.application_decision,
                application_remarks: entry.application_remarks,
                start_date: entry.start_date,
                accomplished_date: entry.accomplished_date,
                del_index: entry.del_index,
                del_previous: entry.del_previous,
                del_last_index: entry.thread.last_index_flag(),
                del_thread: entry.thread.as_str().to_string(),
                created_at: entry.start_date,
            });
        }
    }

    fn plan_at(last: i64, request: &TransitionRequest) -> AppResult<TransitionPlan> {
        let assignments = validate_transition(&workflow(), request)?;
        plan_rows(7, LogIndex::from_last(Some(last))?, request, assignments, Utc::now())
    }

    fn decking(decision: &str) -> TransitionRequest {
        TransitionRequest {
            stage: "Decking".to_string(),
            actor: "decker".to_string(),
            decision: decision.to_string(),
            remarks: Some("complete dossier".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_decking_single_target() {
        let mut request = decking("For S&E");
        request.assignee = Some("jdoe".to_string());

        let plan =
            plan_transition(&workflow(), 42, &[], &request, Utc::now()).unwrap();

        assert_eq!(plan.entries.len(), 2);

        let close = plan.close_entry();
        assert_eq!(close.application_step, "Decking");
        assert_eq!(close.application_status, "COMPLETED");
        assert_eq!(close.del_index, 1);
        assert_eq!(close.del_previous, 0);
        assert_eq!(close.thread.last_index_flag(), 0);
        assert_eq!(close.thread.as_str(), "Close");
        assert!(close.accomplished_date.is_some());

        let open = &plan.open_entries()[0];
        assert_eq!(open.application_step, "S&E");
        assert_eq!(open.user_name, "jdoe");
        assert_eq!(open.application_status, "IN PROGRESS");
        assert_eq!(open.del_index, 2);
        assert_eq!(open.del_previous, 1);
        assert_eq!(open.thread.last_index_flag(), 1);
        assert_eq!(open.thread.as_str(), "Open");
        assert!(open.accomplished_date.is_none());
    }

    #[test]
    fn test_fan_out_allocates_siblings() {
        let mut request = decking("For S&E and Quality Evaluation");
        request
            .assignees
            .insert("S&E".to_string(), "se_reviewer".to_string());
        request
            .assignees
            .insert("Quality Evaluation".to_string(), "evaluator".to_string());

        let plan = plan_at(5, &request).unwrap();

        assert_eq!(plan.entries.len(), 3);
        assert_eq!(plan.close_entry().del_index, 6);
        assert_eq!(plan.close_entry().del_previous, 5);

        let opens = plan.open_entries();
        assert_eq!(opens[0].del_index, 7);
        assert_eq!(opens[0].application_step, "S&E");
        assert_eq!(opens[0].user_name, "se_reviewer");
        assert_eq!(opens[1].del_index, 8);
        assert_eq!(opens[1].application_step, "Quality Evaluation");
        assert_eq!(opens[1].user_name, "evaluator");
        assert!(opens.iter().all(|e| e.del_previous == 6));
    }

    #[test]
    fn test_fan_out_ignores_shorthand_assignee() {
        let mut request = decking("For S&E and Quality Evaluation");
        request.assignee = Some("jdoe".to_string());
        let err = validate_transition(&workflow(), &request).unwrap_err();
        assert!(err.to_string().contains("S&E"));
    }

    #[test]
    fn test_fan_out_requires_both_assignees() {
        let mut request = decking("For S&E and Quality Evaluation");
        request
            .assignees
            .insert("S&E".to_string(), "se_reviewer".to_string());
        let err = validate_transition(&workflow(), &request).unwrap_err();
        assert!(err.to_string().contains("Quality Evaluation"));
    }

    #[test]
    fn test_missing_required_fields() {
        let wf = workflow();

        let mut request = decking("For S&E");
        request.assignee = Some("jdoe".to_string());
        request.actor = " ".to_string();
        assert!(validate_transition(&wf, &request).is_err());

        let mut request = decking("");
        request.assignee = Some("jdoe".to_string());
        let err = validate_transition(&wf, &request).unwrap_err();
        assert!(err.to_string().contains("decision is required"));

        let request = decking("For S&E");
        let err = validate_transition(&wf, &request).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_blank_assignee_rejected() {
        let mut request = decking("For S&E");
        request.assignees.insert("S&E".to_string(), "  ".to_string());
        assert!(validate_transition(&workflow(), &request).is_err());
    }

    #[test]
    fn test_decision_not_allowed_at_stage() {
        let mut request = decking("Approved");
        request.assignee = Some("jdoe".to_string());
        assert!(validate_transition(&workflow(), &request).is_err());
    }

    #[test]
    fn test_terminal_decision_writes_only_close() {
        let request = TransitionRequest {
            stage: "Releasing".to_string(),
            actor: "releaser".to_string(),
            decision: "Released".to_string(),
            ..Default::default()
        };
        let plan = plan_at(11, &request).unwrap();
        assert_eq!(plan.entries.len(), 1);
        assert_eq!(plan.close_entry().del_index, 12);
        assert!(plan.open_entries().is_empty());
    }

    #[test]
    fn test_request_deserialization() {
        let json = r#"{
            "stage": "Decking",
            "actor": "decker",
            "decision": "For S&E",
            "assignee": "jdoe"
        }"#;
        let request: TransitionRequest = serde_json::from_str(json).unwrap();
        assert!(request.assignees.is_empty());
        assert!(request.remarks.is_none());
        let assignments = validate_transition(&workflow(), &request).unwrap();
        assert_eq!(
            assignments,
            vec![Assignment {
                step: "S&E".to_string(),
                user_name: "jdoe".to_string()
            }]
        );
    }

    #[test]
    fn test_empty_chain_only_accepts_first_stage() {
        let request = TransitionRequest {
            stage: "Director".to_string(),
            actor: "director".to_string(),
            decision: "Approved".to_string(),
            assignee: Some("releaser".to_string()),
            ..Default::default()
        };
        let err = plan_transition(&workflow(), 42, &[], &request, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(err.to_string().contains("'Decking'"));
    }

    #[test]
    fn test_repeated_decision_on_closed_stage_rejected() {
        let wf = workflow();
        let mut request = decking("For S&E");
        request.assignee = Some("jdoe".to_string());

        let mut chain = Vec::new();
        let plan = plan_transition(&wf, 42, &chain, &request, Utc::now()).unwrap();
        store(&mut chain, plan);
        assert_eq!(chain.len(), 2);

        let err = plan_transition(&wf, 42, &chain, &request, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(err.to_string().contains("Open stages: S&E"));
    }

    #[test]
    fn test_open_stage_accepted_and_fan_out_sibling_stays_open() {
        let wf = workflow();
        let mut request = decking("For S&E and Quality Evaluation");
        request
            .assignees
            .insert("S&E".to_string(), "se_reviewer".to_string());
        request
            .assignees
            .insert("Quality Evaluation".to_string(), "evaluator".to_string());

        let mut chain = Vec::new();
        let plan = plan_transition(&wf, 42, &chain, &request, Utc::now()).unwrap();
        store(&mut chain, plan);

        let se = TransitionRequest {
            stage: "S&E".to_string(),
            actor: "se_reviewer".to_string(),
            decision: "For Checking".to_string(),
            assignee: Some("checker".to_string()),
            ..Default::default()
        };
        let plan = plan_transition(&wf, 42, &chain, &se, Utc::now()).unwrap();
        assert_eq!(plan.close_entry().del_index, 4);
        assert_eq!(plan.close_entry().del_previous, 3);
        store(&mut chain, plan);

        assert!(ensure_stage_open(&wf, 42, &chain, "Quality Evaluation").is_ok());
        assert!(ensure_stage_open(&wf, 42, &chain, "Checking").is_ok());
        assert!(ensure_stage_open(&wf, 42, &chain, "S&E").is_err());
    }

    #[test]
    fn test_names_are_trimmed_before_lookup() {
        let request = TransitionRequest {
            stage: " Decking ".to_string(),
            actor: " decker".to_string(),
            decision: "For S&E  ".to_string(),
            remarks: Some("   ".to_string()),
            assignees: [(" S&E ".to_string(), " jdoe ".to_string())].into_iter().collect(),
            assignee: None,
        };

        let plan = plan_transition(&workflow(), 42, &[], &request, Utc::now()).unwrap();
        let close = plan.close_entry();
        assert_eq!(close.application_step, "Decking");
        assert_eq!(close.user_name, "decker");
        assert_eq!(close.application_decision.as_deref(), Some("For S&E"));
        assert!(close.application_remarks.is_none());
        assert_eq!(plan.open_entries()[0].user_name, "jdoe");
    }

    #[test]
    fn test_index_overflow_is_rejected() {
        let mut request = decking("For S&E");
        request.assignee = Some("jdoe".to_string());
        let err = plan_at(i64::MAX - 1, &request).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
