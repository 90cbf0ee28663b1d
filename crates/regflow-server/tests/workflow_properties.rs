//! Property tests: random walks through the built-in workflow must always
//! produce a contiguous, correctly linked log chain.

use std::collections::BTreeMap;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use regflow_server::db::models::{ApplicationLogEntry, DelThread, NewLogEntry};
use regflow_server::engine::{plan_transition, project, verify_chain, TransitionRequest};
use regflow_server::AppError;
use regflow_server::workflow::{parse_workflow, WorkflowDefinition, BUILTIN_WORKFLOW};

const MAIN_DB_ID: i64 = 42;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

fn workflow() -> WorkflowDefinition {
    parse_workflow(BUILTIN_WORKFLOW).unwrap()
}

/// What the store would hand back after inserting `entry` as row `id`.
fn stored(id: i64, entry: NewLogEntry) -> ApplicationLogEntry {
    ApplicationLogEntry {
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
    }
}

/// Which open step acts next and which of its decisions it takes.
fn arb_moves(max: usize) -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0usize..8, 0usize..8), 1..max)
}

/// Request taking the `pick`-th decision of `stage_name`, with every target assigned.
fn decide(
    workflow: &WorkflowDefinition,
    stage_name: &str,
    pick: usize,
    turn: usize,
) -> TransitionRequest {
    let stage = workflow.stage(stage_name).unwrap();
    let route = &stage.decisions[pick % stage.decisions.len()];

    let assignees: BTreeMap<String, String> = route
        .next
        .iter()
        .map(|target| (target.clone(), format!("user_{}", target.to_lowercase())))
        .collect();

    TransitionRequest {
        stage: stage_name.to_string(),
        actor: format!("user_{}", stage_name.to_lowercase()),
        decision: route.decision.clone(),
        remarks: Some(format!("turn {}", turn)),
        assignees,
        assignee: None,
    }
}

/// Walk the workflow, starting at Decking, and return every stored row.
fn walk(workflow: &WorkflowDefinition, moves: &[(usize, usize)]) -> Vec<ApplicationLogEntry> {
    let mut chain: Vec<ApplicationLogEntry> = Vec::new();
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();

    for (turn, &(pick_step, pick_decision)) in moves.iter().enumerate() {
        let active = if chain.is_empty() {
            vec!["Decking".to_string()]
        } else {
            project(MAIN_DB_ID, chain.clone()).active_steps
        };
        if active.is_empty() {
            break;
        }

        let stage_name = &active[pick_step % active.len()];
        let request = decide(workflow, stage_name, pick_decision, turn);

        let now = start + Duration::minutes(turn as i64);
        let plan = plan_transition(workflow, MAIN_DB_ID, &chain, &request, now).unwrap();

        for entry in plan.entries {
            let id = chain.len() as i64 + 1;
            chain.push(stored(id, entry));
        }
    }

    chain
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    /// Indexes are 1..=n with no gaps or repeats.
    #[test]
    fn prop_indexes_are_contiguous(moves in arb_moves(30)) {
        let chain = walk(&workflow(), &moves);
        let mut indexes: Vec<i64> = chain.iter().map(|e| e.del_index).collect();
        indexes.sort_unstable();
        let expected: Vec<i64> = (1..=chain.len() as i64).collect();
        prop_assert_eq!(indexes, expected);
    }

    /// Every generated chain passes verification.
    #[test]
    fn prop_generated_chain_verifies(moves in arb_moves(30)) {
        let chain = walk(&workflow(), &moves);
        let report = verify_chain(MAIN_DB_ID, &chain);
        prop_assert!(report.valid, "violations: {:?}", report.violations);
        prop_assert_eq!(report.entry_count, chain.len());
    }

    /// Close rows carry a decision and an accomplished date; open rows carry neither.
    #[test]
    fn prop_thread_flags_match_row_state(moves in arb_moves(30)) {
        let chain = walk(&workflow(), &moves);
        for entry in &chain {
            match entry.thread() {
                Some(DelThread::Close) => {
                    prop_assert_eq!(entry.del_last_index, 0);
                    prop_assert_eq!(entry.del_thread.as_str(), "Close");
                    prop_assert!(entry.accomplished_date.is_some());
                    prop_assert!(entry.application_decision.is_some());
                }
                Some(DelThread::Open) => {
                    prop_assert_eq!(entry.del_last_index, 1);
                    prop_assert_eq!(entry.del_thread.as_str(), "Open");
                    prop_assert!(entry.accomplished_date.is_none());
                    prop_assert!(entry.application_decision.is_none());
                }
                None => prop_assert!(false, "unknown flag {}", entry.del_last_index),
            }
        }
    }

    /// The current step is the row with the highest index whatever order the
    /// store returns rows in.
    #[test]
    fn prop_current_step_ignores_input_order(
        moves in arb_moves(20),
        seed in any::<u64>(),
    ) {
        let chain = walk(&workflow(), &moves);
        let newest = chain.iter().max_by_key(|e| e.del_index).unwrap().clone();

        let mut shuffled = chain.clone();
        let len = shuffled.len();
        for i in 0..len {
            let j = ((seed.wrapping_mul(6364136223846793005).wrapping_add(i as u64)) % len as u64) as usize;
            shuffled.swap(i, j);
        }

        let timeline = project(MAIN_DB_ID, shuffled);
        prop_assert_eq!(timeline.current_step.as_deref(), Some(newest.application_step.as_str()));
        prop_assert_eq!(timeline.current().map(|s| s.del_index), Some(newest.del_index));
        prop_assert_eq!(timeline.steps.iter().filter(|s| s.is_current).count(), 1);
    }

    /// Deciding at any stage that is not open is refused, so a repeated or
    /// out-of-turn submission cannot fork the chain.
    #[test]
    fn prop_closed_stages_refuse_decisions(
        moves in arb_moves(20),
        stage_pick in 0usize..16,
        decision_pick in 0usize..8,
    ) {
        let workflow = workflow();
        let chain = walk(&workflow, &moves);
        let active = project(MAIN_DB_ID, chain.clone()).active_steps;

        let stage = &workflow.stages[stage_pick % workflow.stages.len()];
        let request = decide(&workflow, &stage.name, decision_pick, 0);
        let result = plan_transition(&workflow, MAIN_DB_ID, &chain, &request, Utc::now());

        if active.contains(&stage.name) {
            prop_assert!(result.is_ok());
        } else {
            prop_assert!(matches!(result, Err(AppError::Conflict(_))));
        }
    }

    /// Each transition links its close row to the previous last index and its
    /// open rows to the close row.
    #[test]
    fn prop_open_rows_follow_their_close_row(moves in arb_moves(30)) {
        let chain = walk(&workflow(), &moves);
        for entry in chain.iter().filter(|e| e.thread() == Some(DelThread::Open)) {
            let parent = chain.iter().find(|e| e.del_index == entry.del_previous);
            prop_assert!(parent.is_some());
            prop_assert_eq!(parent.unwrap().thread(), Some(DelThread::Close));
        }
        for entry in chain.iter().filter(|e| e.thread() == Some(DelThread::Close)) {
            let earlier = chain.iter().filter(|e| e.del_index < entry.del_index).count() as i64;
            prop_assert_eq!(entry.del_previous, earlier);
        }
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn decking_fan_out_opens_both_reviews_in_declared_order() {
    let chain = walk(&workflow(), &[(0, 2)]);
    assert_eq!(chain.len(), 3);

    assert_eq!(chain[0].application_step, "Decking");
    assert_eq!(chain[0].del_index, 1);
    assert_eq!(chain[0].del_previous, 0);

    assert_eq!(chain[1].application_step, "S&E");
    assert_eq!(chain[1].del_index, 2);
    assert_eq!(chain[2].application_step, "Quality Evaluation");
    assert_eq!(chain[2].del_index, 3);
    assert!(chain[1..].iter().all(|e| e.del_previous == 1));

    let timeline = project(MAIN_DB_ID, chain);
    assert_eq!(timeline.active_steps, vec!["S&E", "Quality Evaluation"]);
}

#[test]
fn first_decision_must_be_taken_at_decking() {
    let workflow = workflow();
    let request = decide(&workflow, "Director", 0, 0);
    let result = plan_transition(&workflow, MAIN_DB_ID, &[], &request, Utc::now());
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[test]
fn released_application_has_no_active_steps() {
    let workflow = workflow();
    let path = [
        ("Decking", "For Quality Evaluation"),
        ("Quality Evaluation", "For Checking"),
        ("Checking", "For Supervisor Review"),
        ("Supervisor", "For QA"),
        ("QA", "For Director"),
        ("Director", "Approved"),
        ("Releasing", "Released"),
    ];
    let moves: Vec<(usize, usize)> = path
        .iter()
        .map(|(stage, decision)| {
            let position = workflow
                .stage(stage)
                .unwrap()
                .decisions
                .iter()
                .position(|d| d.decision == *decision)
                .unwrap();
            (0, position)
        })
        .collect();

    let chain = walk(&workflow, &moves);
    // Six close+open pairs and one terminal close row
    assert_eq!(chain.len(), 13);

    let timeline = project(MAIN_DB_ID, chain.clone());
    assert!(timeline.active_steps.is_empty());
    assert_eq!(timeline.current_step.as_deref(), Some("Releasing"));
    assert_eq!(timeline.current_status.as_deref(), Some("COMPLETED"));
    assert!(verify_chain(MAIN_DB_ID, &chain).valid);
}
