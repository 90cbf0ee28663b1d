//! Workflow definition handler.

use axum::{extract::State, Json};

use crate::services::ApplicationLogService;
use crate::workflow::WorkflowDefinition;

/// Stages, allowed decisions and routing of the loaded workflow.
///
/// `GET /workflow/stages`
pub async fn stages(State(service): State<ApplicationLogService>) -> Json<WorkflowDefinition> {
    Json(service.workflow().clone())
}
