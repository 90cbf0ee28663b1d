//! Workflow YAML loading.

use std::path::Path;

use crate::error::{AppError, AppResult};
use crate::workflow::types::WorkflowDefinition;

/// Workflow compiled into the binary.
pub const BUILTIN_WORKFLOW: &str = include_str!("default.yaml");

/// Parse and validate a workflow definition.
pub fn parse_workflow(yaml_content: &str) -> AppResult<WorkflowDefinition> {
    let workflow: WorkflowDefinition =
        serde_yaml::from_str(yaml_content).map_err(|e| AppError::Parse(e.to_string()))?;

    workflow.validate()?;

    Ok(workflow)
}

/// Load the workflow from `path`, or the built-in one when no path is given.
pub fn load_workflow(path: Option<&Path>) -> AppResult<WorkflowDefinition> {
    let workflow = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| {
                AppError::Config(format!(
                    "Failed to read workflow file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            parse_workflow(&content)?
        }
        None => parse_workflow(BUILTIN_WORKFLOW)?,
    };

    tracing::info!(
        source = %path.map(|p| p.display().to_string()).unwrap_or_else(|| "builtin".to_string()),
        stages = workflow.stages.len(),
        "Workflow definition loaded"
    );

    Ok(workflow)
}
