//! Workflow definition types.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Largest number of stages a single decision may open at once.
pub const MAX_FAN_OUT: usize = 2;

/// Complete workflow: every stage an application can pass through.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowDefinition {
    pub stages: Vec<StageDefinition>,
}

/// One named step and the decisions its actor can take.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub decisions: Vec<DecisionRoute>,
}

/// Routing rule: taking `decision` opens every stage in `next`, in order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecisionRoute {
    pub decision: String,

    #[serde(default)]
    pub next: Vec<String>,
}

impl DecisionRoute {
    /// Whether the decision opens more than one stage.
    pub fn is_fan_out(&self) -> bool {
        self.next.len() > 1
    }

    /// Whether the decision closes the workflow.
    pub fn is_terminal(&self) -> bool {
        self.next.is_empty()
    }
}

impl StageDefinition {
    pub fn decision(&self, decision: &str) -> Option<&DecisionRoute> {
        self.decisions.iter().find(|d| d.decision == decision)
    }

    pub fn decision_names(&self) -> Vec<&str> {
        self.decisions.iter().map(|d| d.decision.as_str()).collect()
    }
}

impl WorkflowDefinition {
    pub fn stage(&self, name: &str) -> Option<&StageDefinition> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Stage every application starts at.
    pub fn initial_stage(&self) -> Option<&StageDefinition> {
        self.stages.first()
    }

    /// Look up the route for `decision` taken at `stage`.
    pub fn route(&self, stage: &str, decision: &str) -> AppResult<&DecisionRoute> {
        let definition = self
            .stage(stage)
            .ok_or_else(|| AppError::Validation(format!("Unknown workflow stage '{}'", stage)))?;

        definition.decision(decision).ok_or_else(|| {
            AppError::Validation(format!(
                "Decision '{}' is not allowed at stage '{}'. Allowed: {}",
                decision,
                stage,
                definition.decision_names().join(", ")
            ))
        })
    }

    /// Check the structural rules every workflow must satisfy.
    pub fn validate(&self) -> AppResult<()> {
        if self.stages.is_empty() {
            return Err(AppError::Validation(
                "Workflow must define at least one stage".to_string(),
            ));
        }

        let mut seen_stages = std::collections::HashSet::new();
        for stage in &self.stages {
            if stage.name.trim().is_empty() {
                return Err(AppError::Validation(
                    "Stage name must not be empty".to_string(),
                ));
            }
            if !seen_stages.insert(stage.name.as_str()) {
                return Err(AppError::Validation(format!(
                    "Duplicate stage name: {}",
                    stage.name
                )));
            }
        }

        for stage in &self.stages {
            let mut seen_decisions = std::collections::HashSet::new();
            for route in &stage.decisions {
                if route.decision.trim().is_empty() {
                    return Err(AppError::Validation(format!(
                        "Stage '{}': decision must not be empty",
                        stage.name
                    )));
                }
                if !seen_decisions.insert(route.decision.as_str()) {
                    return Err(AppError::Validation(format!(
                        "Stage '{}': duplicate decision '{}'",
                        stage.name, route.decision
                    )));
                }
                if route.next.len() > MAX_FAN_OUT {
                    return Err(AppError::Validation(format!(
                        "Stage '{}': decision '{}' opens {} stages, at most {} allowed",
                        stage.name,
                        route.decision,
                        route.next.len(),
                        MAX_FAN_OUT
                    )));
                }
                let mut seen_targets = std::collections::HashSet::new();
                for target in &route.next {
                    if !seen_stages.contains(target.as_str()) {
                        return Err(AppError::Validation(format!(
                            "Stage '{}': decision '{}' routes to unknown stage '{}'",
                            stage.name, route.decision, target
                        )));
                    }
                    if !seen_targets.insert(target.as_str()) {
                        return Err(AppError::Validation(format!(
                            "Stage '{}': decision '{}' lists '{}' twice",
                            stage.name, route.decision, target
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
