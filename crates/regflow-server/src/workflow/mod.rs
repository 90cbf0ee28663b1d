//! Workflow stage definitions.
//!
//! One data-driven table describes every stage, the decisions allowed at
//! that stage and the stages each decision opens. The built-in table is
//! compiled into the binary and can be replaced at start-up with a YAML file.

pub mod parser;
pub mod types;

pub use parser::{load_workflow, parse_workflow, BUILTIN_WORKFLOW};
pub use types::{DecisionRoute, StageDefinition, WorkflowDefinition, MAX_FAN_OUT};
