//! Workflow log engine.
//!
//! Pure logic over the application log chain:
//!
//! - **Sequencer**: computes the next `del_index` for an application
//! - **Driver**: checks the acting stage is open and plans the close/open
//!   rows a decision produces
//! - **Timeline**: projects a chain into an ordered, annotated history
//! - **Chain**: verifies the linkage invariants of a stored chain

pub mod chain;
pub mod driver;
pub mod sequencer;
pub mod timeline;

pub use chain::{verify_chain, ChainReport, ChainViolation};
pub use driver::{
    ensure_stage_open, plan_transition, validate_transition, TransitionPlan, TransitionRequest,
};
pub use sequencer::{LogIndex, BASE_INDEX};
pub use timeline::{project, StepHistory, Timeline, TimelineStep};
