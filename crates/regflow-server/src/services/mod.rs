//! Service layer for regflow.
//!
//! Services encapsulate business logic and coordinate
//! between handlers and database queries.

pub mod application_log;

pub use application_log::{ApplicationLogService, LogFilter};
