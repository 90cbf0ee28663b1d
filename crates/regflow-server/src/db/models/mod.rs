//! Database models for regflow.
//!
//! This module contains SQLx-compatible model definitions
//! for all database tables.

pub mod application;
pub mod application_log;

pub use application::*;
pub use application_log::*;
