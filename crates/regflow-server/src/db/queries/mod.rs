//! Database queries for regflow.
//!
//! This module contains database query functions organized by domain.

pub mod application_log;
