//! HTTP handlers for the regflow API.
//!
//! This module contains all route handlers organized by domain.

pub mod application_logs;
pub mod database;
pub mod health;
pub mod workflow;

pub use health::{api_health, health_check};
