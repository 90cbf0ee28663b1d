//! Database module for regflow.
//!
//! This module provides database connectivity, models, queries and the
//! schema bootstrap for PostgreSQL using SQLx.

pub mod models;
pub mod pool;
pub mod queries;
pub mod schema;

pub use pool::{create_pool, DbPool};
