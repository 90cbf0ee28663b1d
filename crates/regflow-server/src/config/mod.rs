//! Configuration for regflow.
//!
//! Settings are read from environment variables with the `envy` crate.

mod app;
mod database;

pub use app::AppConfig;
pub use database::DatabaseConfig;
