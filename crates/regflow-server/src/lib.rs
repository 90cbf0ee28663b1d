//! regflow server library
//!
//! Workflow activity log for product-registration applications:
//!
//! - **Log store**: append-only `application_logs` rows linked by
//!   `del_index` / `del_previous`
//! - **Sequencer**: per-application index allocation under an advisory lock
//! - **Workflow driver**: data-driven stage table turning a decision into one
//!   close row plus one or two open rows, written atomically
//! - **Timeline**: ordered projection of a chain with the current step marked
//! - **Chain verification**: linkage and thread-flag checks
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading from environment variables
//! - [`db`]: Database connectivity, models, queries and schema
//! - [`engine`]: Pure sequencing, planning, projection and verification
//! - [`workflow`]: Stage/decision/routing definitions
//! - [`services`]: Business operations over the store
//! - [`handlers`] / [`router`]: HTTP surface
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use regflow_server::{
//!     config::{AppConfig, DatabaseConfig},
//!     db::create_pool,
//!     router::build_router,
//!     services::ApplicationLogService,
//!     state::AppState,
//!     workflow::load_workflow,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::from_env()?;
//!     let pool = create_pool(&DatabaseConfig::from_env()?).await?;
//!     let workflow = Arc::new(load_workflow(config.workflow_file.as_deref())?);
//!     let service = ApplicationLogService::new(pool.clone(), workflow.clone(), None, 100);
//!     let app = build_router(AppState::new(pool, config, workflow, false), service);
//!     // ... bind and serve
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod nats;
pub mod result_ext;
pub mod router;
pub mod services;
pub mod state;
pub mod workflow;

pub use error::{AppError, AppResult};
pub use result_ext::ResultExt;
