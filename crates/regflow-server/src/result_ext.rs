//! Result extension trait for logging failures with context.

use std::fmt::Display;
use tracing::error;

/// Adds a `log` method to `Result` that records the error, the context and
/// the caller's source location, then hands the result back unchanged.
///
/// ```ignore
/// use regflow_server::result_ext::ResultExt;
///
/// let rows = queries::list_by_main_db(&pool, id).await.log("loading chain")?;
/// ```
pub trait ResultExt<T, E> {
    fn log<S: ToString>(self, context: S) -> Result<T, E>;
}

impl<T, E: Display> ResultExt<T, E> for Result<T, E> {
    #[track_caller]
    fn log<S: ToString>(self, context: S) -> Result<T, E> {
        if let Err(ref e) = self {
            let caller_location = std::panic::Location::caller();
            error!(
                target: "regflow_server",
                error = %e,
                file = %format!("{}:{}", caller_location.file(), caller_location.line()),
                context = %context.to_string(),
                "Operation failed"
            );
        }
        self
    }
}
