//! Launcher error taxonomy.
//!
//! External-tool failures are not errors: they are recorded on the run. The
//! variants here cover rejected input, missing records, violated invariants,
//! broken deployments (missing reference data) and storage/IO faults.

/// Launcher-level error type.
#[derive(Debug, thiserror::Error)]
pub enum LauncherError {
    /// Request rejected before any state was created (missing upload, unknown tool).
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// An invariant would be violated (terminal status already set, cross-run item).
    #[error("conflict: {0}")]
    Conflict(String),
    /// Required reference data is absent. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("render error: {0}")]
    Render(String),
}

impl LauncherError {
    pub fn io(context: &str, err: std::io::Error) -> Self {
        Self::Io(format!("{}: {}", context, err))
    }
}
