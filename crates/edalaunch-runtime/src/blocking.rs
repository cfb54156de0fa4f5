//! Runs synchronous repository and filesystem work off the async workers.

use edalaunch_kernel::LauncherError;

pub(crate) async fn run_blocking<T, F>(task: &'static str, work: F) -> Result<T, LauncherError>
where
    F: FnOnce() -> Result<T, LauncherError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| LauncherError::Io(format!("{} task failed: {}", task, e)))?
}
