//! Deadline-bounded execution.
//!
//! The provider call runs as its own task and is raced against a timer; the
//! caller proceeds at the deadline whether or not the provider honours its
//! own timeout. For async work the spawned task is aborted at the deadline.
//! Blocking closures run on the blocking pool and cannot be cancelled: they
//! keep running after the deadline, so a timeout means "outcome unknown".

use std::future::Future;
use std::time::Duration;

use crate::provider::ProviderError;

/// Run `fut` on its own task; fail with [`ProviderError::DeadlineExceeded`]
/// if it has not finished within `timeout`.
pub async fn run_with_timeout<F, T>(fut: F, timeout: Duration) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>> + Send + 'static,
    T: Send + 'static,
{
    let mut handle = tokio::spawn(fut);
    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(ProviderError::Other(format!(
            "provider task failed: {}",
            join_err
        ))),
        Err(_) => {
            handle.abort();
            Err(ProviderError::DeadlineExceeded(timeout))
        }
    }
}

/// Run a synchronous provider call on the blocking pool under a deadline.
///
/// The closure is not interrupted when the deadline passes.
pub async fn run_blocking_with_timeout<F, T>(call: F, timeout: Duration) -> Result<T, ProviderError>
where
    F: FnOnce() -> Result<T, ProviderError> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::task::spawn_blocking(call);
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(ProviderError::Other(format!(
            "blocking provider call failed: {}",
            join_err
        ))),
        Err(_) => Err(ProviderError::DeadlineExceeded(timeout)),
    }
}
