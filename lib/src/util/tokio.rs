use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use tokio::task::JoinHandle;

/// Aborts the wrapped task when dropped.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Spawns a future as a Tokio task and applies a timeout to it.
///
/// The task is aborted if the timeout is reached or if the returned future is
/// dropped before completion, so nothing outlives its caller.
///
/// # Errors
///
/// - If the timeout is reached
/// - If the task fails to join
pub async fn spawn_timeout<T>(
    duration: Duration,
    future: impl Future<Output = T> + Send + 'static,
) -> Result<T>
where
    T: Send + 'static,
{
    let mut task = AbortOnDrop(tokio::spawn(future));
    let timeout = tokio::time::timeout(duration, &mut task.0);
    let t = timeout
        .await
        .with_context(|| format!("tokio task timed out after {duration:?}"))?
        .context("tokio task failed to join")?;
    Ok(t)
}
