//! Restarts worker loops that fail.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::workers::pause;

/// Run `start()` until `cancel` fires, restarting after `restart_delay`
/// whenever the worker returns early, errors, or panics.
pub async fn supervise<F, Fut>(
    name: String,
    restart_delay: Duration,
    cancel: CancellationToken,
    mut start: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let mut restarts: u64 = 0;
    loop {
        let outcome = tokio::spawn(start()).await;
        if cancel.is_cancelled() {
            break;
        }

        restarts += 1;
        match outcome {
            Ok(Ok(())) => {
                tracing::warn!(worker = %name, restarts, "Worker exited unexpectedly, restarting");
            }
            Ok(Err(e)) => {
                tracing::error!(worker = %name, restarts, error = ?e, "Worker failed, restarting");
            }
            Err(join_error) => {
                tracing::error!(worker = %name, restarts, error = %join_error, "Worker panicked, restarting");
            }
        }

        if !pause(restart_delay, &cancel).await {
            break;
        }
    }
    tracing::info!(worker = %name, "Supervisor stopped");
}
