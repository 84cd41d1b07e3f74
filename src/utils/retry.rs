use crate::error::{Result, WorkspaceError};
use tokio::time::{sleep, Duration};
use tracing::warn;

/// Runs `f` until it succeeds, fails with a non-transient error, or `retries`
/// attempts have been made. The delay grows linearly with the attempt number.
pub async fn with_retry<F, Fut, T>(f: F, retries: u32, delay: Duration) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempts = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempts += 1;
                if attempts >= retries || !is_retryable(&e) {
                    return Err(e);
                }
                warn!(attempt = attempts, error = %e, "transient failure, retrying");
                sleep(delay * attempts).await;
            }
        }
    }
}

fn is_retryable(error: &WorkspaceError) -> bool {
    error.is_transient()
}
