//! Database retry logic
//!
//! Exponential backoff for transient SQLite lock contention.

use hotspot_common::{Error, Result};
use std::time::{Duration, Instant};

/// Default upper bound on time spent retrying a locked write
pub const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;

/// First backoff delay
const INITIAL_BACKOFF_MS: u64 = 10;
/// Backoff ceiling
const MAX_BACKOFF_MS: u64 = 1000;

/// Retry a database operation while it reports lock contention
///
/// **Algorithm:**
/// 1. Attempt operation
/// 2. Success → return result
/// 3. "database is locked" → back off (10ms doubling to 1000ms) and retry
///    until `max_wait_ms` elapses, then fail with `Error::Internal`
/// 4. Any other error → return immediately
pub async fn retry_on_lock<F, Fut, T>(operation_name: &str, max_wait_ms: u64, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    retry_while(operation_name, max_wait_ms, Error::is_lock_contention, operation).await
}

/// Retry loop with a caller-supplied retryable-error predicate
async fn retry_while<F, Fut, T, P>(
    operation_name: &str,
    max_wait_ms: u64,
    is_retryable: P,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
    P: Fn(&Error) -> bool,
{
    let start_time = Instant::now();
    let max_duration = Duration::from_millis(max_wait_ms);
    let mut attempt = 0u32;
    let mut backoff_ms = INITIAL_BACKOFF_MS;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    let elapsed_ms = start_time.elapsed().as_millis();
                    if elapsed_ms > 2000 {
                        tracing::warn!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms,
                            "Database operation succeeded after significant retry period (>2s)"
                        );
                    } else {
                        tracing::debug!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms,
                            "Database operation succeeded after retry"
                        );
                    }
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_retryable(&err) {
                    return Err(err);
                }

                let elapsed = start_time.elapsed();
                if elapsed >= max_duration {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis(),
                        max_wait_ms,
                        "Database operation failed: max retry time exceeded"
                    );
                    return Err(Error::Internal(format!(
                        "{}: database locked after {} attempts ({} ms elapsed, max {} ms)",
                        operation_name,
                        attempt,
                        elapsed.as_millis(),
                        max_wait_ms
                    )));
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    elapsed_ms = elapsed.as_millis(),
                    backoff_ms,
                    "Database locked, will retry after backoff"
                );

                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
            }
        }
    }
}
