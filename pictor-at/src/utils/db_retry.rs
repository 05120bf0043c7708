//! Database Retry Logic
//!
//! Exponential backoff for transient SQLite lock errors. Retries are
//! bounded by the `at_database_max_lock_wait_ms` setting.

use pictor_common::{Error, Result};
use std::time::{Duration, Instant};

/// First backoff delay; doubles per retry up to [`MAX_BACKOFF_MS`]
const INITIAL_BACKOFF_MS: u64 = 10;
const MAX_BACKOFF_MS: u64 = 1_000;

/// Post-success reporting tiers: a retried operation that took this long
/// is worth surfacing above debug level
const SLOW_RETRY_WARN_MS: u128 = 2_000;
const SLOW_RETRY_ERROR_MS: u128 = 5_000;

/// Retry a database operation with exponential backoff until `max_wait_ms`
/// elapses.
///
/// Only "database is locked" errors from sqlx retry; any other error
/// returns immediately. Each retry doubles the delay (10ms start, 1000ms
/// cap), and exhausting the budget converts the lock error into
/// `Error::Internal` with the attempt count.
///
/// # Arguments
/// * `operation_name` - Name for logging (e.g., "queue item save")
/// * `max_wait_ms` - Maximum total time to retry
/// * `operation` - Async closure that performs the database operation
pub async fn retry_on_lock<F, Fut, T>(
    operation_name: &str,
    max_wait_ms: u64,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let started = Instant::now();
    let budget = Duration::from_millis(max_wait_ms);
    let mut attempts: u32 = 0;
    let mut delay_ms = INITIAL_BACKOFF_MS;

    loop {
        attempts += 1;

        if attempts > 1 {
            tracing::debug!(
                operation = operation_name,
                attempts,
                "Retrying database operation"
            );
        }

        let err = match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    report_slow_success(operation_name, attempts, started.elapsed().as_millis());
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !is_lock_contention(&err) {
            return Err(err);
        }

        let elapsed = started.elapsed();
        if elapsed >= budget {
            tracing::error!(
                operation = operation_name,
                attempts,
                elapsed_ms = elapsed.as_millis(),
                max_wait_ms,
                "Database operation failed: max retry time exceeded"
            );
            return Err(Error::Internal(format!(
                "Database locked after {} attempts ({} ms elapsed, max {} ms)",
                attempts,
                elapsed.as_millis(),
                max_wait_ms
            )));
        }

        tracing::warn!(
            operation = operation_name,
            attempts,
            elapsed_ms = elapsed.as_millis(),
            backoff_ms = delay_ms,
            remaining_ms = budget.saturating_sub(elapsed).as_millis(),
            "Database locked, will retry after backoff"
        );

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        delay_ms = (delay_ms * 2).min(MAX_BACKOFF_MS);
    }
}

/// Only sqlx-level lock errors are retryable; everything else, including a
/// non-database error that merely mentions locking, surfaces immediately
fn is_lock_contention(err: &Error) -> bool {
    matches!(err, Error::Database(db_err) if db_err.to_string().contains("database is locked"))
}

fn report_slow_success(operation_name: &str, attempts: u32, elapsed_ms: u128) {
    if elapsed_ms > SLOW_RETRY_ERROR_MS {
        tracing::error!(
            operation = operation_name,
            attempts,
            elapsed_ms,
            "Database operation succeeded after extended lock contention"
        );
    } else if elapsed_ms > SLOW_RETRY_WARN_MS {
        tracing::warn!(
            operation = operation_name,
            attempts,
            elapsed_ms,
            "Database operation succeeded after noticeable lock contention"
        );
    } else {
        tracing::debug!(
            operation = operation_name,
            attempts,
            elapsed_ms,
            "Database operation succeeded after retry"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_retry_succeeds_first_attempt() {
        let result = retry_on_lock("test_op", 5000, || async { Ok::<i32, Error>(42) }).await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_non_lock_error_fails_immediately() {
        let mut attempts = 0;

        let result = retry_on_lock("test_op", 5000, || {
            attempts += 1;
            async move { Err::<i32, Error>(Error::Internal("other error".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts, 1); // no retry for non-lock errors
    }

    #[tokio::test]
    async fn test_lock_message_in_non_database_error_not_retried() {
        // Only Error::Database carries retryable lock errors; an Internal
        // error with the same message fails straight through.
        let mut attempts = 0;

        let result = retry_on_lock("test_op", 50, || {
            attempts += 1;
            async move { Err::<i32, Error>(Error::Internal("database is locked".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_lock_contention_requires_database_error() {
        assert!(!is_lock_contention(&Error::Internal(
            "database is locked".to_string()
        )));
        assert!(!is_lock_contention(&Error::Config(
            "unrelated".to_string()
        )));
    }
}
