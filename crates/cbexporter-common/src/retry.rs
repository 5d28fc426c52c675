use std::{future::Future, time::Duration};

use tokio::time::{Instant, sleep, timeout_at};
use tracing::debug;

use crate::error::{ExporterError, Result};

/// Budget for one retry round: a fixed delay between attempts, a maximum
/// number of attempts and an overall deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub interval: Duration,
    pub attempts: usize,
}

impl RetryPolicy {
    pub const fn new(timeout: Duration, interval: Duration, attempts: usize) -> Self {
        Self {
            timeout,
            interval,
            attempts,
        }
    }
}

/// Runs `operation` until it yields `Some`, sleeping `policy.interval` between
/// attempts.
///
/// `Ok(None)` means "not ready yet" and `Err` means the attempt failed; both
/// are retried. The round stops after `policy.attempts` invocations or once
/// `policy.timeout` has elapsed, whichever comes first. An attempt already in
/// flight is not interrupted by the deadline.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + policy.timeout;
    let mut last_error = None;

    for attempt in 1..=policy.attempts {
        if Instant::now() >= deadline {
            return Err(ExporterError::DeadlineExceeded {
                attempts: attempt - 1,
            });
        }

        match operation().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => last_error = None,
            Err(err) => {
                debug!(attempt, error = %err, "retry attempt failed");
                last_error = Some(err.to_string());
            }
        }

        if attempt == policy.attempts {
            break;
        }

        if timeout_at(deadline, sleep(policy.interval)).await.is_err() {
            return Err(ExporterError::DeadlineExceeded { attempts: attempt });
        }
    }

    Err(ExporterError::RetryExhausted {
        attempts: policy.attempts,
        last_error: last_error.unwrap_or_else(|| "condition not met".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::{RetryPolicy, retry};
    use crate::error::ExporterError;

    fn failing() -> std::future::Ready<crate::Result<Option<()>>> {
        std::future::ready(Err(ExporterError::InternalError("boom".to_string())))
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_runs_exactly_max_attempts() {
        let policy = RetryPolicy::new(Duration::from_secs(600), Duration::from_secs(1), 4);
        let mut calls = 0;

        let result = retry(&policy, || {
            calls += 1;
            failing()
        })
        .await;

        assert_eq!(calls, 4);
        match result {
            Err(ExporterError::RetryExhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 4);
                assert!(last_error.contains("boom"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn no_sleep_after_last_attempt() {
        let policy = RetryPolicy::new(Duration::from_secs(600), Duration::from_secs(1), 3);
        let started = Instant::now();

        let _ = retry(&policy, failing).await;

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_stops_before_attempt_budget() {
        let policy = RetryPolicy::new(Duration::from_secs(50), Duration::from_secs(20), 10);
        let mut calls = 0;

        let result = retry(&policy, || {
            calls += 1;
            failing()
        })
        .await;

        assert_eq!(calls, 3);
        assert!(matches!(
            result,
            Err(ExporterError::DeadlineExceeded { attempts: 3 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn returns_value_once_ready() {
        let policy = RetryPolicy::new(Duration::from_secs(60), Duration::from_secs(5), 8);
        let mut calls = 0;

        let value = retry(&policy, || {
            calls += 1;
            let ready = (calls >= 3).then_some(calls * 10);
            std::future::ready(Ok(ready))
        })
        .await
        .expect("third attempt succeeds");

        assert_eq!(value, 30);
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn not_ready_exhaustion_reports_condition() {
        let policy = RetryPolicy::new(Duration::from_secs(60), Duration::from_secs(1), 2);

        let result = retry(&policy, || std::future::ready(Ok(None::<()>))).await;

        match result {
            Err(ExporterError::RetryExhausted { last_error, .. }) => {
                assert_eq!(last_error, "condition not met");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
