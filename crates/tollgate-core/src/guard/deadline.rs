//! Deadline envelope for composite jobs.
//!
//! Wraps a job in a bounded deadline. On overrun the job's cancellation
//! token is triggered and the caller gets the distinct `Timeout` outcome at
//! the deadline, not when the job would have finished on its own.
//!
//! Cancellation is cooperative: the job observes the token between
//! sub-steps. A remote sub-call already in flight is not interrupted -- it
//! finishes or fails on its own terms inside the detached task, and any
//! budget it consumed at admission time stands. Only the decision to issue
//! further sub-operations is cancelled, so a timeout never double-charges
//! or silently retries.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use tollgate_types::error::{Result, TollgateError};

/// Run `job` under `deadline`.
///
/// The job receives a [`CancellationToken`] and is expected to check it (or
/// `select!` on `cancelled()`) between sub-steps. When the deadline fires
/// the token is cancelled and `Timeout` is returned immediately; the job
/// task is left to wind down on its own rather than being aborted.
pub async fn run_with_deadline<F, Fut, T>(operation: &str, deadline: Duration, job: F) -> Result<T>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let cancel = CancellationToken::new();
    let task = tokio::spawn(job(cancel.clone()));

    match tokio::time::timeout(deadline, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => {
            // Surface job panics to the caller unchanged.
            if join_err.is_panic() {
                std::panic::resume_unwind(join_err.into_panic());
            }
            // The task can only be cancelled externally; report the overrun.
            Err(TollgateError::Timeout {
                operation: operation.to_string(),
            })
        }
        Err(_elapsed) => {
            warn!(
                operation,
                deadline_ms = deadline.as_millis() as u64,
                "job deadline exceeded, signalling cooperative cancellation"
            );
            cancel.cancel();
            Err(TollgateError::Timeout {
                operation: operation.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    #[tokio::test]
    async fn fast_job_completes() {
        let result = run_with_deadline("quick", Duration::from_millis(200), |_cancel| async {
            Ok(99u64)
        })
        .await;
        assert_eq!(result.unwrap(), 99);
    }

    #[tokio::test]
    async fn slow_job_times_out_at_deadline_not_completion() {
        let started = Instant::now();
        // The job would take ~90ms; the deadline is 30ms.
        let result: Result<()> =
            run_with_deadline("slow", Duration::from_millis(30), |_cancel| async {
                tokio::time::sleep(Duration::from_millis(90)).await;
                Ok(())
            })
            .await;
        let elapsed = started.elapsed();

        assert!(matches!(
            result,
            Err(TollgateError::Timeout { ref operation }) if operation == "slow"
        ));
        assert!(
            elapsed < Duration::from_millis(80),
            "timeout returned at {elapsed:?}, should be near the 30ms deadline"
        );
    }

    #[tokio::test]
    async fn cancellation_stops_further_steps_but_keeps_committed_ones() {
        let steps = Arc::new(AtomicUsize::new(0));
        let steps_in_job = Arc::clone(&steps);

        let result: Result<()> =
            run_with_deadline("stepped", Duration::from_millis(45), move |cancel| async move {
                for _ in 0..20 {
                    if cancel.is_cancelled() {
                        // Observe the signal between sub-steps and stop
                        // issuing further operations.
                        return Err(TollgateError::Timeout {
                            operation: "stepped".into(),
                        });
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    steps_in_job.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(TollgateError::Timeout { .. })));

        // Give the detached task time to observe the token and wind down.
        tokio::time::sleep(Duration::from_millis(40)).await;
        let settled = steps.load(Ordering::SeqCst);
        assert!(
            settled < 20,
            "cancellation should stop the loop early, ran {settled} steps"
        );

        // Committed steps stand; nothing rolls back and nothing new runs.
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(steps.load(Ordering::SeqCst), settled);
    }

    #[tokio::test]
    async fn in_flight_step_finishes_on_its_own_terms() {
        let finished = Arc::new(AtomicUsize::new(0));
        let finished_in_job = Arc::clone(&finished);

        // One long sub-step is mid-flight when the deadline fires. The
        // envelope returns immediately, but the detached step still runs to
        // completion and its effect stands.
        let result: Result<()> =
            run_with_deadline("one-step", Duration::from_millis(20), move |_cancel| async move {
                tokio::time::sleep(Duration::from_millis(60)).await;
                finished_in_job.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(TollgateError::Timeout { .. })));
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn job_error_propagates_unchanged() {
        let result: Result<()> =
            run_with_deadline("failing", Duration::from_millis(100), |_cancel| async {
                Err(TollgateError::Source {
                    message: "upstream exploded".into(),
                })
            })
            .await;
        // A business failure is not a Timeout.
        assert!(matches!(result, Err(TollgateError::Source { .. })));
    }
}
