use crate::{Result, TaskDescriptor, TaskRun, TaskStatus};
use etl_log::StructuredLogger;
use std::future::Future;

/// Result of [`run_with_retry`]: the final run state plus the task's value or
/// its last error.
#[derive(Debug)]
pub struct TaskOutcome<T> {
    pub run: TaskRun,
    pub result: Result<T>,
}

impl<T> TaskOutcome<T> {
    pub fn status(&self) -> TaskStatus {
        self.run.status
    }

    pub fn into_result(self) -> Result<T> {
        self.result
    }
}

/// Execute `work` under the descriptor's retry policy.
///
/// `work` receives the 1-based attempt number and is invoked afresh for
/// every attempt. Defined negative outcomes end the run at once; other
/// failures are retried after `retry_delay` while the policy allows it. Each
/// retried failure is audited as WARN and a run that exhausts its attempts
/// is audited as ERROR.
pub async fn run_with_retry<T, F, Fut>(
    descriptor: &TaskDescriptor,
    logger: &StructuredLogger,
    mut work: F,
) -> TaskOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let policy = &descriptor.policy;
    let mut run = TaskRun::new(descriptor);

    loop {
        run.start();
        tracing::debug!(
            "Running task {} (attempt {}/{})",
            descriptor.name,
            run.attempts,
            policy.max_attempts()
        );

        let error = match work(run.attempts).await {
            Ok(value) => {
                run.succeed();
                tracing::info!(
                    "Task {} succeeded after {} attempt(s)",
                    descriptor.name,
                    run.attempts
                );
                return TaskOutcome {
                    run,
                    result: Ok(value),
                };
            }
            Err(e) => e,
        };

        if error.is_defined_outcome() {
            tracing::debug!("Task {} ended: {}", descriptor.name, error);
            run.fail(error.to_string());
            return TaskOutcome {
                run,
                result: Err(error),
            };
        }

        if policy.allows_retry(&error, run.attempts) {
            let detail = format!(
                "{} attempt {}/{} failed: {}; retrying in {:?}",
                descriptor.name,
                run.attempts,
                policy.max_attempts(),
                error,
                policy.retry_delay
            );
            logger.warn(&descriptor.module, "Retry", &detail).await;

            run.retry(error.to_string());
            tokio::time::sleep(policy.retry_delay).await;
            continue;
        }

        let detail = format!(
            "{} failed after {} attempt(s): {}",
            descriptor.name, run.attempts, error
        );
        logger.error(&descriptor.module, "Failed", &detail).await;

        run.fail(error.to_string());
        return TaskOutcome {
            run,
            result: Err(error),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RetryOn, RetryPolicy, TaskError};
    use etl_log::{LogMode, LogRecord, LoggerConfig};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    fn logger_in(dir: &TempDir) -> StructuredLogger {
        StructuredLogger::new(LoggerConfig {
            dir: dir.path().to_path_buf(),
            ..Default::default()
        })
    }

    async fn modes(logger: &StructuredLogger) -> Vec<LogMode> {
        match tokio::fs::read_to_string(logger.partition_path()).await {
            Ok(content) => content
                .lines()
                .filter_map(LogRecord::from_line)
                .map(|r| r.mode)
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_task_attempted_bound_times() {
        let tmp = TempDir::new().unwrap();
        let logger = logger_in(&tmp);
        let descriptor = TaskDescriptor::new("always_fails", "Test")
            .with_policy(RetryPolicy::new(3, Duration::from_secs(30)));
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let started = tokio::time::Instant::now();
        let outcome: TaskOutcome<()> = run_with_retry(&descriptor, &logger, move |_| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TaskError::Storage("connection reset".into()))
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(outcome.status(), TaskStatus::Failed);
        assert_eq!(outcome.run.attempts, 4);
        assert!(matches!(outcome.result, Err(TaskError::Storage(_))));
        assert!(started.elapsed() >= Duration::from_secs(90));

        let modes = modes(&logger).await;
        assert_eq!(modes.iter().filter(|m| **m == LogMode::Warn).count(), 3);
        assert_eq!(modes.iter().filter(|m| **m == LogMode::Error).count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_single_attempt() {
        let tmp = TempDir::new().unwrap();
        let logger = logger_in(&tmp);
        let descriptor = TaskDescriptor::new("once", "Test");
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let outcome: TaskOutcome<()> = run_with_retry(&descriptor, &logger, move |_| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TaskError::Connection("refused".into()))
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.status(), TaskStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let tmp = TempDir::new().unwrap();
        let logger = logger_in(&tmp);
        let descriptor = TaskDescriptor::new("flaky", "Test")
            .with_policy(RetryPolicy::new(2, Duration::from_secs(20)));

        let outcome = run_with_retry(&descriptor, &logger, |attempt| async move {
            if attempt < 2 {
                Err(TaskError::Storage("503 slow down".into()))
            } else {
                Ok(attempt * 10)
            }
        })
        .await;

        assert_eq!(outcome.status(), TaskStatus::Success);
        assert_eq!(outcome.run.attempts, 2);
        assert_eq!(outcome.into_result().unwrap(), 20);
        assert_eq!(modes(&logger).await, vec![LogMode::Warn]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_notice_reports_delay() {
        let tmp = TempDir::new().unwrap();
        let logger = logger_in(&tmp);
        let descriptor = TaskDescriptor::new("quick", "Test")
            .with_policy(RetryPolicy::new(1, Duration::from_millis(500)));

        let _: TaskOutcome<()> = run_with_retry(&descriptor, &logger, |_| async {
            Err(TaskError::Storage("503 slow down".into()))
        })
        .await;

        let content = tokio::fs::read_to_string(logger.partition_path())
            .await
            .unwrap();
        let notice = content
            .lines()
            .filter_map(LogRecord::from_line)
            .find(|r| r.primary_message == "Retry")
            .unwrap();
        assert_eq!(
            notice.observation.as_deref(),
            Some("quick attempt 1/2 failed: Storage error: 503 slow down; retrying in 500ms")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_defined_outcome_short_circuits() {
        let tmp = TempDir::new().unwrap();
        let logger = logger_in(&tmp);
        let descriptor = TaskDescriptor::new("extract", "S3").with_policy(
            RetryPolicy::new(3, Duration::from_secs(30)).with_retry_on(RetryOn::AnyError),
        );
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let outcome: TaskOutcome<()> = run_with_retry(&descriptor, &logger, move |_| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TaskError::NotFound("raw/missing.parquet".into()))
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.status(), TaskStatus::Failed);
        assert!(matches!(outcome.result, Err(TaskError::NotFound(_))));
        assert!(modes(&logger).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_not_retried_under_transient_policy() {
        let tmp = TempDir::new().unwrap();
        let logger = logger_in(&tmp);
        let descriptor = TaskDescriptor::new("decode", "S3")
            .with_policy(RetryPolicy::new(3, Duration::from_secs(30)));
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let outcome: TaskOutcome<()> = run_with_retry(&descriptor, &logger, move |_| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TaskError::Codec("invalid parquet footer".into()))
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.status(), TaskStatus::Failed);
        assert_eq!(modes(&logger).await, vec![LogMode::Error]);
    }
}
