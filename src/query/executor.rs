//! Statement poller.
//!
//! Submits a statement, polls it at a fixed interval until it reaches a
//! terminal state or the deadline passes, and reshapes the first result page.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::types::{parse_result_page, ExecutionHandle, ExecutionState, QueryOutcome};
use super::QueryService;
use crate::error::{Result, SentraError};

/// Default interval between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default overall deadline for one statement.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Runs statements against a [`QueryService`] to completion.
#[derive(Clone)]
pub struct QueryExecutor {
    service: Arc<dyn QueryService>,
    poll_interval: Duration,
    timeout: Duration,
}

impl QueryExecutor {
    /// Creates an executor with the default interval and deadline.
    pub fn new(service: Arc<dyn QueryService>) -> Self {
        Self {
            service,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the interval between status polls.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the overall deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Executes a statement and waits for its outcome.
    ///
    /// Service errors (submit, status or result fetch) are returned as `Err`.
    /// A statement that ends FAILED or CANCELLED, or outlives the deadline,
    /// is a normal [`QueryOutcome`].
    pub async fn run(&self, sql: &str, catalog: &str) -> Result<QueryOutcome> {
        if sql.trim().is_empty() {
            return Err(SentraError::query("SQL statement is empty"));
        }

        let started = Instant::now();
        let handle = self.service.start(sql, catalog).await?;
        info!(query_id = %handle, catalog, "Submitted statement");
        let mut guard = StopOnDrop::new(self.service.clone(), handle.clone());

        let status = loop {
            let status = self.service.status(&handle).await?;
            debug!(query_id = %handle, state = %status.state, "Polled statement");

            if status.state.is_terminal() {
                guard.disarm();
                break status;
            }

            let waited = started.elapsed();
            if waited >= self.timeout {
                warn!(
                    query_id = %handle,
                    timeout_secs = self.timeout.as_secs(),
                    "Statement exceeded deadline, stopping"
                );
                guard.disarm();
                if let Err(e) = self.service.stop(&handle).await {
                    warn!(query_id = %handle, error = %e, "Failed to stop statement");
                }
                return Ok(QueryOutcome::TimedOut {
                    handle,
                    waited: self.timeout,
                });
            }

            tokio::time::sleep(self.poll_interval).await;
        };

        let duration_ms = started.elapsed().as_millis() as u64;

        if status.state != ExecutionState::Succeeded {
            warn!(
                query_id = %handle,
                state = %status.state,
                reason = status.reason.as_deref().unwrap_or(""),
                duration_ms,
                "Statement did not succeed"
            );
            return Ok(QueryOutcome::Failed {
                handle,
                state: status.state,
                reason: status.reason,
            });
        }

        let page = self.service.first_page(&handle).await?;
        let rows = parse_result_page(&page);
        info!(query_id = %handle, rows = rows.len(), duration_ms, "Statement succeeded");

        Ok(QueryOutcome::Rows { handle, rows })
    }
}

/// Stops a submitted statement if `run` is dropped before it finishes,
/// e.g. when the caller's own timeout fires mid-poll.
struct StopOnDrop {
    service: Arc<dyn QueryService>,
    handle: Option<ExecutionHandle>,
}

impl StopOnDrop {
    fn new(service: Arc<dyn QueryService>, handle: ExecutionHandle) -> Self {
        Self {
            service,
            handle: Some(handle),
        }
    }

    fn disarm(&mut self) {
        self.handle = None;
    }
}

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        // Also reached when a status poll fails.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(query_id = %handle, "No runtime to stop abandoned statement");
            return;
        };
        let service = self.service.clone();
        runtime.spawn(async move {
            info!(query_id = %handle, "Stopping abandoned statement");
            if let Err(e) = service.stop(&handle).await {
                warn!(query_id = %handle, error = %e, "Failed to stop statement");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{ExecutionStatus, MockQueryService, ResultPage};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn executor(service: MockQueryService) -> (Arc<MockQueryService>, QueryExecutor) {
        let service = Arc::new(service);
        let executor = QueryExecutor::new(service.clone());
        (service, executor)
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_returns_rows_after_polling() {
        let page = ResultPage::new(vec![
            vec![Some("CIF_NO".into()), Some("NAME".into())],
            vec![Some("CIF1".into()), Some("A".into())],
            vec![Some("CIF2".into())],
        ]);
        let (service, executor) = executor(
            MockQueryService::new()
                .with_states(vec![
                    ExecutionStatus::new(ExecutionState::Queued),
                    ExecutionStatus::new(ExecutionState::Running),
                    ExecutionStatus::new(ExecutionState::Succeeded),
                ])
                .with_page(page),
        );

        let outcome = executor.run("SELECT * FROM t", "sentra_db").await.unwrap();

        let rows = outcome.rows().unwrap();
        assert_eq!(
            serde_json::to_value(rows).unwrap(),
            json!([
                {"CIF_NO": "CIF1", "NAME": "A"},
                {"CIF_NO": "CIF2", "NAME": null}
            ])
        );
        assert_eq!(service.status_calls(), 3);

        let submitted = service.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].catalog, "sentra_db");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_waits_poll_interval_between_checks() {
        let (_, executor) = executor(MockQueryService::new().with_states(vec![
            ExecutionStatus::new(ExecutionState::Running),
            ExecutionStatus::new(ExecutionState::Running),
            ExecutionStatus::new(ExecutionState::Succeeded),
        ]));

        let before = Instant::now();
        executor.run("SELECT 1", "sentra_db").await.unwrap();

        assert_eq!(before.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_header_only_is_empty() {
        let (_, executor) = executor(
            MockQueryService::new().with_page(ResultPage::from_strings(&["CIF_NO"], &[])),
        );

        let outcome = executor.run("SELECT CIF_NO FROM t", "sentra_db").await.unwrap();

        assert_eq!(outcome.to_tool_content(), "[]");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_failed_returns_failure_text() {
        let (_, executor) = executor(MockQueryService::new().with_states(vec![
            ExecutionStatus::new(ExecutionState::Running),
            ExecutionStatus::with_reason(ExecutionState::Failed, "TABLE_NOT_FOUND"),
        ]));

        let outcome = executor.run("SELECT * FROM missing", "insurance_db").await.unwrap();

        assert!(!outcome.is_success());
        assert_eq!(
            outcome.to_tool_content(),
            "Athena query failed: FAILED - Reason: TABLE_NOT_FOUND"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_cancelled_is_not_rows() {
        let (_, executor) = executor(
            MockQueryService::new()
                .with_states(vec![ExecutionStatus::new(ExecutionState::Cancelled)]),
        );

        let outcome = executor.run("SELECT 1", "sentra_db").await.unwrap();

        match outcome {
            QueryOutcome::Failed { state, .. } => assert_eq!(state, ExecutionState::Cancelled),
            _ => panic!("Expected Failed outcome"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_times_out_and_stops() {
        let (service, executor) = executor(
            MockQueryService::new()
                .with_states(vec![ExecutionStatus::new(ExecutionState::Running)]),
        );
        let executor = executor.with_timeout(Duration::from_secs(5));

        let outcome = executor.run("SELECT 1", "sentra_db").await.unwrap();

        match &outcome {
            QueryOutcome::TimedOut { waited, .. } => assert_eq!(*waited, Duration::from_secs(5)),
            _ => panic!("Expected TimedOut outcome"),
        }
        assert_eq!(
            outcome.failure_message().as_deref(),
            Some("Athena query timed out after 5s")
        );
        assert_eq!(service.stopped().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_run_stops_statement() {
        let (service, executor) = executor(
            MockQueryService::new()
                .with_states(vec![ExecutionStatus::new(ExecutionState::Running)]),
        );

        let result =
            tokio::time::timeout(Duration::from_secs(3), executor.run("SELECT 1", "sentra_db")).await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(service.stopped().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_run_does_not_stop() {
        let (service, executor) = executor(MockQueryService::new());

        executor.run("SELECT 1", "sentra_db").await.unwrap();

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(service.stopped().is_empty());
    }

    #[tokio::test]
    async fn test_run_rejects_empty_sql() {
        let (service, executor) = executor(MockQueryService::new());

        let result = executor.run("   ", "sentra_db").await;

        assert!(result.is_err());
        assert!(service.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_run_propagates_submit_error() {
        let (_, executor) = executor(MockQueryService::new().failing_start("access denied"));

        let err = executor.run("SELECT 1", "sentra_db").await.unwrap_err();

        assert_eq!(err.to_string(), "Query error: access denied");
    }
}
