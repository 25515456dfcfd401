//! Mock query service for testing.
//!
//! Scripts the state sequence and result page of every submitted statement
//! and records what was submitted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::types::{ExecutionHandle, ExecutionState, ExecutionStatus, ResultPage};
use super::QueryService;
use crate::error::{Result, SentraError};

/// A statement the mock received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedQuery {
    pub handle: ExecutionHandle,
    pub sql: String,
    pub catalog: String,
}

/// A query service that replays a scripted state sequence.
///
/// Every status call advances through `states`; once the script is exhausted
/// the last state is repeated.
pub struct MockQueryService {
    states: Vec<ExecutionStatus>,
    page: ResultPage,
    start_error: Option<String>,
    submitted: Mutex<Vec<SubmittedQuery>>,
    stopped: Mutex<Vec<ExecutionHandle>>,
    status_calls: AtomicUsize,
}

impl MockQueryService {
    /// Creates a mock whose statements succeed at once with a sample customer page.
    pub fn new() -> Self {
        Self {
            states: vec![ExecutionStatus::new(ExecutionState::Succeeded)],
            page: sample_customer_page(),
            start_error: None,
            submitted: Mutex::new(Vec::new()),
            stopped: Mutex::new(Vec::new()),
            status_calls: AtomicUsize::new(0),
        }
    }

    /// Sets the state sequence reported by status polls.
    pub fn with_states(mut self, states: Vec<ExecutionStatus>) -> Self {
        if !states.is_empty() {
            self.states = states;
        }
        self
    }

    /// Sets the first result page returned for succeeded statements.
    pub fn with_page(mut self, page: ResultPage) -> Self {
        self.page = page;
        self
    }

    /// Makes every submit fail with the given message.
    pub fn failing_start(mut self, message: impl Into<String>) -> Self {
        self.start_error = Some(message.into());
        self
    }

    /// Returns every statement submitted so far.
    pub fn submitted(&self) -> Vec<SubmittedQuery> {
        self.submitted
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Returns the handles the executor asked to stop.
    pub fn stopped(&self) -> Vec<ExecutionHandle> {
        self.stopped.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Returns how many status polls were made.
    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockQueryService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryService for MockQueryService {
    async fn start(&self, sql: &str, catalog: &str) -> Result<ExecutionHandle> {
        if let Some(message) = &self.start_error {
            return Err(SentraError::query(message.clone()));
        }

        let mut submitted = self
            .submitted
            .lock()
            .map_err(|_| SentraError::internal("mock query log poisoned"))?;
        let handle = ExecutionHandle::new(format!("mock-query-{}", submitted.len() + 1));
        submitted.push(SubmittedQuery {
            handle: handle.clone(),
            sql: sql.to_string(),
            catalog: catalog.to_string(),
        });
        Ok(handle)
    }

    async fn status(&self, _handle: &ExecutionHandle) -> Result<ExecutionStatus> {
        let call = self.status_calls.fetch_add(1, Ordering::SeqCst);
        let idx = call.min(self.states.len() - 1);
        Ok(self.states[idx].clone())
    }

    async fn first_page(&self, _handle: &ExecutionHandle) -> Result<ResultPage> {
        Ok(self.page.clone())
    }

    async fn stop(&self, handle: &ExecutionHandle) -> Result<()> {
        if let Ok(mut stopped) = self.stopped.lock() {
            stopped.push(handle.clone());
        }
        Ok(())
    }
}

/// A small customer listing, including one row outside the CIF key space.
fn sample_customer_page() -> ResultPage {
    ResultPage::from_strings(
        &["CIF_NO", "CUSTOMER_NAME", "MOBILE_PHONE", "EMAIL_ADDRESS"],
        &[
            &["CIF200001", "Aarav Mehta", "9800000001", "aarav.mehta@example.com"],
            &["CIF200018", "Diya Sharma", "9800000018", "diya.sharma@example.com"],
            &["CIF200042", "Kabir Rao", "9800000042", "kabir.rao@example.com"],
            &["TEST0001", "Test Account", "", ""],
        ],
    )
}
