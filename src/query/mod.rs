//! Tabular query execution for Sentra.
//!
//! Provides a trait-based interface over the managed query service, a poller
//! that drives a statement to a terminal state, and the row reshaping applied
//! to the first result page.

mod athena;
mod executor;
mod mock;
mod types;

pub use athena::{AthenaConfig, AthenaQueryService, DEFAULT_WORKGROUP};
pub use executor::QueryExecutor;
pub use mock::{MockQueryService, SubmittedQuery};
pub use types::{
    parse_result_page, ExecutionHandle, ExecutionState, ExecutionStatus, QueryOutcome,
    ResultPage, TabularRow,
};

use crate::error::Result;
use async_trait::async_trait;

/// Trait defining the interface for the managed query service.
///
/// Implementations only talk to the service; polling and reshaping live in
/// [`QueryExecutor`].
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Submits a statement against the given catalog and returns its handle.
    async fn start(&self, sql: &str, catalog: &str) -> Result<ExecutionHandle>;

    /// Reads the current state of a submitted statement.
    async fn status(&self, handle: &ExecutionHandle) -> Result<ExecutionStatus>;

    /// Fetches the first page of results of a succeeded statement.
    async fn first_page(&self, handle: &ExecutionHandle) -> Result<ResultPage>;

    /// Asks the service to stop a running statement.
    async fn stop(&self, handle: &ExecutionHandle) -> Result<()>;
}
