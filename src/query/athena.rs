//! Athena query service.
//!
//! Submits statements with their catalog as execution context and reads the
//! first page of results.

use async_trait::async_trait;
use aws_sdk_athena::error::DisplayErrorContext;
use aws_sdk_athena::types::{QueryExecutionContext, ResultConfiguration, ResultSet};
use aws_sdk_athena::Client;
use tracing::debug;

use super::types::{ExecutionHandle, ExecutionState, ExecutionStatus, ResultPage};
use super::QueryService;
use crate::error::{Result, SentraError};

/// Default Athena workgroup.
pub const DEFAULT_WORKGROUP: &str = "primary";

/// Configuration for the Athena query service.
#[derive(Debug, Clone)]
pub struct AthenaConfig {
    pub workgroup: String,
    /// S3 location where the service writes result files.
    pub output_location: String,
}

impl AthenaConfig {
    pub fn new(output_location: impl Into<String>) -> Self {
        Self {
            workgroup: DEFAULT_WORKGROUP.to_string(),
            output_location: output_location.into(),
        }
    }

    pub fn with_workgroup(mut self, workgroup: impl Into<String>) -> Self {
        self.workgroup = workgroup.into();
        self
    }
}

/// Query service backed by Amazon Athena.
pub struct AthenaQueryService {
    client: Client,
    config: AthenaConfig,
}

impl AthenaQueryService {
    pub fn new(client: Client, config: AthenaConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl QueryService for AthenaQueryService {
    async fn start(&self, sql: &str, catalog: &str) -> Result<ExecutionHandle> {
        let context = QueryExecutionContext::builder().database(catalog).build();
        let results = ResultConfiguration::builder()
            .output_location(&self.config.output_location)
            .build();

        let response = self
            .client
            .start_query_execution()
            .query_string(sql)
            .query_execution_context(context)
            .work_group(&self.config.workgroup)
            .result_configuration(results)
            .send()
            .await
            .map_err(|e| {
                SentraError::query(format!(
                    "Failed to start query: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        let id = response
            .query_execution_id()
            .ok_or_else(|| SentraError::query("Athena returned no query execution id"))?;

        debug!(query_id = id, workgroup = %self.config.workgroup, "Athena accepted statement");
        Ok(ExecutionHandle::new(id))
    }

    async fn status(&self, handle: &ExecutionHandle) -> Result<ExecutionStatus> {
        let response = self
            .client
            .get_query_execution()
            .query_execution_id(handle.as_str())
            .send()
            .await
            .map_err(|e| {
                SentraError::query(format!(
                    "Failed to read query status: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        let status = response.query_execution().and_then(|q| q.status());
        let state = status
            .and_then(|s| s.state())
            .map(|s| ExecutionState::parse(s.as_str()))
            .unwrap_or(ExecutionState::Running);
        let reason = status
            .and_then(|s| s.state_change_reason())
            .map(str::to_string);

        Ok(ExecutionStatus { state, reason })
    }

    async fn first_page(&self, handle: &ExecutionHandle) -> Result<ResultPage> {
        let response = self
            .client
            .get_query_results()
            .query_execution_id(handle.as_str())
            .send()
            .await
            .map_err(|e| {
                SentraError::query(format!(
                    "Failed to fetch query results: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(response.result_set().map(page_from_result_set).unwrap_or_default())
    }

    async fn stop(&self, handle: &ExecutionHandle) -> Result<()> {
        self.client
            .stop_query_execution()
            .query_execution_id(handle.as_str())
            .send()
            .await
            .map_err(|e| {
                SentraError::query(format!(
                    "Failed to stop query: {}",
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(())
    }
}

fn page_from_result_set(set: &ResultSet) -> ResultPage {
    let rows = set
        .rows()
        .iter()
        .map(|row| {
            row.data()
                .iter()
                .map(|datum| datum.var_char_value().map(str::to_string))
                .collect()
        })
        .collect();
    ResultPage::new(rows)
}
