//! Query execution types for Sentra.
//!
//! Defines execution handles, states, raw result pages and the row objects
//! built from them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// Opaque identifier for a submitted statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionHandle(String);

impl ExecutionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a submitted statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl ExecutionState {
    /// Returns the state name as the query service spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parses a state name. Unknown names are treated as still running.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "QUEUED" => Self::Queued,
            "SUCCEEDED" => Self::Succeeded,
            "FAILED" => Self::Failed,
            "CANCELLED" => Self::Cancelled,
            _ => Self::Running,
        }
    }

    /// Returns true once the statement will not change state again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status observation for a submitted statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionStatus {
    pub state: ExecutionState,
    /// Reason reported by the service on a state change, if any.
    pub reason: Option<String>,
}

impl ExecutionStatus {
    pub fn new(state: ExecutionState) -> Self {
        Self {
            state,
            reason: None,
        }
    }

    pub fn with_reason(state: ExecutionState, reason: impl Into<String>) -> Self {
        Self {
            state,
            reason: Some(reason.into()),
        }
    }
}

/// Raw first page of a result set, header row included.
///
/// Each cell is `None` when the service returned no value for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultPage {
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultPage {
    pub fn new(rows: Vec<Vec<Option<String>>>) -> Self {
        Self { rows }
    }

    /// Builds a page from a header and data rows of present values.
    pub fn from_strings(header: &[&str], data: &[&[&str]]) -> Self {
        let mut rows = Vec::with_capacity(data.len() + 1);
        rows.push(header.iter().map(|h| Some(h.to_string())).collect());
        for row in data {
            rows.push(row.iter().map(|c| Some(c.to_string())).collect());
        }
        Self { rows }
    }
}

/// One result row keyed by column header, in header order.
pub type TabularRow = Map<String, Value>;

/// Reshapes a raw result page into row objects.
///
/// Row 0 is the header. Every later row pairs `header[i]` with `cell[i]`;
/// missing trailing cells become `null` and extra cells are ignored.
/// A missing header cell is keyed by the empty string.
pub fn parse_result_page(page: &ResultPage) -> Vec<TabularRow> {
    let Some((header_row, data_rows)) = page.rows.split_first() else {
        return Vec::new();
    };

    let headers: Vec<String> = header_row
        .iter()
        .map(|h| h.clone().unwrap_or_default())
        .collect();

    data_rows
        .iter()
        .map(|cells| {
            let mut row = Map::with_capacity(headers.len());
            for (i, header) in headers.iter().enumerate() {
                let value = match cells.get(i) {
                    Some(Some(cell)) => Value::String(cell.clone()),
                    _ => Value::Null,
                };
                row.insert(header.clone(), value);
            }
            row
        })
        .collect()
}

/// Final outcome of executing a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// The statement succeeded; rows from the first result page.
    Rows {
        handle: ExecutionHandle,
        rows: Vec<TabularRow>,
    },
    /// The statement ended in FAILED or CANCELLED.
    Failed {
        handle: ExecutionHandle,
        state: ExecutionState,
        reason: Option<String>,
    },
    /// The poll deadline passed before a terminal state was reached.
    TimedOut {
        handle: ExecutionHandle,
        waited: Duration,
    },
}

impl QueryOutcome {
    pub fn handle(&self) -> &ExecutionHandle {
        match self {
            Self::Rows { handle, .. } | Self::Failed { handle, .. } | Self::TimedOut { handle, .. } => {
                handle
            }
        }
    }

    pub fn rows(&self) -> Option<&[TabularRow]> {
        match self {
            Self::Rows { rows, .. } => Some(rows),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Rows { .. })
    }

    /// State name for reporting: SUCCEEDED, FAILED, CANCELLED or TIMED_OUT.
    pub fn state_name(&self) -> &'static str {
        match self {
            Self::Rows { .. } => ExecutionState::Succeeded.as_str(),
            Self::Failed { state, .. } => state.as_str(),
            Self::TimedOut { .. } => "TIMED_OUT",
        }
    }

    /// Failure description, or `None` on success.
    ///
    /// Never JSON: callers tell failures apart from rows by this.
    pub fn failure_message(&self) -> Option<String> {
        match self {
            Self::Rows { .. } => None,
            Self::Failed { state, reason, .. } => {
                let mut msg = format!("Athena query failed: {state}");
                if let Some(reason) = reason {
                    msg.push_str(" - Reason: ");
                    msg.push_str(reason);
                }
                Some(msg)
            }
            Self::TimedOut { waited, .. } => Some(format!(
                "Athena query timed out after {}s",
                waited.as_secs()
            )),
        }
    }

    /// Renders the outcome as tool output: a JSON array of rows, or the failure text.
    pub fn to_tool_content(&self) -> String {
        match self {
            Self::Rows { rows, .. } => {
                serde_json::to_string(rows).unwrap_or_else(|_| "[]".to_string())
            }
            _ => self.failure_message().unwrap_or_default(),
        }
    }
}
