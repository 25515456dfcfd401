//! LLM tool definitions for function calling.
//!
//! The agent has one tool, `athena_query`, which runs a read-only SQL
//! statement against one of the registered catalogs.

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogRegistry;

/// Name of the query tool.
pub const ATHENA_QUERY_TOOL: &str = "athena_query";

/// Tool definition for LLM function calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Input parameters for the athena_query tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AthenaQueryInput {
    pub sql: String,
    pub database: String,
}

/// Returns the tool definitions available to the LLM.
///
/// The `database` parameter is restricted to the registered catalog names.
pub fn get_tool_definitions(catalogs: &CatalogRegistry) -> Vec<ToolDefinition> {
    let routing = catalogs
        .iter()
        .map(|c| {
            let domain = if c.domain.is_empty() { "other" } else { c.domain.as_str() };
            format!("'{}' for {} queries", c.name, domain.to_lowercase())
        })
        .collect::<Vec<_>>()
        .join(", ");

    vec![ToolDefinition {
        name: ATHENA_QUERY_TOOL.to_string(),
        description: "Execute a read-only SQL query on an Athena database and return the result \
                      rows as JSON. The database parameter is required: pick the database that \
                      matches the business domain of the question."
            .to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "The SQL query to execute"
                },
                "database": {
                    "type": "string",
                    "description": format!("REQUIRED: Database name. Use {routing}."),
                    "enum": catalogs.names()
                }
            },
            "required": ["sql", "database"]
        }),
    }]
}
