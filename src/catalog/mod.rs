//! Schema catalog for Sentra.
//!
//! Describes the queryable catalogs (databases), fetches table schemas from
//! the data catalog, and keeps the schema memory event in sync.

mod glue;
mod mock;
mod schema;
mod sync;

pub use glue::GlueSchemaCatalog;
pub use mock::MockSchemaCatalog;
pub use schema::{ColumnSchema, TableSchema};
pub use sync::{SchemaSync, SyncReport, SCHEMA_ACTOR_ID};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SentraError};

/// Banking catalog name.
pub const BANKING_CATALOG: &str = "sentra_db";

/// Insurance catalog name.
pub const INSURANCE_CATALOG: &str = "insurance_db";

/// Default column used to scope customer records.
pub const DEFAULT_SCOPE_COLUMN: &str = "CIF_NO";

fn default_scope_column() -> String {
    DEFAULT_SCOPE_COLUMN.to_string()
}

/// A queryable catalog database and how it is described to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Database name passed to the query service.
    pub name: String,

    /// Business domain label (e.g. "Banking").
    #[serde(default)]
    pub domain: String,

    /// Keywords and guidance for picking this catalog.
    #[serde(default)]
    pub description: String,

    /// Tables whose schema is included in the prompt.
    #[serde(default)]
    pub tables: Vec<String>,

    /// Tables holding customer records; these are filtered by the access policy.
    #[serde(default)]
    pub scoped_tables: Vec<String>,

    /// Column the access policy filters on.
    #[serde(default = "default_scope_column")]
    pub scope_column: String,

    /// Query rules appended to the schema listing.
    #[serde(default)]
    pub rules: Vec<String>,

    /// Schemas fetched at startup.
    #[serde(skip)]
    pub schemas: Vec<TableSchema>,
}

impl Catalog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: String::new(),
            description: String::new(),
            tables: Vec::new(),
            scoped_tables: Vec::new(),
            scope_column: default_scope_column(),
            rules: Vec::new(),
            schemas: Vec::new(),
        }
    }

    /// Returns true if records in `table` are subject to the access policy.
    pub fn is_scoped_table(&self, table: &str) -> bool {
        self.scoped_tables
            .iter()
            .any(|t| t.eq_ignore_ascii_case(table))
    }

    /// Returns true if any table in this catalog is access controlled.
    pub fn has_access_control(&self) -> bool {
        !self.scoped_tables.is_empty()
    }

    /// Formats the catalog for inclusion in an LLM system prompt.
    pub fn format_for_llm(&self) -> String {
        let mut text = format!("Database: {}", self.name);
        if !self.domain.is_empty() {
            text.push_str(&format!(" ({})", self.domain));
        }
        text.push('\n');
        if !self.description.is_empty() {
            text.push_str(&self.description);
            text.push('\n');
        }
        text.push_str(&format!(
            "Access control: {}\n\n",
            if self.has_access_control() {
                "YES (persona-based record filtering applies)"
            } else {
                "NO (no restrictions)"
            }
        ));

        if self.schemas.is_empty() {
            for table in &self.tables {
                text.push_str(&format!("Table: {table}\n"));
            }
        } else {
            for schema in &self.schemas {
                text.push_str(&schema.format_for_llm());
                text.push('\n');
            }
        }

        if !self.rules.is_empty() {
            text.push_str("Rules:\n");
            for rule in &self.rules {
                text.push_str(&format!("- {rule}\n"));
            }
        }
        text
    }
}

/// Trait defining the interface for schema catalogs.
#[async_trait]
pub trait SchemaCatalog: Send + Sync {
    /// Fetches the columns of one table. A table without columns is an error.
    async fn table_schema(&self, database: &str, table: &str) -> Result<TableSchema>;
}

/// The set of catalogs the agent may query.
#[derive(Debug, Clone, Default)]
pub struct CatalogRegistry {
    catalogs: Vec<Catalog>,
}

impl CatalogRegistry {
    pub fn new(catalogs: Vec<Catalog>) -> Self {
        Self { catalogs }
    }

    /// Returns the catalog with the given name, if registered.
    pub fn get(&self, name: &str) -> Option<&Catalog> {
        self.catalogs.iter().find(|c| c.name == name)
    }

    /// Looks up a catalog the way the query service resolves a database
    /// qualifier, ignoring ASCII case.
    pub fn find(&self, name: &str) -> Option<&Catalog> {
        self.catalogs
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Returns the catalog with the given name or a catalog error.
    pub fn require(&self, name: &str) -> Result<&Catalog> {
        self.get(name).ok_or_else(|| {
            SentraError::catalog(format!(
                "Unknown database '{}'. Expected one of: {}",
                name,
                self.names().join(", ")
            ))
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.catalogs.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Catalog> {
        self.catalogs.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.catalogs.is_empty()
    }

    /// Fetches the schema of every listed table.
    ///
    /// Tables that cannot be fetched are logged and left out of the prompt.
    pub async fn load_schemas(&mut self, source: &dyn SchemaCatalog) {
        for catalog in &mut self.catalogs {
            let mut schemas = Vec::with_capacity(catalog.tables.len());
            for table in &catalog.tables {
                match source.table_schema(&catalog.name, table).await {
                    Ok(schema) => schemas.push(schema),
                    Err(e) => warn!(
                        catalog = %catalog.name,
                        table = %table,
                        error = %e,
                        "Could not load table schema"
                    ),
                }
            }
            catalog.schemas = schemas;
        }
    }

    /// Formats every catalog for the system prompt.
    pub fn format_for_llm(&self) -> String {
        self.catalogs
            .iter()
            .map(Catalog::format_for_llm)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Banking tables, all keyed by customer number.
pub const BANKING_TABLES: [&str; 8] = [
    "DM_CUSTOMER_MASTER",
    "DM_CASA_ACCOUNTS",
    "DM_SAVINGS_ACCOUNTS",
    "DM_LOAN_ACCOUNTS",
    "DM_CREDIT_CARDS",
    "DM_CUSTOMER_METRICS",
    "DM_CUSTOMER_ACTIVITY",
    "DM_CUSTOMER_IDENTIFICATION",
];

/// The banking and insurance catalogs used when none are configured.
pub fn default_catalogs() -> Vec<Catalog> {
    let tables: Vec<String> = BANKING_TABLES.iter().map(|t| t.to_string()).collect();

    let banking = Catalog {
        domain: "Banking".to_string(),
        description: "Use for banking queries: customers, CIF, accounts, loans, credit cards, savings."
            .to_string(),
        tables: tables.clone(),
        scoped_tables: tables,
        rules: vec![
            "Join tables only on CIF_NO".to_string(),
            "Always use the row with the latest EFFECTIVE_DATE".to_string(),
            "Never invent fields or tables".to_string(),
            "Amounts are in INR".to_string(),
        ],
        ..Catalog::new(BANKING_CATALOG)
    };

    let insurance = Catalog {
        domain: "Insurance".to_string(),
        description: "Use for insurance queries: policies, premiums, coverage, agents, zones."
            .to_string(),
        tables: vec!["INSURANCE_DATA".to_string()],
        rules: vec![
            "There is no CIF_NO field in insurance tables".to_string(),
            "Cannot join with banking tables".to_string(),
            "Amounts (gwp, sum_insured, premiums) are in INR".to_string(),
        ],
        ..Catalog::new(INSURANCE_CATALOG)
    };

    vec![banking, insurance]
}
