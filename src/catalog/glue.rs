//! Glue schema catalog.

use async_trait::async_trait;
use aws_sdk_glue::error::DisplayErrorContext;
use aws_sdk_glue::types::Table;
use aws_sdk_glue::Client;
use tracing::info;

use super::{SchemaCatalog, TableSchema};
use crate::error::{Result, SentraError};

/// Schema catalog backed by the AWS Glue data catalog.
pub struct GlueSchemaCatalog {
    client: Client,
}

impl GlueSchemaCatalog {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SchemaCatalog for GlueSchemaCatalog {
    async fn table_schema(&self, database: &str, table: &str) -> Result<TableSchema> {
        // Glue stores table names in lower case.
        let response = self
            .client
            .get_table()
            .database_name(database)
            .name(table.to_lowercase())
            .send()
            .await
            .map_err(|e| {
                SentraError::catalog(format!(
                    "Glue schema fetch failed for {database}.{table}: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        let schema = response
            .table()
            .map(|t| schema_from_table(database, table, t))
            .unwrap_or_else(|| TableSchema::new(database, table));

        if schema.columns.is_empty() {
            return Err(SentraError::catalog(format!(
                "No columns found in {database}.{table}"
            )));
        }

        info!(catalog = database, table, columns = schema.column_count(), "Fetched table schema");
        Ok(schema)
    }
}

fn schema_from_table(database: &str, name: &str, table: &Table) -> TableSchema {
    let columns = table
        .storage_descriptor()
        .map(|sd| sd.columns())
        .unwrap_or_default();

    columns.iter().fold(TableSchema::new(database, name), |schema, column| {
        schema.with_column(column.name(), column.r#type().unwrap_or("string"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_glue::types::{Column, StorageDescriptor};

    #[test]
    fn test_schema_from_table() {
        let descriptor = StorageDescriptor::builder()
            .columns(Column::builder().name("policy_number").r#type("string").build().unwrap())
            .columns(Column::builder().name("gwp").r#type("decimal(18,2)").build().unwrap())
            .build();
        let table = Table::builder()
            .name("insurance_data")
            .storage_descriptor(descriptor)
            .build()
            .unwrap();

        let schema = schema_from_table("insurance_db", "INSURANCE_DATA", &table);

        assert_eq!(schema.name, "INSURANCE_DATA");
        assert_eq!(schema.column_count(), 2);
        assert_eq!(schema.columns[1].data_type, "decimal(18,2)");
    }

    #[test]
    fn test_schema_from_table_without_descriptor() {
        let table = Table::builder().name("empty").build().unwrap();
        let schema = schema_from_table("db", "empty", &table);
        assert_eq!(schema.column_count(), 0);
    }
}
