//! Static schema catalog for testing and `--mock` runs.

use async_trait::async_trait;

use super::{SchemaCatalog, TableSchema, BANKING_CATALOG, INSURANCE_CATALOG};
use crate::error::{Result, SentraError};

/// Schema catalog that serves a fixed set of tables.
#[derive(Debug, Clone, Default)]
pub struct MockSchemaCatalog {
    tables: Vec<TableSchema>,
}

impl MockSchemaCatalog {
    pub fn new(tables: Vec<TableSchema>) -> Self {
        Self { tables }
    }

    /// A trimmed copy of the banking and insurance schemas.
    pub fn sample() -> Self {
        let banking = |name: &str, extra: &[(&str, &str)]| {
            let schema = TableSchema::new(BANKING_CATALOG, name)
                .with_column("CIF_NO", "string")
                .with_column("EFFECTIVE_DATE", "timestamp");
            extra
                .iter()
                .fold(schema, |s, (col, ty)| s.with_column(*col, *ty))
        };

        let tables = vec![
            banking(
                "DM_CUSTOMER_MASTER",
                &[
                    ("CUSTOMER_NAME", "string"),
                    ("CUSTOMER_SEGMENT", "string"),
                    ("DATE_OF_BIRTH", "timestamp"),
                    ("GENDER", "string"),
                    ("CUSTOMER_STATUS", "string"),
                    ("PRIMARY_BRANCH_NAME", "string"),
                    ("MOBILE_PHONE", "bigint"),
                    ("EMAIL_ADDRESS", "string"),
                ],
            ),
            banking(
                "DM_CASA_ACCOUNTS",
                &[
                    ("ACCOUNT_NUMBER", "bigint"),
                    ("ACCOUNT_TYPE", "string"),
                    ("ACCOUNT_STATUS", "string"),
                    ("CURRENT_BALANCE", "bigint"),
                ],
            ),
            banking(
                "DM_SAVINGS_ACCOUNTS",
                &[
                    ("ACCOUNT_NUMBER", "bigint"),
                    ("PRODUCT_NAME", "string"),
                    ("ACCOUNT_STATUS", "string"),
                ],
            ),
            banking(
                "DM_LOAN_ACCOUNTS",
                &[
                    ("LOAN_ACCOUNT_NUMBER", "bigint"),
                    ("PRODUCT_NAME", "string"),
                    ("OUTSTANDING_BALANCE", "decimal(18,2)"),
                ],
            ),
            banking(
                "DM_CREDIT_CARDS",
                &[("CARD_TYPE", "string"), ("CARD_STATUS", "string")],
            ),
            banking(
                "DM_CUSTOMER_METRICS",
                &[("TOTAL_PRODUCTS_COUNT", "int"), ("HAS_CASA", "string")],
            ),
            banking(
                "DM_CUSTOMER_ACTIVITY",
                &[
                    ("LAST_BRANCH_VISIT_DATE", "timestamp"),
                    ("LAST_MOBILE_LOGIN_DATE", "timestamp"),
                ],
            ),
            banking(
                "DM_CUSTOMER_IDENTIFICATION",
                &[("ID_TYPE", "string"), ("ID_NUMBER", "string")],
            ),
            TableSchema::new(INSURANCE_CATALOG, "INSURANCE_DATA")
                .with_column("policy_number", "string")
                .with_column("agent_name", "string")
                .with_column("policy_type", "string")
                .with_column("main_product", "string")
                .with_column("zone", "string")
                .with_column("gwp", "decimal(18,2)")
                .with_column("sum_insured", "int")
                .with_column("risk_start_date", "timestamp"),
        ];

        Self { tables }
    }
}

#[async_trait]
impl SchemaCatalog for MockSchemaCatalog {
    async fn table_schema(&self, database: &str, table: &str) -> Result<TableSchema> {
        self.tables
            .iter()
            .find(|t| t.database == database && t.name.eq_ignore_ascii_case(table))
            .filter(|t| !t.columns.is_empty())
            .cloned()
            .ok_or_else(|| {
                SentraError::catalog(format!("No columns found in {database}.{table}"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sample_has_every_banking_table() {
        let catalog = MockSchemaCatalog::sample();
        for table in crate::catalog::BANKING_TABLES {
            let schema = catalog.table_schema(BANKING_CATALOG, table).await.unwrap();
            assert_eq!(schema.columns[0].name, "CIF_NO");
        }
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let catalog = MockSchemaCatalog::sample();
        assert!(catalog
            .table_schema(INSURANCE_CATALOG, "insurance_data")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_empty_table_is_error() {
        let catalog = MockSchemaCatalog::new(vec![TableSchema::new("db", "empty")]);
        let err = catalog.table_schema("db", "empty").await.unwrap_err();
        assert_eq!(err.to_string(), "Catalog error: No columns found in db.empty");
    }
}
