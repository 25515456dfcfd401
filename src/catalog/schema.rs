//! Table schema types.
//!
//! Column listings fetched from the catalog, with renderings for memory
//! events and the system prompt.

use serde::{Deserialize, Serialize};

/// A column of a catalog table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    /// Type as the catalog reports it (`string`, `bigint`, `decimal(18,2)`...).
    pub data_type: String,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Columns of one table in one catalog database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub database: String,
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(database: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        self.columns.push(ColumnSchema::new(name, data_type));
        self
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Formats the schema as the text stored in a memory event.
    pub fn format_for_memory(&self) -> String {
        let mut text = format!(
            "{} Table Columns\n{}\n",
            self.name.to_uppercase(),
            "=".repeat(80)
        );
        for column in &self.columns {
            text.push_str(&format!(
                "- {} ({})\n",
                column.name,
                column.data_type.to_uppercase()
            ));
        }
        text.push_str(&format!("\nTotal: {} columns", self.columns.len()));
        text
    }

    /// Formats the schema for inclusion in an LLM system prompt.
    pub fn format_for_llm(&self) -> String {
        let column_lines = self
            .columns
            .iter()
            .map(|c| format!("  - {}: {}\n", c.name, c.data_type))
            .collect::<Vec<_>>()
            .join("");

        format!("Table: {}\n{}", self.name, column_lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn insurance() -> TableSchema {
        TableSchema::new("insurance_db", "insurance_data")
            .with_column("policy_no", "string")
            .with_column("premium_amount", "double")
    }

    #[test]
    fn test_format_for_memory() {
        let text = insurance().format_for_memory();

        let expected = format!(
            "INSURANCE_DATA Table Columns\n{}\n- policy_no (STRING)\n- premium_amount (DOUBLE)\n\nTotal: 2 columns",
            "=".repeat(80)
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_format_for_llm() {
        assert_eq!(
            insurance().format_for_llm(),
            "Table: insurance_data\n  - policy_no: string\n  - premium_amount: double\n"
        );
    }

    #[test]
    fn test_column_count() {
        assert_eq!(insurance().column_count(), 2);
        assert_eq!(TableSchema::new("db", "t").column_count(), 0);
    }
}
