//! SQL parsing and classification logic.
//!
//! Uses sqlparser-rs with the generic dialect (close enough to Athena's
//! Trino SQL for classification) to decide whether a statement is read-only.

use std::ops::ControlFlow;

use sqlparser::ast::{Statement, Visit, Visitor};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::error::{Result, SentraError};

use super::{ClassificationResult, SafetyLevel, StatementType};

/// SQL classifier that parses and classifies SQL queries.
#[derive(Debug, Default)]
pub struct SqlClassifier {
    dialect: GenericDialect,
}

impl SqlClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies a SQL string.
    ///
    /// SQL that cannot be parsed is treated as destructive.
    pub fn classify(&self, sql: &str) -> ClassificationResult {
        match self.parse_and_classify(sql) {
            Ok(result) => result,
            Err(e) => ClassificationResult::with_warning(
                SafetyLevel::Destructive,
                StatementType::Unknown,
                e.to_string(),
            ),
        }
    }

    fn parse_and_classify(&self, sql: &str) -> Result<ClassificationResult> {
        let statements = Parser::parse_sql(&self.dialect, sql)
            .map_err(|e| SentraError::policy(format!("SQL parse error: {}", e)))?;

        match statements.as_slice() {
            [] => Ok(ClassificationResult::with_warning(
                SafetyLevel::Destructive,
                StatementType::Unknown,
                "Empty SQL statement",
            )),
            [single] => {
                let (level, stmt_type) = classify_statement(single);
                Ok(ClassificationResult::new(level, stmt_type))
            }
            many => {
                let (level, stmt_type) = many
                    .iter()
                    .map(classify_statement)
                    .max_by_key(|(level, _)| *level)
                    .unwrap_or((SafetyLevel::Destructive, StatementType::Unknown));
                // The query service runs one statement per execution.
                Ok(ClassificationResult::with_warning(
                    SafetyLevel::Destructive.max(level),
                    StatementType::Multiple(Box::new(stmt_type)),
                    "Only one statement may be executed at a time",
                ))
            }
        }
    }
}

/// Convenience function to classify SQL without creating a classifier instance.
pub fn classify_sql(sql: &str) -> ClassificationResult {
    SqlClassifier::new().classify(sql)
}

/// Returns an error unless `sql` is a single read-only statement.
pub fn ensure_read_only(sql: &str) -> Result<()> {
    let result = classify_sql(sql);
    if result.is_allowed() {
        return Ok(());
    }
    let detail = result
        .warning
        .map(|w| format!(" ({w})"))
        .unwrap_or_default();
    Err(SentraError::policy(format!(
        "Only read-only queries are allowed; found {}{}",
        result.statement_type, detail
    )))
}

/// Classifies a statement by the most dangerous statement anywhere inside it.
///
/// Nested statements (an `INSERT` inside `EXPLAIN ANALYZE`, the `SELECT` of a
/// `CREATE TABLE AS`) are visited too. Ties keep the outermost statement type.
fn classify_statement(statement: &Statement) -> (SafetyLevel, StatementType) {
    let mut worst = WorstStatement::default();
    // The visitor never breaks.
    let _ = statement.visit(&mut worst);
    worst
        .found
        .unwrap_or((SafetyLevel::Destructive, StatementType::Unknown))
}

#[derive(Default)]
struct WorstStatement {
    found: Option<(SafetyLevel, StatementType)>,
}

impl Visitor for WorstStatement {
    type Break = ();

    fn pre_visit_statement(&mut self, statement: &Statement) -> ControlFlow<()> {
        let kind = statement_kind(statement);
        if self.found.as_ref().map_or(true, |(level, _)| kind.0 > *level) {
            self.found = Some(kind);
        }
        ControlFlow::Continue(())
    }
}

fn statement_kind(statement: &Statement) -> (SafetyLevel, StatementType) {
    use SafetyLevel::*;

    match statement {
        Statement::Query(_) => (Safe, StatementType::Select),
        Statement::Explain { .. } => (Safe, StatementType::Explain),
        Statement::ShowTables { .. } | Statement::ShowColumns { .. } => (Safe, StatementType::Show),

        Statement::Insert { .. } => (Mutating, StatementType::Insert),
        Statement::Update { .. } => (Mutating, StatementType::Update),
        Statement::Merge { .. } => (Mutating, StatementType::Merge),

        Statement::Delete { .. } => (Destructive, StatementType::Delete),
        Statement::Drop { .. } => (Destructive, StatementType::Drop),
        Statement::Truncate { .. } => (Destructive, StatementType::Truncate),
        Statement::AlterTable { .. } | Statement::AlterView { .. } => {
            (Destructive, StatementType::Alter)
        }
        Statement::CreateTable { .. }
        | Statement::CreateView { .. }
        | Statement::CreateSchema { .. }
        | Statement::CreateDatabase { .. } => (Destructive, StatementType::Create),
        Statement::Grant { .. } => (Destructive, StatementType::Grant),
        Statement::Revoke { .. } => (Destructive, StatementType::Revoke),

        _ => (Destructive, StatementType::Unknown),
    }
}
