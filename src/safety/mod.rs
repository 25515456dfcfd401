//! Query safety for Sentra.
//!
//! Generated SQL must be read-only, and customer records are filtered to the
//! caller's scope before a statement reaches the query service.

mod parser;
mod policy;

pub use parser::{classify_sql, ensure_read_only, SqlClassifier};
pub use policy::{default_personas, scope_sql, AccessPolicy, Persona, RecordScope};

use std::fmt;

/// How much damage a statement could do. Ordered from harmless to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SafetyLevel {
    /// SELECT, WITH, EXPLAIN, SHOW.
    Safe,
    /// INSERT, UPDATE, MERGE.
    Mutating,
    /// Data loss, schema or permission changes, or anything unrecognized.
    Destructive,
}

impl SafetyLevel {
    /// Only read-only statements are ever sent to the query service.
    pub fn is_allowed(&self) -> bool {
        *self == Self::Safe
    }
}

/// The statement keyword a classification was based on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementType {
    Select,
    Insert,
    Update,
    Delete,
    Merge,
    Drop,
    Truncate,
    Alter,
    Create,
    Grant,
    Revoke,
    Explain,
    Show,
    /// A batch of statements, carrying the most dangerous one.
    Multiple(Box<StatementType>),
    Unknown,
}

impl StatementType {
    fn keyword(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Merge => "MERGE",
            Self::Drop => "DROP",
            Self::Truncate => "TRUNCATE",
            Self::Alter => "ALTER",
            Self::Create => "CREATE",
            Self::Grant => "GRANT",
            Self::Revoke => "REVOKE",
            Self::Explain => "EXPLAIN",
            Self::Show => "SHOW",
            Self::Multiple(_) | Self::Unknown => "unrecognized",
        }
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Multiple(worst) => write!(f, "multi-statement batch with {worst}"),
            other => f.write_str(other.keyword()),
        }
    }
}

/// Verdict for one SQL string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub level: SafetyLevel,
    pub statement_type: StatementType,
    /// Parse failure or batch rejection detail.
    pub warning: Option<String>,
}

impl ClassificationResult {
    pub fn new(level: SafetyLevel, statement_type: StatementType) -> Self {
        Self {
            level,
            statement_type,
            warning: None,
        }
    }

    pub fn with_warning(
        level: SafetyLevel,
        statement_type: StatementType,
        warning: impl Into<String>,
    ) -> Self {
        Self {
            warning: Some(warning.into()),
            ..Self::new(level, statement_type)
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.level.is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_safe_is_allowed() {
        assert!(SafetyLevel::Safe.is_allowed());
        assert!(!SafetyLevel::Mutating.is_allowed());
        assert!(!SafetyLevel::Destructive.is_allowed());
        assert!(SafetyLevel::Safe < SafetyLevel::Mutating);
        assert!(SafetyLevel::Mutating < SafetyLevel::Destructive);
    }

    #[test]
    fn test_statement_type_display() {
        assert_eq!(StatementType::Select.to_string(), "SELECT");
        assert_eq!(StatementType::Unknown.to_string(), "unrecognized");
        assert_eq!(
            StatementType::Multiple(Box::new(StatementType::Delete)).to_string(),
            "multi-statement batch with DELETE"
        );
    }

    #[test]
    fn test_warning_is_kept() {
        let result = ClassificationResult::with_warning(
            SafetyLevel::Destructive,
            StatementType::Unknown,
            "SQL parse error",
        );
        assert!(!result.is_allowed());
        assert_eq!(result.warning.as_deref(), Some("SQL parse error"));
    }
}
