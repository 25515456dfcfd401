//! Persona access policy.
//!
//! Maps a user to the range of customer records they may see and rewrites
//! SQL so that every scoped table is read through a filtered derived table.

use std::fmt;
use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};
use sqlparser::ast::{Ident, SetExpr, Statement, TableFactor, VisitMut, VisitorMut};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use tracing::debug;

use crate::catalog::{Catalog, CatalogRegistry};
use crate::error::{Result, SentraError};

/// Records a user may read from scoped tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ScopeRepr", into = "ScopeRepr")]
pub enum RecordScope {
    /// Every record.
    All,
    /// Records whose scope column lies in the inclusive range.
    Range { from: String, to: String },
    /// No records.
    #[default]
    None,
}

impl RecordScope {
    pub fn range(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::Range {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Describes the scope for the system prompt.
    pub fn describe(&self, column: &str) -> String {
        match self {
            Self::All => "Full access to all customer records.".to_string(),
            Self::Range { from, to } => format!(
                "Restricted to customer records with {column} between {from} and {to} (inclusive). \
                 Records outside this range are filtered out before the query runs."
            ),
            Self::None => "No access to customer records. Tables under access control cannot \
                           be queried in any database."
                .to_string(),
        }
    }
}

impl fmt::Display for RecordScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Range { from, to } => write!(f, "{from}..={to}"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Config form of a scope: `"all"`, `"none"` or `{ from, to }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ScopeRepr {
    Named(String),
    Range { from: String, to: String },
}

impl TryFrom<ScopeRepr> for RecordScope {
    type Error = String;

    fn try_from(repr: ScopeRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            ScopeRepr::Named(name) => match name.to_ascii_lowercase().as_str() {
                "all" => Ok(Self::All),
                "none" => Ok(Self::None),
                other => Err(format!(
                    "unknown scope '{other}', expected \"all\", \"none\" or {{ from, to }}"
                )),
            },
            ScopeRepr::Range { from, to } => {
                if from.is_empty() || to.is_empty() {
                    return Err("scope range bounds must not be empty".to_string());
                }
                if from > to {
                    return Err(format!("scope range is empty: '{from}' is after '{to}'"));
                }
                Ok(Self::Range { from, to })
            }
        }
    }
}

impl From<RecordScope> for ScopeRepr {
    fn from(scope: RecordScope) -> Self {
        match scope {
            RecordScope::All => Self::Named("all".to_string()),
            RecordScope::None => Self::Named("none".to_string()),
            RecordScope::Range { from, to } => Self::Range { from, to },
        }
    }
}

/// A user and the records they may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub user_id: String,
    pub scope: RecordScope,
}

impl Persona {
    pub fn new(user_id: impl Into<String>, scope: RecordScope) -> Self {
        Self {
            user_id: user_id.into(),
            scope,
        }
    }
}

/// Table of personas plus the scope for everyone else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    #[serde(default = "default_personas")]
    pub personas: Vec<Persona>,

    #[serde(default)]
    pub default_scope: RecordScope,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            personas: default_personas(),
            default_scope: RecordScope::None,
        }
    }
}

impl AccessPolicy {
    pub fn new(personas: Vec<Persona>, default_scope: RecordScope) -> Self {
        Self {
            personas,
            default_scope,
        }
    }

    /// Returns the scope of `user_id`. User ids compare case-insensitively.
    pub fn scope_for(&self, user_id: &str) -> RecordScope {
        self.personas
            .iter()
            .find(|p| p.user_id.eq_ignore_ascii_case(user_id.trim()))
            .map(|p| p.scope.clone())
            .unwrap_or_else(|| self.default_scope.clone())
    }

    /// Prompt section describing what `user_id` may see.
    pub fn describe(&self, user_id: &str, column: &str) -> String {
        format!(
            "Access scope for user {}: {}",
            user_id,
            self.scope_for(user_id).describe(column)
        )
    }
}

/// Personas used when the config has none.
pub fn default_personas() -> Vec<Persona> {
    vec![
        Persona::new("kamaljeet.singh", RecordScope::All),
        Persona::new("vishal.saxena", RecordScope::range("CIF200000", "CIF200025")),
        Persona::new("harsh.kumar", RecordScope::range("CIF200026", "CIF200099")),
    ]
}

/// Rewrites `sql` so every scoped table it reads only exposes records in `scope`.
///
/// Table names are resolved the way the query service resolves them: an
/// unqualified name belongs to `context`, the catalog the statement runs in,
/// and a `db.table` (or `catalog.db.table`) name belongs to `db`. A qualifier
/// naming a database outside `catalogs` is denied. Each reference to a
/// scoped table becomes
/// `(SELECT * FROM t WHERE col BETWEEN 'from' AND 'to') AS alias`, keeping the
/// original alias (or the table name) so column qualifiers still resolve.
/// SQL that reads no scoped table is returned unchanged.
pub fn scope_sql(
    sql: &str,
    catalogs: &CatalogRegistry,
    context: &Catalog,
    scope: &RecordScope,
) -> Result<String> {
    if *scope == RecordScope::All {
        return Ok(sql.to_string());
    }

    let dialect = GenericDialect {};
    let mut statements = Parser::parse_sql(&dialect, sql)
        .map_err(|e| SentraError::policy(format!("SQL parse error: {}", e)))?;

    let mut scoper = TableScoper {
        catalogs,
        context,
        scope,
        rewritten: 0,
    };
    if let ControlFlow::Break(e) = statements.visit(&mut scoper) {
        return Err(e);
    }
    if scoper.rewritten == 0 {
        return Ok(sql.to_string());
    }

    debug!(
        catalog = %context.name,
        scope = %scope,
        tables = scoper.rewritten,
        "Applied record scope"
    );

    Ok(statements
        .iter()
        .map(Statement::to_string)
        .collect::<Vec<_>>()
        .join("; "))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

struct TableScoper<'a> {
    catalogs: &'a CatalogRegistry,
    context: &'a Catalog,
    scope: &'a RecordScope,
    rewritten: usize,
}

impl<'a> TableScoper<'a> {
    /// The catalog owning a table reference with the given name parts.
    fn owner(&self, parts: &[Ident]) -> Result<&'a Catalog> {
        let database = match parts {
            [.., database, _table] => database,
            _ => return Ok(self.context),
        };
        self.catalogs.find(&database.value).ok_or_else(|| {
            SentraError::policy(format!(
                "Database '{}' is not queryable. Expected one of: {}",
                database.value,
                self.catalogs.names().join(", ")
            ))
        })
    }

    fn filtered(&self, catalog: &Catalog, table: &str, alias: &str) -> Result<TableFactor> {
        let RecordScope::Range { from, to } = self.scope else {
            return Err(SentraError::policy(format!(
                "No access to customer records in {}",
                catalog.name
            )));
        };
        let sql = format!(
            "SELECT * FROM (SELECT * FROM {table} WHERE {column} BETWEEN {from} AND {to}) AS {alias}",
            column = catalog.scope_column,
            from = quote_literal(from),
            to = quote_literal(to),
        );
        let dialect = GenericDialect {};
        let mut statements = Parser::parse_sql(&dialect, &sql)
            .map_err(|e| SentraError::policy(format!("Failed to scope {table}: {e}")))?;

        match statements.pop() {
            Some(Statement::Query(query)) => match *query.body {
                SetExpr::Select(mut select) if !select.from.is_empty() => {
                    Ok(select.from.swap_remove(0).relation)
                }
                _ => Err(SentraError::internal("Scoped table did not parse as a select")),
            },
            _ => Err(SentraError::internal("Scoped table did not parse as a query")),
        }
    }
}

impl VisitorMut for TableScoper<'_> {
    type Break = SentraError;

    // Post-order so the derived table replacing a scoped table is not visited again.
    fn post_visit_table_factor(&mut self, factor: &mut TableFactor) -> ControlFlow<Self::Break> {
        let TableFactor::Table {
            name, alias, args, ..
        } = factor
        else {
            return ControlFlow::Continue(());
        };
        if args.is_some() {
            return ControlFlow::Continue(());
        }
        let Some(last) = name.0.last() else {
            return ControlFlow::Continue(());
        };
        let catalog = match self.owner(&name.0) {
            Ok(catalog) => catalog,
            Err(e) => return ControlFlow::Break(e),
        };
        if !catalog.is_scoped_table(&last.value) {
            return ControlFlow::Continue(());
        }

        let alias = alias
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| last.to_string());

        match self.filtered(catalog, &name.to_string(), &alias) {
            Ok(replacement) => {
                *factor = replacement;
                self.rewritten += 1;
                ControlFlow::Continue(())
            }
            Err(e) => ControlFlow::Break(e),
        }
    }
}
