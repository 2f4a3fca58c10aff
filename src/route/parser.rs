//! SQL parsing for routing.
//!
//! Uses sqlparser-rs with the configured dialect to turn the logic SQL into
//! a statement tree and to classify the statement kind.

use serde::{Deserialize, Serialize};
use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, GenericDialect, MySqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;
use std::fmt;

use crate::error::StatementError;

/// SQL dialects understood by the parser engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlDialect {
    /// PostgreSQL. `?` is the JSONB key operator here, so only `$n`
    /// placeholders bind parameters.
    Postgres,
    MySql,
    /// Accepts both `?` and `$n` placeholders.
    #[default]
    Generic,
}

impl SqlDialect {
    /// Parses a dialect name from configuration.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "mysql" => Some(Self::MySql),
            "generic" => Some(Self::Generic),
            _ => None,
        }
    }
}

/// Coarse statement kind of a parsed statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    /// Schema changes (CREATE, ALTER, DROP, TRUNCATE).
    Ddl,
    /// Administrative statements (SHOW, EXPLAIN, SET).
    Dal,
    Other,
}

impl StatementKind {
    /// Returns true for statements that return rows.
    pub fn is_query(&self) -> bool {
        matches!(self, Self::Select | Self::Dal)
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
            Self::Ddl => write!(f, "DDL"),
            Self::Dal => write!(f, "DAL"),
            Self::Other => write!(f, "OTHER"),
        }
    }
}

/// A parsed logic statement.
#[derive(Debug, Clone)]
pub struct SqlStatement {
    statement: Statement,
    kind: StatementKind,
}

impl SqlStatement {
    /// Returns the statement tree.
    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    /// Returns the statement kind.
    pub fn kind(&self) -> StatementKind {
        self.kind
    }
}

/// Parses logic SQL for a schema.
#[derive(Debug, Clone, Default)]
pub struct SqlParserEngine {
    dialect: SqlDialect,
}

impl SqlParserEngine {
    /// Creates a parser engine for the given dialect.
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Parses exactly one SQL statement.
    pub fn parse(&self, sql: &str) -> Result<SqlStatement, StatementError> {
        let dialect: &dyn Dialect = match self.dialect {
            SqlDialect::Postgres => &PostgreSqlDialect {},
            SqlDialect::MySql => &MySqlDialect {},
            SqlDialect::Generic => &GenericDialect {},
        };
        let mut statements =
            Parser::parse_sql(dialect, sql).map_err(|e| StatementError::parse(e.to_string()))?;

        match statements.len() {
            0 => Err(StatementError::parse("Empty SQL statement")),
            1 => {
                let statement = statements.remove(0);
                let kind = classify_statement(&statement);
                Ok(SqlStatement { statement, kind })
            }
            n => Err(StatementError::parse(format!(
                "Expected a single statement, found {n}"
            ))),
        }
    }
}

/// Classifies a single parsed statement.
fn classify_statement(statement: &Statement) -> StatementKind {
    match statement {
        Statement::Query(_) => StatementKind::Select,
        Statement::Insert(_) => StatementKind::Insert,
        Statement::Update { .. } => StatementKind::Update,
        Statement::Delete(_) => StatementKind::Delete,

        Statement::Explain { .. }
        | Statement::ShowVariable { .. }
        | Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowCreate { .. }
        | Statement::ShowFunctions { .. }
        | Statement::ShowStatus { .. }
        | Statement::ShowCollation { .. }
        | Statement::SetVariable { .. } => StatementKind::Dal,

        Statement::Drop { .. }
        | Statement::Truncate { .. }
        | Statement::AlterTable { .. }
        | Statement::AlterIndex { .. }
        | Statement::AlterView { .. }
        | Statement::CreateTable { .. }
        | Statement::CreateIndex { .. }
        | Statement::CreateView { .. }
        | Statement::CreateSchema { .. }
        | Statement::CreateDatabase { .. }
        | Statement::CreateSequence { .. } => StatementKind::Ddl,

        _ => StatementKind::Other,
    }
}
