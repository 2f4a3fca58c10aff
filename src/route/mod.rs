//! Routing and rewriting collaborators.
//!
//! The orchestrator drives parse → route → rewrite through the traits in
//! this module. Built-in implementations live in [`builtin`]; proxies with
//! their own sharding algorithms plug in their own.

pub mod builtin;
pub mod parser;

pub use builtin::{BroadcastRouter, TableMappingRewriter, TracingMetricsCollector};
pub use parser::{SqlDialect, SqlParserEngine, SqlStatement, StatementKind};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::ConfigurationProperties;
use crate::error::{Result, StatementError};
use crate::executor::context::{SqlUnit, Value};
use crate::rule::Rule;

/// Schema metadata visible to routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMetaData {
    pub name: String,
    /// Data source names in declaration order.
    pub data_source_names: Vec<String>,
}

impl SchemaMetaData {
    pub fn new(name: impl Into<String>, data_source_names: Vec<String>) -> Self {
        Self {
            name: name.into(),
            data_source_names,
        }
    }

    pub fn contains_data_source(&self, name: &str) -> bool {
        self.data_source_names.iter().any(|ds| ds == name)
    }
}

/// Logic table to actual table substitution for one route unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMapper {
    pub logic_name: String,
    pub actual_name: String,
}

impl TableMapper {
    pub fn new(logic_name: impl Into<String>, actual_name: impl Into<String>) -> Self {
        Self {
            logic_name: logic_name.into(),
            actual_name: actual_name.into(),
        }
    }
}

/// One routing target: a data source plus its table substitutions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteUnit {
    pub data_source_name: String,
    #[serde(default)]
    pub table_mappers: Vec<TableMapper>,
}

impl RouteUnit {
    pub fn new(data_source_name: impl Into<String>) -> Self {
        Self {
            data_source_name: data_source_name.into(),
            table_mappers: Vec::new(),
        }
    }

    pub fn with_table_mapper(mut self, mapper: TableMapper) -> Self {
        self.table_mappers.push(mapper);
        self
    }
}

/// The routing decision for one statement.
#[derive(Debug, Clone)]
pub struct RouteContext {
    statement: Arc<SqlStatement>,
    route_units: Vec<RouteUnit>,
}

impl RouteContext {
    pub fn new(statement: Arc<SqlStatement>, route_units: Vec<RouteUnit>) -> Self {
        Self {
            statement,
            route_units,
        }
    }

    /// The parsed statement that was routed.
    pub fn statement(&self) -> &Arc<SqlStatement> {
        &self.statement
    }

    /// Routing targets, in routing order.
    pub fn route_units(&self) -> &[RouteUnit] {
        &self.route_units
    }

    /// Distinct target data sources, in first-seen order.
    pub fn actual_data_source_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for unit in &self.route_units {
            if !names.contains(&unit.data_source_name.as_str()) {
                names.push(&unit.data_source_name);
            }
        }
        names
    }
}

/// Per-route-unit physical SQL produced by rewriting.
#[derive(Debug, Clone, Default)]
pub struct RewriteResult {
    sql_units: Vec<(RouteUnit, SqlUnit)>,
}

impl RewriteResult {
    pub fn new(sql_units: Vec<(RouteUnit, SqlUnit)>) -> Self {
        Self { sql_units }
    }

    pub fn sql_units(&self) -> &[(RouteUnit, SqlUnit)] {
        &self.sql_units
    }

    pub fn into_sql_units(self) -> Vec<(RouteUnit, SqlUnit)> {
        self.sql_units
    }
}

/// Decides which data nodes a statement touches.
pub trait Router: Send + Sync {
    fn route(
        &self,
        metadata: &SchemaMetaData,
        props: &ConfigurationProperties,
        rules: &[Arc<Rule>],
        statement: Arc<SqlStatement>,
        sql: &str,
        parameters: &[Value],
    ) -> std::result::Result<RouteContext, StatementError>;
}

/// Turns a logic statement into per-data-source physical SQL.
pub trait SqlRewriter: Send + Sync {
    fn rewrite(
        &self,
        sql: &str,
        parameters: &[Value],
        route_context: &RouteContext,
    ) -> std::result::Result<RewriteResult, StatementError>;
}

/// Best-effort instrumentation of routing decisions.
pub trait RouteMetricsCollector: Send + Sync {
    fn collect(&self, route_context: &RouteContext, rules: &[Arc<Rule>]) -> Result<()>;
}
