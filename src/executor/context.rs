//! Execution units and the execution context handed to grouping.
//!
//! An [`ExecutionUnit`] pairs a physical data source with the SQL that
//! must run there. Units are produced by routing and rewriting and are
//! immutable once built.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::route::parser::SqlStatement;
use crate::route::RewriteResult;

/// A bound parameter value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Text/string value.
    String(String),

    /// Binary data.
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Converts the value to a string suitable for logs.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => format!("'{s}'"),
            Value::Bytes(b) => format!("<{} bytes>", b.len()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

/// Physical SQL plus its ordered bound parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlUnit {
    sql: String,
    parameters: Vec<Value>,
}

impl SqlUnit {
    /// Creates a SQL unit.
    pub fn new(sql: impl Into<String>, parameters: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            parameters,
        }
    }

    /// Returns the physical SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns the bound parameters, in order.
    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }
}

impl fmt::Display for SqlUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parameters.is_empty() {
            return f.write_str(&self.sql);
        }
        let params: Vec<String> = self.parameters.iter().map(Value::to_display_string).collect();
        write!(f, "{} ::: [{}]", self.sql, params.join(", "))
    }
}

/// A SQL unit addressed at one data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionUnit {
    data_source_name: String,
    sql_unit: SqlUnit,
}

impl ExecutionUnit {
    /// Creates an execution unit.
    pub fn new(data_source_name: impl Into<String>, sql_unit: SqlUnit) -> Self {
        Self {
            data_source_name: data_source_name.into(),
            sql_unit,
        }
    }

    /// Returns the target data source name.
    pub fn data_source_name(&self) -> &str {
        &self.data_source_name
    }

    /// Returns the SQL unit.
    pub fn sql_unit(&self) -> &SqlUnit {
        &self.sql_unit
    }

    /// Splits the unit into its parts.
    pub fn into_parts(self) -> (String, SqlUnit) {
        (self.data_source_name, self.sql_unit)
    }
}

impl fmt::Display for ExecutionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ::: {}", self.data_source_name, self.sql_unit)
    }
}

/// The routed and rewritten form of one logic statement.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    statement: Arc<SqlStatement>,
    execution_units: Vec<ExecutionUnit>,
}

impl ExecutionContext {
    /// Creates an execution context.
    pub fn new(statement: Arc<SqlStatement>, execution_units: Vec<ExecutionUnit>) -> Self {
        Self {
            statement,
            execution_units,
        }
    }

    /// Returns the parsed logic statement.
    pub fn statement(&self) -> &SqlStatement {
        &self.statement
    }

    /// Returns the execution units, in routing order.
    pub fn execution_units(&self) -> &[ExecutionUnit] {
        &self.execution_units
    }

    /// Consumes the context, returning its execution units.
    pub fn into_execution_units(self) -> Vec<ExecutionUnit> {
        self.execution_units
    }
}

/// Builds execution units from a rewrite result.
pub struct ExecutionContextBuilder;

impl ExecutionContextBuilder {
    /// One execution unit per rewritten SQL unit, in rewrite order.
    pub fn build(rewrite_result: RewriteResult) -> Vec<ExecutionUnit> {
        rewrite_result
            .into_sql_units()
            .into_iter()
            .map(|(route_unit, sql_unit)| ExecutionUnit::new(route_unit.data_source_name, sql_unit))
            .collect()
    }
}
