//! Execution of decorated input groups.
//!
//! Groups run concurrently; the units of one group share a connection and
//! run one after another. Results come back in input order so result
//! merging can rely on positional correspondence.

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{FanoutError, Result};
use crate::executor::context::Value;
use crate::executor::group::{ExecutableInput, InputGroup, StatementExecuteUnit};

/// Outcome of executing one statement unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResult {
    /// Data source the unit ran on.
    pub data_source_name: String,

    /// Physical SQL that was executed.
    pub sql: String,

    /// Returned rows (empty for updates).
    pub rows: Vec<Vec<Value>>,

    /// Rows affected by an update.
    pub affected_rows: u64,

    /// Keys generated by an insert, when the statement option asks for them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generated_keys: Vec<Value>,
}

/// Executes statement units against physical data sources.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    async fn execute(&self, unit: &StatementExecuteUnit) -> Result<ExecuteResult>;
}

/// Executes every group and returns results in input order.
///
/// The first failing unit aborts the whole statement.
pub async fn execute_groups<E>(
    executor: &E,
    input_groups: Vec<InputGroup<StatementExecuteUnit>>,
) -> Result<Vec<ExecuteResult>>
where
    E: StatementExecutor + ?Sized,
{
    let start = Instant::now();
    let group_count = input_groups.len();
    let per_group = try_join_all(input_groups.into_iter().map(|group| async move {
        let mut results = Vec::with_capacity(group.len());
        for unit in group.inputs() {
            results.push(executor.execute(unit).await?);
        }
        Ok::<_, FanoutError>(results)
    }))
    .await?;

    let results: Vec<ExecuteResult> = per_group.into_iter().flatten().collect();
    debug!(
        groups = group_count,
        units = results.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Executed input groups"
    );
    Ok(results)
}

/// An executor that echoes the SQL back instead of touching a database.
///
/// Inserts draw keys from one sequence shared by all clones.
#[derive(Debug, Clone, Default)]
pub struct MockStatementExecutor {
    latency: Duration,
    next_key: Arc<AtomicI64>,
}

impl MockStatementExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a per-unit execution latency.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }
}

#[async_trait]
impl StatementExecutor for MockStatementExecutor {
    async fn execute(&self, unit: &StatementExecuteUnit) -> Result<ExecuteResult> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let sql = unit.execution_unit().sql_unit().sql();
        let data_source_name = unit.data_source_name().to_string();
        let upper = sql.trim_start().to_uppercase();
        let is_query = ["SELECT", "SHOW", "EXPLAIN", "WITH"]
            .iter()
            .any(|prefix| upper.starts_with(prefix));

        if is_query {
            Ok(ExecuteResult {
                rows: vec![vec![
                    Value::String(data_source_name.clone()),
                    Value::String(format!("Mock result for: {sql}")),
                ]],
                data_source_name,
                sql: sql.to_string(),
                affected_rows: 0,
                generated_keys: vec![],
            })
        } else {
            let returns_keys = unit.option().return_generated_keys && upper.starts_with("INSERT");
            let generated_keys = if returns_keys {
                vec![Value::Int(self.next_key.fetch_add(1, Ordering::Relaxed) + 1)]
            } else {
                vec![]
            };
            Ok(ExecuteResult {
                data_source_name,
                sql: sql.to_string(),
                rows: vec![],
                affected_rows: 1,
                generated_keys,
            })
        }
    }
}

/// An executor whose every call fails.
#[derive(Debug, Clone)]
pub struct FailingStatementExecutor {
    message: String,
}

impl FailingStatementExecutor {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl StatementExecutor for FailingStatementExecutor {
    async fn execute(&self, unit: &StatementExecuteUnit) -> Result<ExecuteResult> {
        Err(FanoutError::execution(format!(
            "{} on {}",
            self.message,
            unit.connection()
        )))
    }
}
