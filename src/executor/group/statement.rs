//! Statement grouping: one input group per physical connection.
//!
//! The SQL units of a data source are partitioned under the
//! `max_connections_size_per_query` limit, one connection is acquired from
//! the [`BackendConnection`] per partition, and every unit of the partition
//! is bound to that connection.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::{
    partition_sql_units, Attributes, ConnectionMode, DecorationChain, ExecutableInput,
    ExecuteGroupEngine, InputGroup, SqlExecuteGroupGenerator,
};
use crate::error::{FanoutError, Result};
use crate::executor::context::{ExecutionUnit, SqlUnit};

/// A physical connection handed out by a [`BackendConnection`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionHandle {
    pub data_source_name: String,
    pub id: u64,
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.data_source_name, self.id)
    }
}

/// Options applied to every statement created for a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementOption {
    /// Bind parameters through a prepared statement.
    #[serde(default)]
    pub prepared: bool,

    /// Return the keys generated by inserts.
    #[serde(default)]
    pub return_generated_keys: bool,
}

impl StatementOption {
    /// Options for prepared statements.
    pub fn prepared() -> Self {
        Self {
            prepared: true,
            ..Default::default()
        }
    }

    /// Also returns generated keys.
    pub fn with_generated_keys(mut self) -> Self {
        self.return_generated_keys = true;
        self
    }
}

/// An execution unit bound to a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementExecuteUnit {
    execution_unit: ExecutionUnit,
    connection: ConnectionHandle,
    connection_mode: ConnectionMode,
    option: StatementOption,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    attributes: Attributes,
}

impl StatementExecuteUnit {
    pub fn new(
        execution_unit: ExecutionUnit,
        connection: ConnectionHandle,
        connection_mode: ConnectionMode,
        option: StatementOption,
    ) -> Self {
        Self {
            execution_unit,
            connection,
            connection_mode,
            option,
            attributes: Attributes::new(),
        }
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    pub fn connection_mode(&self) -> ConnectionMode {
        self.connection_mode
    }

    pub fn option(&self) -> &StatementOption {
        &self.option
    }
}

impl ExecutableInput for StatementExecuteUnit {
    fn execution_unit(&self) -> &ExecutionUnit {
        &self.execution_unit
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }
}

/// Source of physical connections for one client session.
pub trait BackendConnection {
    /// Returns `size` connections to the data source.
    fn get_connections(
        &mut self,
        data_source_name: &str,
        size: usize,
        mode: ConnectionMode,
    ) -> Result<Vec<ConnectionHandle>>;
}

/// Session-scoped connection cache.
///
/// Connections opened for a data source are kept and reused by later
/// queries of the same session. An optional pool limit caps how many
/// connections a data source may hold.
#[derive(Debug, Default)]
pub struct CachedBackendConnection {
    cached: HashMap<String, Vec<ConnectionHandle>>,
    pool_size_per_data_source: Option<usize>,
    next_id: u64,
}

impl CachedBackendConnection {
    /// Creates a connection cache without a pool limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a connection cache capped per data source.
    pub fn with_pool_size(pool_size_per_data_source: usize) -> Self {
        Self {
            pool_size_per_data_source: Some(pool_size_per_data_source),
            ..Self::default()
        }
    }

    /// Number of connections held for a data source.
    pub fn connection_count(&self, data_source_name: &str) -> usize {
        self.cached.get(data_source_name).map_or(0, Vec::len)
    }

    /// Total connections held across data sources.
    pub fn total_connections(&self) -> usize {
        self.cached.values().map(Vec::len).sum()
    }

    /// Drops every cached connection.
    pub fn close(&mut self) {
        self.cached.clear();
    }
}

impl BackendConnection for CachedBackendConnection {
    fn get_connections(
        &mut self,
        data_source_name: &str,
        size: usize,
        mode: ConnectionMode,
    ) -> Result<Vec<ConnectionHandle>> {
        let held = self.connection_count(data_source_name);
        if held < size {
            if let Some(limit) = self.pool_size_per_data_source {
                if size > limit {
                    return Err(FanoutError::grouping(
                        data_source_name,
                        format!(
                            "cannot acquire {size} connections in {mode} mode, pool size is {limit}"
                        ),
                    ));
                }
            }
            let cached = self.cached.entry(data_source_name.to_string()).or_default();
            for _ in held..size {
                self.next_id += 1;
                cached.push(ConnectionHandle {
                    data_source_name: data_source_name.to_string(),
                    id: self.next_id,
                });
            }
            debug!(
                data_source = %data_source_name,
                opened = size - held,
                %mode,
                "Opened backend connections"
            );
        }
        Ok(self
            .cached
            .get(data_source_name)
            .map(|cached| cached[..size].to_vec())
            .unwrap_or_default())
    }
}

/// Generator binding partitions to backend connections.
pub struct StatementGroupGenerator<'a, B> {
    max_connections_size_per_query: usize,
    backend_connection: &'a mut B,
    option: StatementOption,
}

impl<'a, B: BackendConnection> StatementGroupGenerator<'a, B> {
    pub fn new(
        max_connections_size_per_query: usize,
        backend_connection: &'a mut B,
        option: StatementOption,
    ) -> Self {
        Self {
            max_connections_size_per_query,
            backend_connection,
            option,
        }
    }

    pub fn max_connections_size_per_query(&self) -> usize {
        self.max_connections_size_per_query
    }
}

impl<B: BackendConnection> SqlExecuteGroupGenerator<StatementExecuteUnit>
    for StatementGroupGenerator<'_, B>
{
    fn generate_sql_execute_groups(
        &mut self,
        data_source_name: &str,
        sql_units: Vec<SqlUnit>,
    ) -> Result<Vec<InputGroup<StatementExecuteUnit>>> {
        let (mode, partitions) = partition_sql_units(
            data_source_name,
            sql_units,
            self.max_connections_size_per_query,
        )?;
        let connections =
            self.backend_connection
                .get_connections(data_source_name, partitions.len(), mode)?;
        if connections.len() != partitions.len() {
            return Err(FanoutError::grouping(
                data_source_name,
                format!(
                    "backend returned {} connections for {} partitions",
                    connections.len(),
                    partitions.len()
                ),
            ));
        }

        Ok(partitions
            .into_iter()
            .zip(connections)
            .map(|(partition, connection)| {
                InputGroup::new(
                    partition
                        .into_iter()
                        .map(|sql_unit| {
                            StatementExecuteUnit::new(
                                ExecutionUnit::new(data_source_name, sql_unit),
                                connection.clone(),
                                mode,
                                self.option.clone(),
                            )
                        })
                        .collect(),
                )
            })
            .collect())
    }
}

/// Grouping engine for statement execution.
pub type StatementExecuteGroupEngine<'a, B> =
    ExecuteGroupEngine<StatementExecuteUnit, StatementGroupGenerator<'a, B>>;

impl<'a, B: BackendConnection> StatementExecuteGroupEngine<'a, B> {
    /// Creates a statement engine bounded by the connection limit.
    pub fn statement(
        max_connections_size_per_query: usize,
        backend_connection: &'a mut B,
        option: StatementOption,
        decorators: Arc<DecorationChain<StatementExecuteUnit>>,
    ) -> Self {
        Self::new(
            StatementGroupGenerator::new(
                max_connections_size_per_query,
                backend_connection,
                option,
            ),
            decorators,
        )
    }
}
