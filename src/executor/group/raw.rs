//! Connection-less grouping.
//!
//! Used by executors that manage their own connections: SQL units are
//! partitioned under the connection limit but no connection is acquired.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{
    partition_sql_units, Attributes, ConnectionMode, DecorationChain, ExecutableInput,
    ExecuteGroupEngine, InputGroup, SqlExecuteGroupGenerator,
};
use crate::error::Result;
use crate::executor::context::{ExecutionUnit, SqlUnit};

/// An execution unit with its connection mode but no connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawExecuteUnit {
    execution_unit: ExecutionUnit,
    connection_mode: ConnectionMode,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    attributes: Attributes,
}

impl RawExecuteUnit {
    /// Creates a raw unit in memory-strictly mode.
    pub fn new(execution_unit: ExecutionUnit) -> Self {
        Self::with_mode(execution_unit, ConnectionMode::MemoryStrictly)
    }

    /// Creates a raw unit with an explicit connection mode.
    pub fn with_mode(execution_unit: ExecutionUnit, connection_mode: ConnectionMode) -> Self {
        Self {
            execution_unit,
            connection_mode,
            attributes: Attributes::new(),
        }
    }

    pub fn connection_mode(&self) -> ConnectionMode {
        self.connection_mode
    }
}

impl ExecutableInput for RawExecuteUnit {
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

/// Generator producing one raw group per partition.
#[derive(Debug, Clone)]
pub struct RawGroupGenerator {
    max_connections_size_per_query: usize,
}

impl RawGroupGenerator {
    pub fn new(max_connections_size_per_query: usize) -> Self {
        Self {
            max_connections_size_per_query,
        }
    }
}

impl SqlExecuteGroupGenerator<RawExecuteUnit> for RawGroupGenerator {
    fn generate_sql_execute_groups(
        &mut self,
        data_source_name: &str,
        sql_units: Vec<SqlUnit>,
    ) -> Result<Vec<InputGroup<RawExecuteUnit>>> {
        let (mode, partitions) = partition_sql_units(
            data_source_name,
            sql_units,
            self.max_connections_size_per_query,
        )?;
        Ok(partitions
            .into_iter()
            .map(|partition| {
                InputGroup::new(
                    partition
                        .into_iter()
                        .map(|sql_unit| {
                            RawExecuteUnit::with_mode(
                                ExecutionUnit::new(data_source_name, sql_unit),
                                mode,
                            )
                        })
                        .collect(),
                )
            })
            .collect())
    }
}

/// Grouping engine for raw execution.
pub type RawExecuteGroupEngine = ExecuteGroupEngine<RawExecuteUnit, RawGroupGenerator>;

impl RawExecuteGroupEngine {
    /// Creates a raw engine bounded by the connection limit.
    pub fn raw(
        max_connections_size_per_query: usize,
        decorators: Arc<DecorationChain<RawExecuteUnit>>,
    ) -> Self {
        Self::new(
            RawGroupGenerator::new(max_connections_size_per_query),
            decorators,
        )
    }
}
