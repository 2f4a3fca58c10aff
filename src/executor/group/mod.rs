//! Grouping of execution units into input groups.
//!
//! The engine partitions execution units by data source (first-seen order,
//! input order inside a data source), hands every partition to a
//! statement-kind specific generator, and runs the result through the
//! decoration chain resolved for the schema's rules.

pub mod decorator;
pub mod decorators;
pub mod raw;
pub mod statement;

pub use decorator::{
    DecorationChain, DecoratorRegistry, DecoratorRegistryBuilder, ExecuteGroupDecorator,
};
pub use raw::{RawExecuteGroupEngine, RawExecuteUnit, RawGroupGenerator};
pub use statement::{
    BackendConnection, CachedBackendConnection, ConnectionHandle, StatementExecuteGroupEngine,
    StatementExecuteUnit, StatementGroupGenerator, StatementOption,
};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::{FanoutError, Result};
use crate::executor::context::{ExecutionUnit, SqlUnit};

/// Auxiliary metadata decorators attach to an input.
pub type Attributes = BTreeMap<String, String>;

/// An input that can be placed in an [`InputGroup`].
pub trait ExecutableInput: Send {
    /// The execution unit this input runs.
    fn execution_unit(&self) -> &ExecutionUnit;

    /// Metadata attached by decorators.
    fn attributes(&self) -> &Attributes;

    /// Mutable access to decorator metadata.
    fn attributes_mut(&mut self) -> &mut Attributes;

    /// Target data source of the input.
    fn data_source_name(&self) -> &str {
        self.execution_unit().data_source_name()
    }
}

/// Inputs that run under one logical grouping (one connection or statement).
///
/// All inputs of a group target the same data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputGroup<T> {
    inputs: Vec<T>,
}

impl<T> InputGroup<T> {
    /// Creates a group from its inputs.
    pub fn new(inputs: Vec<T>) -> Self {
        Self { inputs }
    }

    /// Returns the inputs in execution order.
    pub fn inputs(&self) -> &[T] {
        &self.inputs
    }

    /// Mutable access to the inputs.
    pub fn inputs_mut(&mut self) -> &mut [T] {
        &mut self.inputs
    }

    /// Consumes the group, returning its inputs.
    pub fn into_inputs(self) -> Vec<T> {
        self.inputs
    }

    /// Number of inputs in the group.
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// Returns true if the group holds no inputs.
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

impl<T: ExecutableInput> InputGroup<T> {
    /// Data source shared by the inputs, if the group is not empty.
    pub fn data_source_name(&self) -> Option<&str> {
        self.inputs.first().map(|input| input.data_source_name())
    }
}

/// How connections are shared by the SQL units of one data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionMode {
    /// One connection per SQL unit; results may be streamed.
    MemoryStrictly,
    /// Several SQL units share a connection; results are loaded eagerly.
    ConnectionStrictly,
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MemoryStrictly => write!(f, "MEMORY_STRICTLY"),
            Self::ConnectionStrictly => write!(f, "CONNECTION_STRICTLY"),
        }
    }
}

/// Per-data-source step of the grouping algorithm.
pub trait SqlExecuteGroupGenerator<T> {
    /// Turns the SQL units of one data source into input groups.
    fn generate_sql_execute_groups(
        &mut self,
        data_source_name: &str,
        sql_units: Vec<SqlUnit>,
    ) -> Result<Vec<InputGroup<T>>>;
}

/// Groups execution units and decorates the resulting input groups.
pub struct ExecuteGroupEngine<T, G> {
    generator: G,
    decorators: Arc<DecorationChain<T>>,
}

impl<T, G> ExecuteGroupEngine<T, G>
where
    T: ExecutableInput,
    G: SqlExecuteGroupGenerator<T>,
{
    /// Creates an engine from a generator and a resolved decoration chain.
    pub fn new(generator: G, decorators: Arc<DecorationChain<T>>) -> Self {
        Self {
            generator,
            decorators,
        }
    }

    /// Generates decorated input groups for the execution units.
    ///
    /// Any generator failure discards the groups built so far.
    pub fn generate(
        &mut self,
        execution_units: impl IntoIterator<Item = ExecutionUnit>,
    ) -> Result<Vec<InputGroup<T>>> {
        let mut result = Vec::new();
        for (data_source_name, sql_units) in group_sql_units(execution_units) {
            let unit_count = sql_units.len();
            let groups = self
                .generator
                .generate_sql_execute_groups(&data_source_name, sql_units)?;
            debug!(
                data_source = %data_source_name,
                sql_units = unit_count,
                groups = groups.len(),
                "Generated input groups"
            );
            result.extend(groups);
        }
        Ok(self.decorators.decorate(result))
    }

    /// Returns the per-data-source generator.
    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Returns the decoration chain applied after grouping.
    pub fn decorators(&self) -> &DecorationChain<T> {
        &self.decorators
    }
}

/// Partitions execution units by data source.
///
/// Data sources appear in first-seen order and each SQL unit list keeps the
/// input order.
pub fn group_sql_units(
    execution_units: impl IntoIterator<Item = ExecutionUnit>,
) -> Vec<(String, Vec<SqlUnit>)> {
    let mut result: Vec<(String, Vec<SqlUnit>)> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();
    for unit in execution_units {
        let (data_source_name, sql_unit) = unit.into_parts();
        let slot = match slots.get(&data_source_name) {
            Some(&slot) => slot,
            None => {
                slots.insert(data_source_name.clone(), result.len());
                result.push((data_source_name, Vec::new()));
                result.len() - 1
            }
        };
        result[slot].1.push(sql_unit);
    }
    result
}

/// Splits the SQL units of one data source into per-connection partitions.
///
/// Each partition holds `ceil(n / max_connections)` units (at least one),
/// so no more than `max_connections` partitions are produced.
pub fn partition_sql_units(
    data_source_name: &str,
    sql_units: Vec<SqlUnit>,
    max_connections: usize,
) -> Result<(ConnectionMode, Vec<Vec<SqlUnit>>)> {
    if max_connections == 0 {
        return Err(FanoutError::grouping(
            data_source_name,
            "max_connections_size_per_query must be at least 1",
        ));
    }

    let total = sql_units.len();
    let desired_partition_size = total.div_ceil(max_connections).max(1);
    let mode = if max_connections < total {
        ConnectionMode::ConnectionStrictly
    } else {
        ConnectionMode::MemoryStrictly
    };

    let mut partitions = Vec::with_capacity(total.div_ceil(desired_partition_size));
    let mut current = Vec::with_capacity(desired_partition_size);
    for sql_unit in sql_units {
        current.push(sql_unit);
        if current.len() == desired_partition_size {
            partitions.push(std::mem::replace(
                &mut current,
                Vec::with_capacity(desired_partition_size),
            ));
        }
    }
    if !current.is_empty() {
        partitions.push(current);
    }

    Ok((mode, partitions))
}
