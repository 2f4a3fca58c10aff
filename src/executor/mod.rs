//! Execution units, input grouping and group execution.

pub mod context;
pub mod execute;
pub mod group;

pub use context::{ExecutionContext, ExecutionContextBuilder, ExecutionUnit, SqlUnit, Value};
pub use execute::{
    execute_groups, ExecuteResult, FailingStatementExecutor, MockStatementExecutor,
    StatementExecutor,
};
pub use group::{ExecutableInput, ExecuteGroupEngine, InputGroup};
