//! Statement orchestration for the proxy backend.
//!
//! Drives parse → route → rewrite for a logic schema and builds the
//! grouping engine that turns the resulting execution units into input
//! groups.

mod schema;
mod wrapper;

pub use schema::LogicSchema;
pub use wrapper::{ExecutorWrapper, StatementExecutorWrapper};
