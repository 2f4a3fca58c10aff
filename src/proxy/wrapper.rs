//! Executor wrapper for plain and prepared statements.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::LogicSchema;
use crate::config::{ConfigurationProperties, SharedProperties};
use crate::error::Result;
use crate::executor::context::{
    ExecutionContext, ExecutionContextBuilder, ExecutionUnit, SqlUnit, Value,
};
use crate::executor::group::{BackendConnection, StatementExecuteGroupEngine, StatementOption};

/// Orchestrates one statement from logic SQL to a grouping engine.
pub trait ExecutorWrapper {
    /// Parses, routes and rewrites the SQL into an execution context.
    fn route(&self, sql: &str) -> Result<ExecutionContext>;

    /// Builds a grouping engine for the session's backend connection.
    fn get_execute_group_engine<'a, B: BackendConnection>(
        &self,
        backend_connection: &'a mut B,
        option: StatementOption,
    ) -> StatementExecuteGroupEngine<'a, B>;
}

/// Executor wrapper bound to one logic schema.
pub struct StatementExecutorWrapper {
    schema: Arc<LogicSchema>,
    props: SharedProperties,
}

impl StatementExecutorWrapper {
    pub fn new(schema: Arc<LogicSchema>, props: SharedProperties) -> Self {
        Self { schema, props }
    }

    pub fn schema(&self) -> &LogicSchema {
        &self.schema
    }

    /// Routes a statement with bound parameters.
    ///
    /// Properties are read once per call; a concurrent refresh does not
    /// affect a statement already being routed.
    pub fn route_with_parameters(
        &self,
        sql: &str,
        parameters: &[Value],
    ) -> Result<ExecutionContext> {
        let props = self.props.snapshot();
        let statement = Arc::new(self.schema.parser().parse(sql)?);
        let rules = self.schema.rules();

        if rules.is_empty() {
            let unit = ExecutionUnit::new(
                self.schema.default_data_source_name(),
                SqlUnit::new(sql, parameters.to_vec()),
            );
            let context = ExecutionContext::new(statement, vec![unit]);
            log_sql(&props, sql, &context);
            return Ok(context);
        }

        let route_context = self.schema.router().route(
            self.schema.metadata(),
            &props,
            rules,
            statement,
            sql,
            parameters,
        )?;
        if props.metrics_enabled {
            if let Err(e) = self.schema.metrics_collector().collect(&route_context, rules) {
                warn!(schema = %self.schema.name(), "Route metrics skipped: {e}");
            }
        }
        let rewrite_result = self
            .schema
            .rewriter()
            .rewrite(sql, parameters, &route_context)?;

        let context = ExecutionContext::new(
            Arc::clone(route_context.statement()),
            ExecutionContextBuilder::build(rewrite_result),
        );
        log_sql(&props, sql, &context);
        Ok(context)
    }
}

impl ExecutorWrapper for StatementExecutorWrapper {
    fn route(&self, sql: &str) -> Result<ExecutionContext> {
        self.route_with_parameters(sql, &[])
    }

    fn get_execute_group_engine<'a, B: BackendConnection>(
        &self,
        backend_connection: &'a mut B,
        option: StatementOption,
    ) -> StatementExecuteGroupEngine<'a, B> {
        let max_connections_size_per_query = self.props.snapshot().max_connections_size_per_query;
        debug!(
            schema = %self.schema.name(),
            max_connections_size_per_query,
            "Creating statement group engine"
        );
        StatementExecuteGroupEngine::statement(
            max_connections_size_per_query,
            backend_connection,
            option,
            Arc::clone(self.schema.statement_decorators()),
        )
    }
}

fn log_sql(props: &ConfigurationProperties, sql: &str, context: &ExecutionContext) {
    if !props.sql_show {
        return;
    }
    info!("Logic SQL: {sql}");
    info!("SQLStatement: {}", context.statement().kind());
    for unit in context.execution_units() {
        info!("Actual SQL: {unit}");
    }
}
