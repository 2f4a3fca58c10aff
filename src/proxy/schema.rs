//! Logic schema: data sources, rules and the collaborators bound to them.

use std::sync::Arc;
use tracing::info;

use crate::config::{Config, DataSourceConfig};
use crate::error::{FanoutError, Result};
use crate::executor::group::{DecorationChain, DecoratorRegistry, StatementExecuteUnit};
use crate::route::{
    BroadcastRouter, RouteMetricsCollector, Router, SchemaMetaData, SqlDialect, SqlParserEngine,
    SqlRewriter, TableMappingRewriter, TracingMetricsCollector,
};
use crate::rule::Rule;

/// A logic schema served by the proxy.
///
/// The decoration chain is resolved once, when the schema is loaded, and
/// shared by every statement executed against it.
pub struct LogicSchema {
    metadata: SchemaMetaData,
    data_sources: Vec<DataSourceConfig>,
    rules: Vec<Arc<Rule>>,
    parser: SqlParserEngine,
    router: Arc<dyn Router>,
    rewriter: Arc<dyn SqlRewriter>,
    metrics_collector: Arc<dyn RouteMetricsCollector>,
    statement_decorators: Arc<DecorationChain<StatementExecuteUnit>>,
}

impl LogicSchema {
    /// Creates a schema with the built-in collaborators and decorators.
    pub fn new(
        name: impl Into<String>,
        data_sources: Vec<DataSourceConfig>,
        rules: Vec<Rule>,
        dialect: SqlDialect,
    ) -> Result<Self> {
        let name = name.into();
        if data_sources.is_empty() {
            return Err(FanoutError::config(format!(
                "Schema '{name}' has no data sources"
            )));
        }

        let rules: Vec<Arc<Rule>> = rules.into_iter().map(Arc::new).collect();
        let registry = DecoratorRegistry::<StatementExecuteUnit>::builtin()?;
        let statement_decorators = Arc::new(registry.resolve(&rules)?);
        let metadata = SchemaMetaData::new(
            name,
            data_sources.iter().map(|ds| ds.name.clone()).collect(),
        );

        info!(
            schema = %metadata.name,
            data_sources = data_sources.len(),
            rules = rules.len(),
            decorators = statement_decorators.len(),
            "Loaded logic schema"
        );

        Ok(Self {
            metadata,
            data_sources,
            rules,
            parser: SqlParserEngine::new(dialect),
            router: Arc::new(BroadcastRouter),
            rewriter: Arc::new(TableMappingRewriter),
            metrics_collector: Arc::new(TracingMetricsCollector),
            statement_decorators,
        })
    }

    /// Creates a schema from a validated configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let dialect = SqlDialect::parse(&config.props.sql_dialect).ok_or_else(|| {
            FanoutError::config(format!("Unknown sql_dialect '{}'", config.props.sql_dialect))
        })?;
        Self::new(
            config.schema_name.clone(),
            config.data_sources.clone(),
            config.rules.clone(),
            dialect,
        )
    }

    /// Re-resolves the decoration chain against a custom registry.
    pub fn with_registry(
        mut self,
        registry: &DecoratorRegistry<StatementExecuteUnit>,
    ) -> Result<Self> {
        self.statement_decorators = Arc::new(registry.resolve(&self.rules)?);
        Ok(self)
    }

    pub fn with_router(mut self, router: Arc<dyn Router>) -> Self {
        self.router = router;
        self
    }

    pub fn with_rewriter(mut self, rewriter: Arc<dyn SqlRewriter>) -> Self {
        self.rewriter = rewriter;
        self
    }

    pub fn with_metrics_collector(mut self, collector: Arc<dyn RouteMetricsCollector>) -> Self {
        self.metrics_collector = collector;
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn metadata(&self) -> &SchemaMetaData {
        &self.metadata
    }

    pub fn data_sources(&self) -> &[DataSourceConfig] {
        &self.data_sources
    }

    /// The data source used when the schema has no rules.
    pub fn default_data_source_name(&self) -> &str {
        // `new` rejects schemas without data sources.
        &self.metadata.data_source_names[0]
    }

    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    pub fn parser(&self) -> &SqlParserEngine {
        &self.parser
    }

    pub fn router(&self) -> &dyn Router {
        self.router.as_ref()
    }

    pub fn rewriter(&self) -> &dyn SqlRewriter {
        self.rewriter.as_ref()
    }

    pub fn metrics_collector(&self) -> &dyn RouteMetricsCollector {
        self.metrics_collector.as_ref()
    }

    /// Decoration chain resolved for statement execution.
    pub fn statement_decorators(&self) -> &Arc<DecorationChain<StatementExecuteUnit>> {
        &self.statement_decorators
    }
}
