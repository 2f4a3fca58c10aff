//! Built-in routing collaborators.
//!
//! These cover unsharded and broadcast deployments. They make no attempt at
//! shard-key evaluation.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::{
    RewriteResult, RouteContext, RouteMetricsCollector, RouteUnit, Router, SchemaMetaData,
    SqlRewriter, SqlStatement,
};
use crate::config::ConfigurationProperties;
use crate::error::{Result, StatementError};
use crate::executor::context::{SqlUnit, Value};
use crate::rule::{Rule, RuleKind};

/// Routes every statement to all actual data sources of the sharding rules.
///
/// Without sharding rules, or when none lists `actual_data_sources`, the
/// statement is broadcast to every data source of the schema.
#[derive(Debug, Clone, Default)]
pub struct BroadcastRouter;

impl Router for BroadcastRouter {
    fn route(
        &self,
        metadata: &SchemaMetaData,
        _props: &ConfigurationProperties,
        rules: &[Arc<Rule>],
        statement: Arc<SqlStatement>,
        _sql: &str,
        _parameters: &[Value],
    ) -> std::result::Result<RouteContext, StatementError> {
        let mut targets: Vec<String> = Vec::new();
        for rule in rules.iter().filter(|r| r.kind == RuleKind::Sharding) {
            for ds in rule.prop_str_list("actual_data_sources") {
                if !metadata.contains_data_source(&ds) {
                    return Err(StatementError::route(format!(
                        "Rule '{}' references unknown data source '{ds}'",
                        rule.name
                    )));
                }
                if !targets.contains(&ds) {
                    targets.push(ds);
                }
            }
        }
        if targets.is_empty() {
            targets = metadata.data_source_names.clone();
        }
        if targets.is_empty() {
            return Err(StatementError::route(format!(
                "Schema '{}' has no data sources",
                metadata.name
            )));
        }

        debug!(targets = targets.len(), kind = %statement.kind(), "Broadcast route");
        Ok(RouteContext::new(
            statement,
            targets.into_iter().map(RouteUnit::new).collect(),
        ))
    }
}

/// Rewrites logic table names to actual table names per route unit.
#[derive(Debug, Clone, Default)]
pub struct TableMappingRewriter;

impl SqlRewriter for TableMappingRewriter {
    fn rewrite(
        &self,
        sql: &str,
        parameters: &[Value],
        route_context: &RouteContext,
    ) -> std::result::Result<RewriteResult, StatementError> {
        let mut sql_units = Vec::with_capacity(route_context.route_units().len());
        for route_unit in route_context.route_units() {
            let mut actual_sql = sql.to_string();
            for mapper in &route_unit.table_mappers {
                let pattern = format!(r"\b{}\b", regex::escape(&mapper.logic_name));
                let regex = Regex::new(&pattern)
                    .map_err(|e| StatementError::rewrite(format!("{}: {e}", mapper.logic_name)))?;
                actual_sql = regex
                    .replace_all(&actual_sql, mapper.actual_name.as_str())
                    .into_owned();
            }
            sql_units.push((
                route_unit.clone(),
                SqlUnit::new(actual_sql, parameters.to_vec()),
            ));
        }
        Ok(RewriteResult::new(sql_units))
    }
}

/// Logs routing fan-out per rule kind.
#[derive(Debug, Clone, Default)]
pub struct TracingMetricsCollector;

impl RouteMetricsCollector for TracingMetricsCollector {
    fn collect(&self, route_context: &RouteContext, rules: &[Arc<Rule>]) -> Result<()> {
        let mut per_kind: BTreeMap<RuleKind, usize> = BTreeMap::new();
        for rule in rules {
            *per_kind.entry(rule.kind).or_default() += 1;
        }
        for (kind, count) in per_kind {
            debug!(
                rule_kind = %kind,
                rules = count,
                route_units = route_context.route_units().len(),
                data_sources = route_context.actual_data_source_names().len(),
                statement = %route_context.statement().kind(),
                "Route metrics"
            );
        }
        Ok(())
    }
}
