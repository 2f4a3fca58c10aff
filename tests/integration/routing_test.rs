//! Routing integration tests.
//!
//! Tests the executor wrapper from logic SQL to decorated input groups.

use std::sync::Arc;

use db_fanout::config::{Config, ConfigurationProperties, DataSourceConfig, SharedProperties};
use db_fanout::error::{FanoutError, StatementError};
use db_fanout::executor::group::{CachedBackendConnection, StatementOption};
use db_fanout::executor::{
    execute_groups, ExecutableInput, MockStatementExecutor, SqlUnit, Value,
};
use db_fanout::proxy::{ExecutorWrapper, LogicSchema, StatementExecutorWrapper};
use db_fanout::route::{SqlDialect, StatementKind};
use db_fanout::rule::{Rule, RuleKind};
use pretty_assertions::assert_eq;

fn wrapper(data_sources: &[&str], rules: Vec<Rule>) -> StatementExecutorWrapper {
    let data_sources = data_sources
        .iter()
        .map(|name| DataSourceConfig::new(*name, format!("postgres://localhost:5432/{name}")))
        .collect();
    let schema = LogicSchema::new("logic_db", data_sources, rules, SqlDialect::default()).unwrap();
    StatementExecutorWrapper::new(
        Arc::new(schema),
        SharedProperties::new(ConfigurationProperties::default()),
    )
}

fn sharding_rule(targets: &[&str]) -> Rule {
    Rule::new("sharding", RuleKind::Sharding).with_prop(
        "actual_data_sources",
        toml::Value::Array(targets.iter().map(|t| toml::Value::from(*t)).collect()),
    )
}

#[test]
fn test_unsharded_fallback_targets_default() {
    let wrapper = wrapper(&["default"], vec![]);
    let context = wrapper.route("SELECT 1").unwrap();

    assert_eq!(context.execution_units().len(), 1);
    let unit = &context.execution_units()[0];
    assert_eq!(unit.data_source_name(), "default");
    assert_eq!(unit.sql_unit(), &SqlUnit::new("SELECT 1", vec![]));
    assert_eq!(context.statement().kind(), StatementKind::Select);
}

#[test]
fn test_parse_error_reaches_caller_unchanged() {
    let wrapper = wrapper(&["default"], vec![]);
    let err = wrapper.route("SELEC 1 FORM").unwrap_err();
    assert!(matches!(
        err,
        FanoutError::Statement(StatementError::Parse(_))
    ));
}

#[test]
fn test_sharded_statement_fans_out_and_groups() {
    let wrapper = wrapper(
        &["ds_0", "ds_1", "ds_2"],
        vec![sharding_rule(&["ds_1", "ds_2"])],
    );
    let context = wrapper
        .route_with_parameters("SELECT * FROM t_order WHERE user_id = ?", &[Value::Int(7)])
        .unwrap();
    let targets: Vec<&str> = context
        .execution_units()
        .iter()
        .map(|u| u.data_source_name())
        .collect();
    assert_eq!(targets, vec!["ds_1", "ds_2"]);
    assert!(context
        .execution_units()
        .iter()
        .all(|u| u.sql_unit().parameters() == [Value::Int(7)]));

    let mut backend = CachedBackendConnection::new();
    let groups = wrapper
        .get_execute_group_engine(&mut backend, StatementOption::prepared())
        .generate(context.into_execution_units())
        .unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(backend.total_connections(), 2);
}

#[test]
fn test_default_config_routes_question_mark_parameters() {
    let config = Config {
        data_sources: vec![
            DataSourceConfig::new("ds_0", "postgres://localhost:5432/ds_0"),
            DataSourceConfig::new("ds_1", "postgres://localhost:5432/ds_1"),
        ],
        rules: vec![sharding_rule(&["ds_0", "ds_1"])],
        ..Config::default()
    };
    let schema = LogicSchema::from_config(&config).unwrap();
    let wrapper = StatementExecutorWrapper::new(
        Arc::new(schema),
        SharedProperties::new(config.props.clone()),
    );

    let context = wrapper
        .route_with_parameters("SELECT * FROM t_order WHERE user_id = ?", &[Value::Int(7)])
        .unwrap();
    assert_eq!(context.statement().kind(), StatementKind::Select);
    assert_eq!(context.execution_units().len(), 2);
}

#[test]
fn test_decorated_pipeline_tags_primary() {
    let rw = Rule::new("rw", RuleKind::ReadwriteSplitting)
        .with_prop("primary_data_source", "ds_0")
        .with_prop("replica_data_sources", toml::Value::Array(vec!["ds_1".into()]));
    let wrapper = wrapper(&["ds_0", "ds_1"], vec![rw, sharding_rule(&["ds_0", "ds_1"])]);
    let context = wrapper
        .route("UPDATE t_order SET status = 'PAID'")
        .unwrap();

    let mut backend = CachedBackendConnection::new();
    let groups = wrapper
        .get_execute_group_engine(&mut backend, StatementOption::default())
        .generate(context.into_execution_units())
        .unwrap();
    let roles: Vec<Option<&String>> = groups
        .iter()
        .map(|g| g.inputs()[0].attributes().get("readwrite.role"))
        .collect();
    assert_eq!(
        roles,
        vec![Some(&"primary".to_string()), Some(&"replica".to_string())]
    );
}

#[test]
fn test_refreshed_limit_applies_to_next_engine_only() {
    let schema = LogicSchema::new(
        "logic_db",
        vec![DataSourceConfig::new("ds_0", "postgres://localhost/ds_0")],
        vec![],
        SqlDialect::Postgres,
    )
    .unwrap();
    let props = SharedProperties::new(ConfigurationProperties::default());
    let wrapper = StatementExecutorWrapper::new(Arc::new(schema), props.clone());

    let mut first_backend = CachedBackendConnection::new();
    let first = wrapper.get_execute_group_engine(&mut first_backend, StatementOption::default());
    props
        .refresh(ConfigurationProperties {
            max_connections_size_per_query: 4,
            ..ConfigurationProperties::default()
        })
        .unwrap();
    assert_eq!(first.generator().max_connections_size_per_query(), 1);

    let mut second_backend = CachedBackendConnection::new();
    let second = wrapper.get_execute_group_engine(&mut second_backend, StatementOption::default());
    assert_eq!(second.generator().max_connections_size_per_query(), 4);
}

#[tokio::test]
async fn test_route_group_and_execute() {
    let wrapper = wrapper(&["ds_0", "ds_1"], vec![sharding_rule(&["ds_0", "ds_1"])]);
    let context = wrapper.route("SELECT * FROM t_order").unwrap();
    let mut backend = CachedBackendConnection::new();
    let groups = wrapper
        .get_execute_group_engine(&mut backend, StatementOption::default())
        .generate(context.into_execution_units())
        .unwrap();

    let results = execute_groups(&MockStatementExecutor::new(), groups)
        .await
        .unwrap();
    let sources: Vec<&str> = results.iter().map(|r| r.data_source_name.as_str()).collect();
    assert_eq!(sources, vec!["ds_0", "ds_1"]);
    assert!(results.iter().all(|r| r.rows.len() == 1));
}
