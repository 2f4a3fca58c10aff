//! Grouping integration tests.
//!
//! Tests how execution units are grouped per data source and bound to
//! backend connections.

use std::collections::HashSet;
use std::sync::Arc;

use db_fanout::error::FanoutError;
use db_fanout::executor::group::{
    CachedBackendConnection, ConnectionMode, DecorationChain, RawExecuteGroupEngine,
    StatementExecuteGroupEngine, StatementOption,
};
use db_fanout::executor::{ExecutableInput, ExecutionUnit, InputGroup, SqlUnit};
use pretty_assertions::assert_eq;

fn unit(ds: &str, sql: &str) -> ExecutionUnit {
    ExecutionUnit::new(ds, SqlUnit::new(sql, vec![]))
}

fn scenario() -> Vec<ExecutionUnit> {
    vec![
        unit("dsA", "SELECT 1"),
        unit("dsB", "SELECT 2"),
        unit("dsA", "SELECT 3"),
    ]
}

fn shape<T: ExecutableInput>(groups: &[InputGroup<T>]) -> Vec<(String, Vec<String>)> {
    groups
        .iter()
        .map(|group| {
            (
                group.data_source_name().unwrap_or_default().to_string(),
                group
                    .inputs()
                    .iter()
                    .map(|input| input.execution_unit().sql_unit().sql().to_string())
                    .collect(),
            )
        })
        .collect()
}

#[test]
fn test_end_to_end_scenario_without_rules() {
    let mut backend = CachedBackendConnection::new();
    let groups = StatementExecuteGroupEngine::statement(
        1,
        &mut backend,
        StatementOption::default(),
        Arc::new(DecorationChain::empty()),
    )
    .generate(scenario())
    .unwrap();

    assert_eq!(
        shape(&groups),
        vec![
            (
                "dsA".to_string(),
                vec!["SELECT 1".to_string(), "SELECT 3".to_string()]
            ),
            ("dsB".to_string(), vec!["SELECT 2".to_string()]),
        ]
    );
    assert!(groups
        .iter()
        .flat_map(|g| g.inputs())
        .all(|input| input.attributes().is_empty()));
}

#[test]
fn test_units_and_data_sources_are_preserved() {
    let input = vec![
        unit("ds_2", "SELECT a"),
        unit("ds_0", "SELECT b"),
        unit("ds_1", "SELECT c"),
        unit("ds_0", "SELECT d"),
        unit("ds_2", "SELECT e"),
        unit("ds_2", "SELECT f"),
    ];
    let input_sources: HashSet<String> = input
        .iter()
        .map(|u| u.data_source_name().to_string())
        .collect();

    for max in 1..=4 {
        let groups = RawExecuteGroupEngine::raw(max, Arc::new(DecorationChain::empty()))
            .generate(input.clone())
            .unwrap();
        let output_sources: HashSet<String> = groups
            .iter()
            .filter_map(|g| g.data_source_name().map(String::from))
            .collect();
        let total: usize = groups.iter().map(InputGroup::len).sum();

        assert_eq!(output_sources, input_sources, "max = {max}");
        assert_eq!(total, input.len(), "max = {max}");
    }
}

#[test]
fn test_grouping_is_deterministic() {
    let input = vec![
        unit("ds_1", "SELECT 1"),
        unit("ds_0", "SELECT 2"),
        unit("ds_1", "SELECT 3"),
        unit("ds_2", "SELECT 4"),
    ];
    let first = RawExecuteGroupEngine::raw(1, Arc::new(DecorationChain::empty()))
        .generate(input.clone())
        .unwrap();
    let second = RawExecuteGroupEngine::raw(1, Arc::new(DecorationChain::empty()))
        .generate(input.clone())
        .unwrap();

    assert_eq!(first, second);
    let order: Vec<&str> = first.iter().filter_map(|g| g.data_source_name()).collect();
    assert_eq!(order, vec!["ds_1", "ds_0", "ds_2"]);

    // Two units on ds_1 with a limit of 2 split into one group per unit.
    let split = RawExecuteGroupEngine::raw(2, Arc::new(DecorationChain::empty()))
        .generate(input)
        .unwrap();
    let order: Vec<&str> = split.iter().filter_map(|g| g.data_source_name()).collect();
    assert_eq!(order, vec!["ds_1", "ds_1", "ds_0", "ds_2"]);
}

#[test]
fn test_single_connection_limit_shares_one_connection() {
    let mut backend = CachedBackendConnection::new();
    let groups = StatementExecuteGroupEngine::statement(
        1,
        &mut backend,
        StatementOption::default(),
        Arc::new(DecorationChain::empty()),
    )
    .generate(vec![
        unit("ds_0", "SELECT 1"),
        unit("ds_0", "SELECT 2"),
        unit("ds_0", "SELECT 3"),
    ])
    .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 3);
    let connections: HashSet<_> = groups[0].inputs().iter().map(|i| i.connection()).collect();
    assert_eq!(connections.len(), 1);
    assert!(groups[0]
        .inputs()
        .iter()
        .all(|i| i.connection_mode() == ConnectionMode::ConnectionStrictly));
    assert_eq!(backend.connection_count("ds_0"), 1);
}

#[test]
fn test_generous_limit_uses_one_connection_per_unit() {
    let mut backend = CachedBackendConnection::new();
    let groups = StatementExecuteGroupEngine::statement(
        8,
        &mut backend,
        StatementOption::prepared(),
        Arc::new(DecorationChain::empty()),
    )
    .generate(vec![unit("ds_0", "SELECT 1"), unit("ds_0", "SELECT 2")])
    .unwrap();

    assert_eq!(groups.len(), 2);
    assert_ne!(groups[0].inputs()[0].connection(), groups[1].inputs()[0].connection());
    assert!(groups
        .iter()
        .flat_map(|g| g.inputs())
        .all(|i| i.connection_mode() == ConnectionMode::MemoryStrictly && i.option().prepared));
}

#[test]
fn test_connections_are_reused_across_statements() {
    let mut backend = CachedBackendConnection::new();
    for _ in 0..3 {
        StatementExecuteGroupEngine::statement(
            2,
            &mut backend,
            StatementOption::default(),
            Arc::new(DecorationChain::empty()),
        )
        .generate(scenario())
        .unwrap();
    }

    assert_eq!(backend.connection_count("dsA"), 2);
    assert_eq!(backend.connection_count("dsB"), 1);
    assert_eq!(backend.total_connections(), 3);
}

#[test]
fn test_pool_exhaustion_fails_the_statement() {
    let mut backend = CachedBackendConnection::with_pool_size(1);
    let err = StatementExecuteGroupEngine::statement(
        3,
        &mut backend,
        StatementOption::default(),
        Arc::new(DecorationChain::empty()),
    )
    .generate(scenario())
    .unwrap_err();

    match err {
        FanoutError::Grouping { data_source, .. } => assert_eq!(data_source, "dsA"),
        other => panic!("Expected grouping error, got {:?}", other),
    }
}

#[test]
fn test_zero_limit_is_grouping_error() {
    let err = RawExecuteGroupEngine::raw(0, Arc::new(DecorationChain::empty()))
        .generate(scenario())
        .unwrap_err();
    assert!(matches!(err, FanoutError::Grouping { .. }));
    assert!(err.to_string().contains("dsA"));
}

#[test]
fn test_empty_input_yields_no_groups() {
    let groups = RawExecuteGroupEngine::raw(1, Arc::new(DecorationChain::empty()))
        .generate(Vec::new())
        .unwrap();
    assert!(groups.is_empty());
}
