//! Decoration integration tests.
//!
//! Tests registry resolution, decorator ordering and the built-in
//! decorators applied to statement groups.

use std::sync::{Arc, Mutex};

use db_fanout::error::FanoutError;
use db_fanout::executor::group::decorators::{
    register_builtin, METRICS_GROUP_INDEX, METRICS_GROUP_SIZE, METRICS_RULE, READWRITE_ROLE,
    SHADOW,
};
use db_fanout::executor::group::{
    CachedBackendConnection, DecoratorRegistry, ExecuteGroupDecorator, RawExecuteGroupEngine,
    RawExecuteUnit, StatementExecuteGroupEngine, StatementExecuteUnit, StatementOption,
};
use db_fanout::executor::{ExecutableInput, ExecutionUnit, InputGroup, SqlUnit};
use db_fanout::rule::{Rule, RuleKind};
use pretty_assertions::assert_eq;

fn unit(ds: &str, sql: &str) -> ExecutionUnit {
    ExecutionUnit::new(ds, SqlUnit::new(sql, vec![]))
}

fn rules(rules: Vec<Rule>) -> Vec<Arc<Rule>> {
    rules.into_iter().map(Arc::new).collect()
}

fn rw_rule() -> Rule {
    Rule::new("rw", RuleKind::ReadwriteSplitting)
        .with_prop("primary_data_source", "ds_0")
        .with_prop(
            "replica_data_sources",
            toml::Value::Array(vec!["ds_1".into()]),
        )
}

fn decorate(
    rule_set: &[Arc<Rule>],
    input: Vec<ExecutionUnit>,
) -> Vec<InputGroup<StatementExecuteUnit>> {
    let registry = DecoratorRegistry::<StatementExecuteUnit>::builtin().unwrap();
    let chain = Arc::new(registry.resolve(rule_set).unwrap());
    let mut backend = CachedBackendConnection::new();
    StatementExecuteGroupEngine::statement(1, &mut backend, StatementOption::default(), chain)
        .generate(input)
        .unwrap()
}

fn attribute<'a>(input: &'a StatementExecuteUnit, key: &str) -> Option<&'a str> {
    input.attributes().get(key).map(String::as_str)
}

/// Records the order in which decorators run.
struct Recording {
    kind: RuleKind,
    log: Arc<Mutex<Vec<String>>>,
}

impl ExecuteGroupDecorator<RawExecuteUnit> for Recording {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn rule_kind(&self) -> RuleKind {
        self.kind
    }

    fn decorate(
        &self,
        rule: &Rule,
        input_groups: Vec<InputGroup<RawExecuteUnit>>,
    ) -> Vec<InputGroup<RawExecuteUnit>> {
        self.log.lock().unwrap().push(rule.name.clone());
        input_groups
    }
}

#[test]
fn test_decorators_apply_in_ascending_priority() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = DecoratorRegistry::<RawExecuteUnit>::builder()
        .register(Recording {
            kind: RuleKind::Metrics,
            log: Arc::clone(&log),
        })
        .register(Recording {
            kind: RuleKind::Shadow,
            log: Arc::clone(&log),
        })
        .build()
        .unwrap();
    let rule_set = rules(vec![
        Rule::new("metrics", RuleKind::Metrics),
        Rule::new("shadow", RuleKind::Shadow),
    ]);

    let chain = Arc::new(registry.resolve(&rule_set).unwrap());
    let resolved: Vec<&str> = chain.rules().map(|r| r.name.as_str()).collect();
    assert_eq!(resolved, vec!["shadow", "metrics"]);

    for _ in 0..2 {
        RawExecuteGroupEngine::raw(1, Arc::clone(&chain))
            .generate(vec![unit("ds_0", "SELECT 1")])
            .unwrap();
    }
    assert_eq!(
        *log.lock().unwrap(),
        vec!["shadow", "metrics", "shadow", "metrics"]
    );
}

#[test]
fn test_rules_without_decorator_are_skipped() {
    let rule_set = rules(vec![
        Rule::new("sharding", RuleKind::Sharding),
        Rule::new("encrypt", RuleKind::Encrypt),
    ]);
    let registry = DecoratorRegistry::<StatementExecuteUnit>::builtin().unwrap();
    assert!(registry.resolve(&rule_set).unwrap().is_empty());

    let groups = decorate(&rule_set, vec![unit("ds_0", "SELECT 1")]);
    assert!(groups[0].inputs()[0].attributes().is_empty());
}

#[test]
fn test_builtin_decorators_tag_inputs() {
    let rule_set = rules(vec![
        Rule::new("metrics", RuleKind::Metrics),
        Rule::new("shadow", RuleKind::Shadow).with_prop(
            "shadow_data_sources",
            toml::Value::Array(vec!["ds_2".into()]),
        ),
        rw_rule(),
    ]);
    let groups = decorate(
        &rule_set,
        vec![
            unit("ds_0", "UPDATE t_order SET status = 'PAID'"),
            unit("ds_1", "SELECT * FROM t_order"),
            unit("ds_2", "SELECT * FROM t_order"),
            unit("ds_3", "SELECT * FROM t_order /* shadow:true */"),
        ],
    );

    assert_eq!(groups.len(), 4);
    let primary = &groups[0].inputs()[0];
    assert_eq!(attribute(primary, READWRITE_ROLE), Some("primary"));
    assert_eq!(attribute(primary, SHADOW), None);

    let replica = &groups[1].inputs()[0];
    assert_eq!(attribute(replica, READWRITE_ROLE), Some("replica"));

    let shadow_by_source = &groups[2].inputs()[0];
    assert_eq!(attribute(shadow_by_source, READWRITE_ROLE), None);
    assert_eq!(attribute(shadow_by_source, SHADOW), Some("true"));

    let shadow_by_hint = &groups[3].inputs()[0];
    assert_eq!(attribute(shadow_by_hint, SHADOW), Some("true"));

    for (index, group) in groups.iter().enumerate() {
        let input = &group.inputs()[0];
        assert_eq!(attribute(input, METRICS_RULE), Some("metrics"));
        assert_eq!(
            attribute(input, METRICS_GROUP_INDEX),
            Some(index.to_string().as_str())
        );
        assert_eq!(attribute(input, METRICS_GROUP_SIZE), Some("1"));
    }
}

#[test]
fn test_duplicate_registration_is_rejected() {
    let result = register_builtin(DecoratorRegistry::<StatementExecuteUnit>::builder())
        .register(db_fanout::executor::group::decorators::MetricsGroupDecorator)
        .build();
    match result {
        Err(FanoutError::RegistryConfiguration(message)) => assert!(message.contains("metrics")),
        Err(other) => panic!("Expected registry error, got {:?}", other),
        Ok(_) => panic!("Expected registry error"),
    }
}

#[test]
fn test_missing_required_decorator_is_rejected() {
    let result = DecoratorRegistry::<RawExecuteUnit>::builder()
        .require(RuleKind::Shadow)
        .build();
    assert!(matches!(result, Err(FanoutError::RegistryConfiguration(_))));
}

#[test]
fn test_invalid_rule_properties_fail_resolution() {
    let registry = DecoratorRegistry::<StatementExecuteUnit>::builtin().unwrap();
    let rule_set = rules(vec![
        Rule::new("shadow", RuleKind::Shadow).with_prop("hint_pattern", "(unclosed"),
    ]);
    match registry.resolve(&rule_set) {
        Err(FanoutError::RegistryConfiguration(message)) => assert!(message.contains("shadow")),
        Err(other) => panic!("Expected registry error, got {:?}", other),
        Ok(_) => panic!("Expected registry error"),
    }
}
