//! Built-in input group decorators.
//!
//! Each decorator tags the inputs its rule recognizes and leaves every other
//! input untouched.

use regex::Regex;
use tracing::warn;

use super::decorator::{DecoratorRegistryBuilder, ExecuteGroupDecorator};
use super::{ExecutableInput, InputGroup};
use crate::error::{FanoutError, Result};
use crate::rule::{Rule, RuleKind};

pub const READWRITE_ROLE: &str = "readwrite.role";
pub const SHADOW: &str = "shadow";
pub const METRICS_RULE: &str = "metrics.rule";
pub const METRICS_GROUP_INDEX: &str = "metrics.group_index";
pub const METRICS_GROUP_SIZE: &str = "metrics.group_size";

/// Hint recognised in SQL comments when a shadow rule sets no pattern.
pub const DEFAULT_SHADOW_HINT: &str = r"/\*\s*shadow\s*:\s*true\s*\*/";

/// Adds the built-in decorators to a registry builder.
pub fn register_builtin<T: ExecutableInput + 'static>(
    builder: DecoratorRegistryBuilder<T>,
) -> DecoratorRegistryBuilder<T> {
    builder
        .register(ReadwriteSplittingGroupDecorator)
        .register(ShadowGroupDecorator)
        .register(MetricsGroupDecorator)
        .require(RuleKind::ReadwriteSplitting)
        .require(RuleKind::Shadow)
        .require(RuleKind::Metrics)
}

/// Tags inputs with the role of their data source in a read/write split.
#[derive(Debug, Default)]
pub struct ReadwriteSplittingGroupDecorator;

impl<T: ExecutableInput> ExecuteGroupDecorator<T> for ReadwriteSplittingGroupDecorator {
    fn name(&self) -> &'static str {
        "readwrite-splitting"
    }

    fn rule_kind(&self) -> RuleKind {
        RuleKind::ReadwriteSplitting
    }

    fn validate(&self, rule: &Rule) -> Result<()> {
        match rule.prop_str("primary_data_source") {
            Some(primary) if !primary.is_empty() => Ok(()),
            _ => Err(FanoutError::config("missing 'primary_data_source'")),
        }
    }

    fn decorate(&self, rule: &Rule, mut input_groups: Vec<InputGroup<T>>) -> Vec<InputGroup<T>> {
        let primary = rule.prop_str("primary_data_source").unwrap_or_default();
        let replicas = rule.prop_str_list("replica_data_sources");
        for group in &mut input_groups {
            for input in group.inputs_mut() {
                let role = if input.data_source_name() == primary {
                    "primary"
                } else if replicas.iter().any(|r| r == input.data_source_name()) {
                    "replica"
                } else {
                    continue;
                };
                input
                    .attributes_mut()
                    .insert(READWRITE_ROLE.to_string(), role.to_string());
            }
        }
        input_groups
    }
}

/// Marks inputs that must hit shadow storage.
///
/// An input is shadowed when its data source is listed in the rule's
/// `shadow_data_sources` or its SQL carries the shadow hint.
#[derive(Debug, Default)]
pub struct ShadowGroupDecorator;

impl ShadowGroupDecorator {
    fn hint_pattern(rule: &Rule) -> &str {
        rule.prop_str("hint_pattern").unwrap_or(DEFAULT_SHADOW_HINT)
    }

    fn hint(rule: &Rule) -> Option<Regex> {
        match Regex::new(Self::hint_pattern(rule)) {
            Ok(regex) => Some(regex),
            Err(e) => {
                warn!(rule = %rule.name, "Ignoring shadow hint: {e}");
                None
            }
        }
    }
}

impl<T: ExecutableInput> ExecuteGroupDecorator<T> for ShadowGroupDecorator {
    fn name(&self) -> &'static str {
        "shadow"
    }

    fn rule_kind(&self) -> RuleKind {
        RuleKind::Shadow
    }

    fn validate(&self, rule: &Rule) -> Result<()> {
        Regex::new(Self::hint_pattern(rule))
            .map(|_| ())
            .map_err(|e| FanoutError::config(format!("invalid 'hint_pattern': {e}")))
    }

    fn decorate(&self, rule: &Rule, mut input_groups: Vec<InputGroup<T>>) -> Vec<InputGroup<T>> {
        let shadow_data_sources = rule.prop_str_list("shadow_data_sources");
        let hint = Self::hint(rule);
        for group in &mut input_groups {
            for input in group.inputs_mut() {
                let by_data_source = shadow_data_sources
                    .iter()
                    .any(|ds| ds == input.data_source_name());
                let by_hint = hint
                    .as_ref()
                    .is_some_and(|h| h.is_match(input.execution_unit().sql_unit().sql()));
                if by_data_source || by_hint {
                    input
                        .attributes_mut()
                        .insert(SHADOW.to_string(), "true".to_string());
                }
            }
        }
        input_groups
    }
}

/// Records the group layout on every input for execution metrics.
#[derive(Debug, Default)]
pub struct MetricsGroupDecorator;

impl<T: ExecutableInput> ExecuteGroupDecorator<T> for MetricsGroupDecorator {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn rule_kind(&self) -> RuleKind {
        RuleKind::Metrics
    }

    fn decorate(&self, rule: &Rule, mut input_groups: Vec<InputGroup<T>>) -> Vec<InputGroup<T>> {
        for (index, group) in input_groups.iter_mut().enumerate() {
            let size = group.len().to_string();
            for input in group.inputs_mut() {
                let attributes = input.attributes_mut();
                attributes.insert(METRICS_RULE.to_string(), rule.name.clone());
                attributes.insert(METRICS_GROUP_INDEX.to_string(), index.to_string());
                attributes.insert(METRICS_GROUP_SIZE.to_string(), size.clone());
            }
        }
        input_groups
    }
}
