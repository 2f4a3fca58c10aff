//! Rule-driven decoration of input groups.
//!
//! Decorators are registered explicitly per rule kind in a
//! [`DecoratorRegistry`]. For a schema's rules the registry resolves a
//! [`DecorationChain`]: an ordered list of (rule, decorator) pairs sorted by
//! the rule kind's declared order. The chain is resolved once per rule set
//! and shared read-only by every statement.

use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::{ExecutableInput, InputGroup};
use crate::error::{FanoutError, Result};
use crate::rule::{Rule, RuleKind};

/// Transforms input groups on behalf of one rule.
///
/// Implementations must accept any collection of groups, including an empty
/// one, and pass through inputs they do not recognize unchanged.
pub trait ExecuteGroupDecorator<T>: Send + Sync {
    /// Name used in logs and configuration errors.
    fn name(&self) -> &'static str;

    /// The rule kind this decorator is bound to.
    fn rule_kind(&self) -> RuleKind;

    /// Checks a rule's properties before the decorator is bound to it.
    fn validate(&self, _rule: &Rule) -> Result<()> {
        Ok(())
    }

    /// Decorates the groups using the bound rule.
    fn decorate(&self, rule: &Rule, input_groups: Vec<InputGroup<T>>) -> Vec<InputGroup<T>>;
}

/// Builds a [`DecoratorRegistry`] from an explicit list of registrations.
pub struct DecoratorRegistryBuilder<T> {
    registrations: Vec<Arc<dyn ExecuteGroupDecorator<T>>>,
    required: Vec<RuleKind>,
}

impl<T: ExecutableInput + 'static> DecoratorRegistryBuilder<T> {
    fn new() -> Self {
        Self {
            registrations: Vec::new(),
            required: Vec::new(),
        }
    }

    /// Registers a decorator for its rule kind.
    pub fn register(mut self, decorator: impl ExecuteGroupDecorator<T> + 'static) -> Self {
        self.registrations.push(Arc::new(decorator));
        self
    }

    /// Declares that a rule kind must have exactly one decorator.
    pub fn require(mut self, kind: RuleKind) -> Self {
        if !self.required.contains(&kind) {
            self.required.push(kind);
        }
        self
    }

    /// Validates the registrations and builds the registry.
    pub fn build(self) -> Result<DecoratorRegistry<T>> {
        let mut bindings: Vec<(RuleKind, Arc<dyn ExecuteGroupDecorator<T>>)> = Vec::new();
        for decorator in self.registrations {
            let kind = decorator.rule_kind();
            if let Some((_, existing)) = bindings.iter().find(|(k, _)| *k == kind) {
                return Err(FanoutError::registry(format!(
                    "Ambiguous decorators for rule kind '{kind}': '{}' and '{}'",
                    existing.name(),
                    decorator.name()
                )));
            }
            bindings.push((kind, decorator));
        }

        for kind in &self.required {
            if !bindings.iter().any(|(k, _)| k == kind) {
                return Err(FanoutError::registry(format!(
                    "No decorator registered for rule kind '{kind}'"
                )));
            }
        }

        bindings.sort_by_key(|(kind, _)| kind.order());
        Ok(DecoratorRegistry { bindings })
    }
}

/// Rule-kind keyed lookup of decorators, ordered by rule kind priority.
pub struct DecoratorRegistry<T> {
    bindings: Vec<(RuleKind, Arc<dyn ExecuteGroupDecorator<T>>)>,
}

impl<T: ExecutableInput + 'static> DecoratorRegistry<T> {
    /// Starts an empty registry builder.
    pub fn builder() -> DecoratorRegistryBuilder<T> {
        DecoratorRegistryBuilder::new()
    }

    /// Registry holding the built-in decorators.
    pub fn builtin() -> Result<Self> {
        super::decorators::register_builtin(Self::builder()).build()
    }

    /// Returns the decorator bound to a rule kind.
    pub fn get(&self, kind: RuleKind) -> Option<&Arc<dyn ExecuteGroupDecorator<T>>> {
        self.bindings
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, decorator)| decorator)
    }

    /// Rule kinds with a decorator, in decoration order.
    pub fn kinds(&self) -> Vec<RuleKind> {
        self.bindings.iter().map(|(kind, _)| *kind).collect()
    }

    /// Resolves the decoration chain for a rule set.
    ///
    /// Rules without a decorator are left out. Rules of the same kind keep
    /// their relative order.
    pub fn resolve(&self, rules: &[Arc<Rule>]) -> Result<DecorationChain<T>> {
        let mut entries = Vec::new();
        for rule in rules {
            let Some(decorator) = self.get(rule.kind) else {
                continue;
            };
            decorator.validate(rule).map_err(|e| {
                FanoutError::registry(format!(
                    "Decorator '{}' rejected rule '{}': {e}",
                    decorator.name(),
                    rule.name
                ))
            })?;
            entries.push((Arc::clone(rule), Arc::clone(decorator)));
        }
        entries.sort_by_key(|(rule, _)| rule.kind.order());
        debug!(
            rules = rules.len(),
            decorators = entries.len(),
            "Resolved decoration chain"
        );
        Ok(DecorationChain { entries })
    }
}

/// Ordered (rule, decorator) pairs applied to every statement's groups.
pub struct DecorationChain<T> {
    entries: Vec<(Arc<Rule>, Arc<dyn ExecuteGroupDecorator<T>>)>,
}

impl<T> DecorationChain<T> {
    /// A chain without decorators.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of bound decorators.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no decorator is bound.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bound rules, in decoration order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.entries.iter().map(|(rule, _)| rule.as_ref())
    }

    /// Applies every decorator in order, feeding each one the previous output.
    pub fn decorate(&self, input_groups: Vec<InputGroup<T>>) -> Vec<InputGroup<T>> {
        self.entries
            .iter()
            .fold(input_groups, |groups, (rule, decorator)| {
                decorator.decorate(rule, groups)
            })
    }
}

impl<T> Default for DecorationChain<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> fmt::Debug for DecorationChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.entries
                    .iter()
                    .map(|(rule, decorator)| format!("{} -> {}", rule.name, decorator.name())),
            )
            .finish()
    }
}
