//! Rules attached to a logic schema.
//!
//! The grouping pipeline treats a rule as an opaque lookup key and ordering
//! anchor. Only the decorator bound to a rule reads its properties.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a configured rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Sharding,
    ReadwriteSplitting,
    Encrypt,
    Shadow,
    Metrics,
}

impl RuleKind {
    /// Declared priority of the rule kind. Lower values decorate first.
    pub fn order(&self) -> i32 {
        match self {
            Self::Sharding => 0,
            Self::ReadwriteSplitting => 10,
            Self::Encrypt => 20,
            Self::Shadow => 30,
            Self::Metrics => 40,
        }
    }

    /// Returns the kind as it appears in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sharding => "sharding",
            Self::ReadwriteSplitting => "readwrite_splitting",
            Self::Encrypt => "encrypt",
            Self::Shadow => "shadow",
            Self::Metrics => "metrics",
        }
    }

    /// Parses a kind from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "sharding" => Some(Self::Sharding),
            "readwrite_splitting" | "read_write_splitting" => Some(Self::ReadwriteSplitting),
            "encrypt" => Some(Self::Encrypt),
            "shadow" => Some(Self::Shadow),
            "metrics" => Some(Self::Metrics),
            _ => None,
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured rule instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique rule name within a schema.
    pub name: String,

    /// Rule kind, used to pick a decorator and its priority.
    pub kind: RuleKind,

    /// Rule-specific properties.
    #[serde(default)]
    pub props: toml::Table,
}

impl Rule {
    /// Creates a rule without properties.
    pub fn new(name: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            name: name.into(),
            kind,
            props: toml::Table::new(),
        }
    }

    /// Adds a property, builder style.
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// Returns a string property.
    pub fn prop_str(&self, key: &str) -> Option<&str> {
        self.props.get(key).and_then(|v| v.as_str())
    }

    /// Returns a list-of-strings property. Non-string entries are skipped.
    pub fn prop_str_list(&self, key: &str) -> Vec<String> {
        match self.props.get(key) {
            Some(toml::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            Some(toml::Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}
