//! Configuration management for db-fanout.
//!
//! Handles loading the schema configuration (properties, data sources and
//! rules) from TOML files, and holds the process-wide properties snapshot.

use crate::error::{FanoutError, Result};
use crate::rule::Rule;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use url::Url;

/// Main configuration structure for db-fanout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Logic schema name exposed by the proxy.
    #[serde(default = "default_schema_name")]
    pub schema_name: String,

    /// Runtime properties.
    #[serde(default)]
    pub props: ConfigurationProperties,

    /// Physical data sources, in declaration order.
    #[serde(default)]
    pub data_sources: Vec<DataSourceConfig>,

    /// Rules applied to the schema, in declaration order.
    #[serde(default)]
    pub rules: Vec<Rule>,
}

fn default_schema_name() -> String {
    "logic_db".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_name: default_schema_name(),
            props: ConfigurationProperties::default(),
            data_sources: Vec::new(),
            rules: Vec::new(),
        }
    }
}

/// Runtime properties read by the execution pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationProperties {
    /// Maximum physical connections a single logical query may hold per data source.
    #[serde(default = "default_max_connections")]
    pub max_connections_size_per_query: usize,

    /// Log the logic SQL and every execution unit.
    #[serde(default)]
    pub sql_show: bool,

    /// Run the route metrics collector.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,

    /// SQL dialect used by the parser: "generic", "postgres" or "mysql".
    ///
    /// "postgres" treats `?` as an operator, so JDBC-style `?` parameters
    /// need "generic" or "mysql".
    #[serde(default = "default_sql_dialect")]
    pub sql_dialect: String,
}

fn default_max_connections() -> usize {
    1
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_sql_dialect() -> String {
    "generic".to_string()
}

impl Default for ConfigurationProperties {
    fn default() -> Self {
        Self {
            max_connections_size_per_query: default_max_connections(),
            sql_show: false,
            metrics_enabled: default_metrics_enabled(),
            sql_dialect: default_sql_dialect(),
        }
    }
}

impl ConfigurationProperties {
    /// Validates property values.
    pub fn validate(&self) -> Result<()> {
        if self.max_connections_size_per_query == 0 {
            return Err(FanoutError::config(
                "max_connections_size_per_query must be at least 1",
            ));
        }
        if !matches!(
            self.sql_dialect.to_lowercase().as_str(),
            "postgres" | "postgresql" | "mysql" | "generic"
        ) {
            return Err(FanoutError::config(format!(
                "Unknown sql_dialect '{}'. Expected generic, postgres or mysql",
                self.sql_dialect
            )));
        }
        Ok(())
    }
}

/// A physical data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceConfig {
    /// Data source name, referenced by routing and rules.
    pub name: String,

    /// Connection URL (e.g. `postgres://host:5432/db`).
    pub url: String,
}

impl DataSourceConfig {
    /// Creates a data source config.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Returns a display-safe string (no credentials).
    pub fn display_string(&self) -> String {
        match Url::parse(&self.url) {
            Ok(url) => {
                let host = url.host_str().unwrap_or("localhost");
                let database = url.path().trim_start_matches('/');
                match url.port() {
                    Some(port) => format!("{} -> {database} @ {host}:{port}", self.name),
                    None => format!("{} -> {database} @ {host}", self.name),
                }
            }
            Err(_) => self.name.clone(),
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("db-fanout")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| FanoutError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            FanoutError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Validates the whole configuration.
    pub fn validate(&self) -> Result<()> {
        self.props.validate()?;

        let mut names = HashSet::new();
        for ds in &self.data_sources {
            if ds.name.trim().is_empty() {
                return Err(FanoutError::config("Data source name must not be empty"));
            }
            if !names.insert(ds.name.as_str()) {
                return Err(FanoutError::config(format!(
                    "Duplicate data source '{}'",
                    ds.name
                )));
            }
            Url::parse(&ds.url).map_err(|e| {
                FanoutError::config(format!("Invalid URL for data source '{}': {e}", ds.name))
            })?;
        }

        let mut rule_names = HashSet::new();
        for rule in &self.rules {
            if !rule_names.insert(rule.name.as_str()) {
                return Err(FanoutError::config(format!("Duplicate rule '{}'", rule.name)));
            }
        }

        Ok(())
    }

    /// Returns the data source names in declaration order.
    pub fn data_source_names(&self) -> Vec<String> {
        self.data_sources.iter().map(|ds| ds.name.clone()).collect()
    }
}

/// Process-wide properties that can be refreshed while statements run.
///
/// Readers take an immutable snapshot; a refresh never changes a snapshot
/// already handed out.
#[derive(Debug, Clone, Default)]
pub struct SharedProperties {
    inner: Arc<RwLock<Arc<ConfigurationProperties>>>,
}

impl SharedProperties {
    /// Wraps the given properties.
    pub fn new(props: ConfigurationProperties) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(props))),
        }
    }

    /// Returns the current properties.
    pub fn snapshot(&self) -> Arc<ConfigurationProperties> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Replaces the properties after validating them.
    pub fn refresh(&self, props: ConfigurationProperties) -> Result<()> {
        props.validate()?;
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(props);
        Ok(())
    }
}
