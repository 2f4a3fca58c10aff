//! Error types for db-fanout.
//!
//! Collaborator failures (parsing, routing, rewriting) travel as
//! [`StatementError`] and are surfaced unchanged through [`FanoutError`].

use thiserror::Error;

/// Errors raised by the parse, route and rewrite collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatementError {
    /// The SQL text could not be parsed.
    #[error("SQL parse error: {0}")]
    Parse(String),

    /// The router could not decide on target data sources.
    #[error("Route error: {0}")]
    Route(String),

    /// The rewriter could not produce physical SQL.
    #[error("Rewrite error: {0}")]
    Rewrite(String),
}

impl StatementError {
    /// Creates a parse error with the given message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Creates a route error with the given message.
    pub fn route(msg: impl Into<String>) -> Self {
        Self::Route(msg.into())
    }

    /// Creates a rewrite error with the given message.
    pub fn rewrite(msg: impl Into<String>) -> Self {
        Self::Rewrite(msg.into())
    }
}

/// Main error type for db-fanout operations.
#[derive(Error, Debug)]
pub enum FanoutError {
    /// Parse/route/rewrite failure, passed through untouched.
    #[error(transparent)]
    Statement(#[from] StatementError),

    /// A grouping strategy could not satisfy its resource bound.
    #[error("Grouping error on data source '{data_source}': {message}")]
    Grouping {
        data_source: String,
        message: String,
    },

    /// Best-effort route metrics failed. Never fatal to a statement.
    #[error("Metrics collection error: {0}")]
    MetricsCollection(String),

    /// Ambiguous or missing decorator bindings.
    #[error("Registry configuration error: {0}")]
    RegistryConfiguration(String),

    /// Configuration errors (invalid config file, bad property values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors reported by the execution layer.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FanoutError {
    /// Creates a grouping error bound to a data source.
    pub fn grouping(data_source: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Grouping {
            data_source: data_source.into(),
            message: msg.into(),
        }
    }

    /// Creates a metrics collection error with the given message.
    pub fn metrics(msg: impl Into<String>) -> Self {
        Self::MetricsCollection(msg.into())
    }

    /// Creates a registry configuration error with the given message.
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::RegistryConfiguration(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Statement(_) => "Statement Error",
            Self::Grouping { .. } => "Grouping Error",
            Self::MetricsCollection(_) => "Metrics Error",
            Self::RegistryConfiguration(_) => "Registry Error",
            Self::Config(_) => "Configuration Error",
            Self::Execution(_) => "Execution Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using FanoutError.
pub type Result<T> = std::result::Result<T, FanoutError>;
