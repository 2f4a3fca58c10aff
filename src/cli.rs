//! Command-line argument parsing for fanout.

use clap::Parser;
use db_fanout::executor::group::StatementOption;
use db_fanout::executor::Value;
use db_fanout::logging;
use std::path::PathBuf;

/// Output format for execution plans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable plan.
    #[default]
    Text,
    /// Pretty-printed JSON plan.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {s}. Expected: text or json")),
        }
    }
}

/// Shows how a sharding proxy groups SQL into per-connection execution units.
#[derive(Parser, Debug)]
#[command(name = "fanout")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Logic SQL statements to plan
    #[arg(value_name = "SQL", required = true)]
    pub sql: Vec<String>,

    /// Config file path
    #[arg(short = 'c', long, value_name = "PATH", env = "FANOUT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override max_connections_size_per_query
    #[arg(short = 'm', long, value_name = "N")]
    pub max_connections: Option<usize>,

    /// Bound parameter, repeatable (integers, floats, true/false, null, or text)
    #[arg(short = 'P', long = "param", value_name = "VALUE")]
    pub params: Vec<String>,

    /// Plan with prepared statement options
    #[arg(long)]
    pub prepared: bool,

    /// Return keys generated by inserts when executing
    #[arg(long)]
    pub return_generated_keys: bool,

    /// Execute the groups with the mock executor
    #[arg(long)]
    pub execute: bool,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    pub output: String,

    /// Write logs to a file instead of stderr (default location when no PATH is given)
    #[arg(long, value_name = "PATH", num_args = 0..=1, require_equals = true)]
    pub log_file: Option<Option<PathBuf>>,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(db_fanout::config::Config::default_path)
    }

    /// Parses the output format from the --output argument.
    pub fn parse_output_format(&self) -> std::result::Result<OutputFormat, String> {
        self.output.parse()
    }

    /// Returns the log file path, if file logging was requested.
    ///
    /// A bare --log-file resolves to the default log path.
    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_file
            .as_ref()
            .map(|path| path.clone().unwrap_or_else(logging::default_log_path))
    }

    /// Builds the statement options from --prepared and --return-generated-keys.
    pub fn statement_option(&self) -> StatementOption {
        let option = if self.prepared {
            StatementOption::prepared()
        } else {
            StatementOption::default()
        };
        if self.return_generated_keys {
            option.with_generated_keys()
        } else {
            option
        }
    }

    /// Converts the --param arguments into bound values.
    pub fn parameters(&self) -> Vec<Value> {
        self.params.iter().map(|p| parse_parameter(p)).collect()
    }
}

fn parse_parameter(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if let Ok(b) = raw.parse::<bool>() {
        return Value::Bool(b);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::Float(f);
    }
    Value::String(raw.to_string())
}
