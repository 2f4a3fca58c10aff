//! fanout - shows how a sharding proxy turns logic SQL into grouped,
//! per-connection execution units.

mod cli;

use std::sync::Arc;

use cli::{Cli, OutputFormat};
use db_fanout::config::{Config, DataSourceConfig, SharedProperties};
use db_fanout::error::{FanoutError, Result};
use db_fanout::executor::group::CachedBackendConnection;
use db_fanout::executor::{execute_groups, MockStatementExecutor};
use db_fanout::logging;
use db_fanout::proxy::{ExecutorWrapper, LogicSchema, StatementExecutorWrapper};
use db_fanout::report::{self, PlanReport};
use tracing::{error, info, warn};

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_args();

    match cli.log_path() {
        Some(path) => logging::init_file_logging(&path),
        None => logging::init_stderr_logging(),
    }

    if let Err(e) = run(&cli) {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let output_format = cli.parse_output_format().map_err(FanoutError::config)?;

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;

    if let Some(max) = cli.max_connections {
        config.props.max_connections_size_per_query = max;
    }
    if config.data_sources.is_empty() {
        warn!("No data sources configured, planning against a single 'default' data source");
        config
            .data_sources
            .push(DataSourceConfig::new("default", "postgres://localhost:5432/default"));
    }
    for ds in &config.data_sources {
        info!("Data source: {}", ds.display_string());
    }

    let schema = Arc::new(LogicSchema::from_config(&config)?);
    let props = SharedProperties::new(config.props.clone());
    let wrapper = StatementExecutorWrapper::new(schema, props);
    let mut backend = CachedBackendConnection::new();
    let parameters = cli.parameters();
    let option = cli.statement_option();
    let executor = MockStatementExecutor::new();

    let runtime = if cli.execute {
        Some(
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| FanoutError::internal(format!("Failed to start runtime: {e}")))?,
        )
    } else {
        None
    };

    let mut reports = Vec::with_capacity(cli.sql.len());
    for sql in &cli.sql {
        let context = wrapper.route_with_parameters(sql, &parameters)?;
        let kind = context.statement().kind();
        let groups = wrapper
            .get_execute_group_engine(&mut backend, option.clone())
            .generate(context.into_execution_units())?;

        let mut report = PlanReport::new(sql.as_str(), kind, &groups);
        if let Some(runtime) = &runtime {
            let results = runtime.block_on(execute_groups(&executor, groups))?;
            report = report.with_results(results);
        }
        reports.push(report);
    }
    info!(
        statements = reports.len(),
        connections = backend.total_connections(),
        "Planning complete"
    );

    match output_format {
        OutputFormat::Text => {
            for report in &reports {
                print!("{}", report.render_text());
            }
        }
        OutputFormat::Json => {
            let json = report::render_json(&reports)
                .map_err(|e| FanoutError::internal(format!("Failed to render JSON: {e}")))?;
            println!("{json}");
        }
    }

    backend.close();
    Ok(())
}
