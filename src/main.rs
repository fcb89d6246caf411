use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use report_dispatcher::config::{Config, LogFormat, LoggingConfig};

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.as_ref().map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    init_logging(&config.logging, cli.verbose);

    match cli.command {
        Commands::Serve(args) => cli::serve::run(args, config).await,
        Commands::Reports => cli::reports::run(&config),
        Commands::Dispatch(args) => cli::dispatch::run(args, config).await,
        Commands::Config(args) => cli::config::run(args, &config, config_path.as_deref()),
    }
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let log_level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    match logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}
