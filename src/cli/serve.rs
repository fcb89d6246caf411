use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;
use tracing::info;

use report_dispatcher::config::Config;
use report_dispatcher::ingress::RequestHandler;
use report_dispatcher::reports::{Dispatcher, ReportRegistry};
use report_dispatcher::server::Server;
use report_dispatcher::slack::SlackClient;

#[derive(Args)]
pub struct ServeArgs {
    /// Override the configured port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Override the configured bind address
    #[arg(short, long)]
    pub bind: Option<String>,
}

pub async fn run(args: ServeArgs, mut config: Config) -> Result<()> {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    let handler = build_handler(&config)?;
    info!(
        "Serving {} report(s) from {}",
        handler.registry().len(),
        config.reports.files_dir().display()
    );
    if config.server.signing_secret.is_none() && config.server.verification_token.is_none() {
        tracing::warn!(
            "No signing secret or verification token configured; requests are not authenticated"
        );
    }

    Server::new(&config, handler).run().await
}

/// Registry, Slack client and dispatcher wired from config.
pub fn build_handler(config: &Config) -> Result<RequestHandler> {
    let registry = ReportRegistry::from_config(&config.reports)?;
    let slack = SlackClient::from_config(&config.slack).context("Slack client setup failed")?;
    let dispatcher = Dispatcher::from_config(Arc::new(slack), &config.reports);

    Ok(RequestHandler::new(
        Arc::new(registry),
        dispatcher,
        config.reports.files_dir(),
    ))
}
