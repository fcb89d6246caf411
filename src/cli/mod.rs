pub mod config;
pub mod dispatch;
pub mod reports;
pub mod serve;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "report-dispatcher")]
#[command(author, version, about = "Generate reports on request from Slack and deliver them back")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file
    #[arg(short, long, global = true, env = "REPORT_DISPATCHER_CONFIG")]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server Slack posts interactions to
    Serve(serve::ServeArgs),

    /// List registered reports
    Reports,

    /// Run one report in the foreground and post the result
    Dispatch(dispatch::DispatchArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}
