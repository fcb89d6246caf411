use anyhow::Result;
use clap::Args;

use report_dispatcher::config::Config;
use report_dispatcher::reports::{DispatchJob, DispatchOutcome};

use super::serve::build_handler;

#[derive(Args)]
pub struct DispatchArgs {
    /// Report key, e.g. userActivity
    pub key: String,

    /// Slack response URL the result is posted to
    #[arg(long)]
    pub response_url: String,
}

pub async fn run(args: DispatchArgs, config: Config) -> Result<()> {
    let handler = build_handler(&config)?;

    let Some(descriptor) = handler.registry().resolve(&args.key) else {
        anyhow::bail!(
            "Unknown report '{}'. Run `report-dispatcher reports` to list them.",
            args.key
        );
    };

    let target = descriptor.target_in(&config.reports.files_dir());
    println!("Generating {} into {}", descriptor.display_name, target.path.display());

    let job = DispatchJob::new(descriptor, target, args.response_url);
    match handler.dispatcher().dispatch(job).await {
        DispatchOutcome::Delivered { url } => println!("Delivered: {}", url),
        DispatchOutcome::Empty => println!("No data; requester notified."),
        DispatchOutcome::Failed => anyhow::bail!("Dispatch failed; see logs"),
    }
    Ok(())
}
