use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::Path;

use report_dispatcher::config::Config;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration (secrets redacted)
    Show,

    /// Print the config file location
    Path,
}

pub fn run(args: ConfigArgs, config: &Config, explicit: Option<&Path>) -> Result<()> {
    match args.command {
        ConfigCommands::Show => {
            let mut shown = config.clone();
            redact(&mut shown.slack.bot_token);
            if let Some(secret) = shown.server.signing_secret.as_mut() {
                redact(secret);
            }
            if let Some(token) = shown.server.verification_token.as_mut() {
                redact(token);
            }
            print!("{}", toml::to_string_pretty(&shown)?);
        }
        ConfigCommands::Path => match explicit {
            Some(path) => println!("{}", path.display()),
            None => println!("{}", Config::config_path()?.display()),
        },
    }
    Ok(())
}

fn redact(value: &mut String) {
    if !value.is_empty() {
        *value = "********".to_string();
    }
}
