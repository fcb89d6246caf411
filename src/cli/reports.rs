use anyhow::Result;

use report_dispatcher::config::Config;
use report_dispatcher::reports::ReportRegistry;

pub fn run(config: &Config) -> Result<()> {
    let registry = ReportRegistry::from_config(&config.reports)?;

    if registry.is_empty() {
        println!("No reports configured.");
        return Ok(());
    }

    for option in registry.list_available() {
        println!("{:<24} {}", option.key, option.label);
    }
    Ok(())
}
