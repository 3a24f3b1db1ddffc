use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;

use crate::core::MonitorConfig;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("show", _)) => show(),
        Some(("set", sub_matches)) => set(sub_matches),
        Some(("reset", _)) => reset(),
        Some(("path", _)) => path(),
        _ => {
            println!("Use 'sysmon config --help' for more information.");
            Ok(())
        }
    }
}

fn show() -> Result<()> {
    let config = MonitorConfig::load().context("Failed to load configuration")?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn set(matches: &ArgMatches) -> Result<()> {
    let key = matches
        .get_one::<String>("key")
        .context("Key argument is required")?;
    let value = matches
        .get_one::<String>("value")
        .context("Value argument is required")?;

    let mut config = MonitorConfig::load().context("Failed to load configuration")?;
    config
        .set_value(key, value)
        .with_context(|| format!("Cannot set {}", key))?;
    config.save().context("Failed to save configuration")?;

    println!("{} {} = {}", "✓".green(), key.white().bold(), value.cyan());
    Ok(())
}

fn reset() -> Result<()> {
    MonitorConfig::default()
        .save()
        .context("Failed to save configuration")?;
    println!("{}", "✓ Configuration reset to defaults".green());
    Ok(())
}

fn path() -> Result<()> {
    let path = MonitorConfig::config_path()?;
    println!("{}", path.display().to_string().cyan().bold());
    Ok(())
}
