use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use std::time::Duration;

use crate::core::monitor::probe_connectivity;
use crate::core::MonitorConfig;
use crate::ui::print_connectivity;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let hosts: Vec<String> = match matches.get_many::<String>("host") {
        Some(hosts) => hosts.cloned().collect(),
        None => {
            MonitorConfig::load()
                .context("Failed to load configuration")?
                .connectivity_hosts
        }
    };

    let timeout = Duration::from_millis(matches.get_one::<u64>("timeout").copied().unwrap_or(3000));
    let json_output = matches.get_flag("json");

    if hosts.is_empty() {
        println!("{}", "No hosts to check.".yellow());
        return Ok(());
    }

    if !json_output {
        println!("{}", "Testing network connectivity...".dimmed());
    }

    let runtime = super::build_runtime()?;
    let reports = runtime.block_on(probe_connectivity(&hosts, timeout));

    if json_output {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_connectivity(&reports);
    }

    Ok(())
}
