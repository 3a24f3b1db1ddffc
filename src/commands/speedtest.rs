//! Speed test command handler.

use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use std::time::Duration;

use crate::core::monitor::{
    Capabilities, MonitorSession, SpeedTestEndpoint, SpeedTestOutcome, SysinfoSource,
};
use crate::core::MonitorConfig;
use crate::ui::print_speed_test_outcome;

/// Which endpoint(s) the user asked for.
enum Target {
    Fastest(Vec<SpeedTestEndpoint>),
    Single(SpeedTestEndpoint),
}

fn resolve_target(matches: &ArgMatches, config: &MonitorConfig) -> Result<Target> {
    if let Some(url) = matches.get_one::<String>("url") {
        let mut endpoint = SpeedTestEndpoint::new("custom", url.clone());
        if let Some(upload) = matches.get_one::<String>("upload-url") {
            endpoint = endpoint.with_upload(upload.clone());
        }
        endpoint.validate()?;
        return Ok(Target::Single(endpoint));
    }

    if let Some(id) = matches.get_one::<String>("endpoint") {
        let endpoint = config
            .endpoints
            .iter()
            .find(|ep| &ep.id == id)
            .cloned()
            .with_context(|| {
                let known: Vec<&str> = config.endpoints.iter().map(|ep| ep.id.as_str()).collect();
                format!("Unknown endpoint '{}' (configured: {})", id, known.join(", "))
            })?;
        return Ok(Target::Single(endpoint));
    }

    Ok(Target::Fastest(config.endpoints.clone()))
}

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = MonitorConfig::load().context("Failed to load configuration")?;
    let target = resolve_target(matches, &config)?;

    let timeout = matches
        .get_one::<u64>("timeout")
        .map(|&ms| Duration::from_millis(ms))
        .unwrap_or_else(|| config.speedtest_timeout());
    let json_output = matches.get_flag("json");

    // Never started, so the source only has to exist
    let idle_source = SysinfoSource::with_capabilities(Capabilities::none(), 0);
    let session = MonitorSession::new(config, idle_source)?;
    let runtime = super::build_runtime()?;
    let cancel = super::ctrlc_token()?;

    if !json_output {
        println!("{}", "Running speed test...".cyan().bold());
        println!("{}", "Press Ctrl+C to cancel".dimmed());
        println!();
    }

    let outcome = runtime.block_on(async {
        match &target {
            Target::Single(endpoint) => session.run_speed_test(endpoint, timeout, &cancel).await,
            Target::Fastest(endpoints) => session.run_best(endpoints, timeout, &cancel).await,
        }
    });

    if json_output {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_speed_test_outcome(&outcome);
    }

    if let SpeedTestOutcome::Failed(err) = outcome {
        bail!("Speed test failed: {}", err);
    }
    Ok(())
}
