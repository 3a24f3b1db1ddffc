//! Monitor command handler.
//!
//! Runs a monitoring session and redraws a text dashboard (or prints JSON
//! lines) each time a new sample arrives.

use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use crate::core::monitor::{CancelToken, Metric, MonitorSession, Snapshot, StopOutcome, Window};
use crate::core::MonitorConfig;
use crate::ui::{render_dashboard, DashboardFrame};

const STOP_TIMEOUT: Duration = Duration::from_secs(2);

struct MonitorOptions {
    count: Option<u64>,
    window: usize,
    json: bool,
    export: Option<PathBuf>,
}

/// Execute the monitor command
pub fn execute(matches: &ArgMatches) -> Result<()> {
    let mut config = MonitorConfig::load().context("Failed to load configuration")?;

    if let Some(&interval) = matches.get_one::<u64>("interval") {
        config.interval_ms = interval;
        // An explicit timeout longer than the new interval would be rejected
        if config.sample_timeout_ms.is_some_and(|t| t > interval) {
            config.sample_timeout_ms = None;
        }
    }
    if let Some(&top) = matches.get_one::<usize>("top-processes") {
        config.top_processes = top;
        config.capabilities.processes = top > 0;
    }
    config.validate().context("Invalid monitor settings")?;

    let options = MonitorOptions {
        count: matches.get_one::<u64>("count").copied(),
        window: matches.get_one::<usize>("window").copied().unwrap_or(60).max(2),
        json: matches.get_flag("json"),
        export: matches.get_one::<String>("export").map(PathBuf::from),
    };

    let runtime = super::build_runtime()?;
    let cancel = super::ctrlc_token()?;

    runtime.block_on(run(config, options, cancel))
}

async fn run(config: MonitorConfig, options: MonitorOptions, cancel: CancelToken) -> Result<()> {
    let interval = config.interval();
    let mut session = MonitorSession::with_sysinfo(config)?;
    session.start()?;

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last_seen = None;
    let mut shown = 0u64;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(snapshot) = session.current() else {
            continue;
        };
        if last_seen == Some(snapshot.timestamp_ms) {
            continue;
        }
        last_seen = Some(snapshot.timestamp_ms);

        if options.json {
            println!("{}", serde_json::to_string(&*snapshot)?);
        } else {
            draw(&session, &snapshot, options.window)?;
        }

        shown += 1;
        if options.count.is_some_and(|n| shown >= n) {
            break;
        }
    }

    if session.stop(STOP_TIMEOUT).await == StopOutcome::Forced {
        eprintln!("{}", "Sampler did not stop in time and was aborted".yellow());
    }

    if let Some(path) = &options.export {
        let json = session.history(Window::All).to_json()?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write history to {}", path.display()))?;
        if !options.json {
            println!("{} {}", "✓ History exported to".green(), path.display());
        }
    }

    session.shutdown(STOP_TIMEOUT).await;
    Ok(())
}

fn draw(session: &MonitorSession, snapshot: &Snapshot, window: usize) -> Result<()> {
    let trends = session
        .trends_for(&Metric::SAMPLED, Window::Last(window))
        .unwrap_or_default();
    let states = session.trend_states();
    let alerts = session.alerts();
    let speed_test = session.latest_speed_test();

    let frame = DashboardFrame {
        snapshot,
        trends: &trends,
        states: &states,
        alerts: &alerts,
        speed_test: speed_test.as_deref(),
        stats: session.stats(),
    };

    let mut stdout = io::stdout().lock();
    // Clear screen and move the cursor home
    write!(stdout, "\x1B[2J\x1B[H{}", render_dashboard(&frame))?;
    stdout.flush()?;
    Ok(())
}
