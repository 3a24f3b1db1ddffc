use anyhow::Result;
use log::LevelFilter;

use sysmon::cli::build_cli;
use sysmon::commands;

fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    let level = match matches.get_count("verbose") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    sysmon::init_logging(level);

    match matches.subcommand() {
        Some(("monitor", sub_matches)) => commands::monitor::execute(sub_matches)?,
        Some(("speedtest", sub_matches)) => commands::speedtest::execute(sub_matches)?,
        Some(("connectivity", sub_matches)) => commands::connectivity::execute(sub_matches)?,
        Some(("info", sub_matches)) => commands::info::execute(sub_matches)?,
        Some(("config", sub_matches)) => commands::config::execute(sub_matches)?,
        Some(("completions", sub_matches)) => {
            let mut cli = build_cli();
            commands::completions::execute(sub_matches, &mut cli)?;
        }
        _ => {
            println!("Welcome to sysmon!");
            println!("Use 'sysmon --help' for more information.");
        }
    }

    Ok(())
}
