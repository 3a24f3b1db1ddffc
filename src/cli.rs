use clap::{value_parser, Arg, ArgAction, Command};
use clap_complete::Shell;

/// Command line definition, shared by `main` and shell completion generation.
pub fn build_cli() -> Command {
    Command::new("sysmon")
        .version(env!("CARGO_PKG_VERSION"))
        .about("System and network monitor with trend analysis and speed tests")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log verbosity (-v debug, -vv trace)")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand(
            Command::new("monitor")
                .about("Sample the system continuously and show trends and anomalies")
                .arg(
                    Arg::new("interval")
                        .short('i')
                        .long("interval")
                        .value_name("MS")
                        .help("Sampling interval in milliseconds (default: from config)")
                        .value_parser(value_parser!(u64).range(1..)),
                )
                .arg(
                    Arg::new("count")
                        .short('n')
                        .long("count")
                        .value_name("N")
                        .help("Stop after N samples instead of running until Ctrl+C")
                        .value_parser(value_parser!(u64).range(1..)),
                )
                .arg(
                    Arg::new("window")
                        .short('w')
                        .long("window")
                        .value_name("N")
                        .help("Number of recent entries trends are computed over")
                        .value_parser(value_parser!(usize))
                        .default_value("60"),
                )
                .arg(
                    Arg::new("top-processes")
                        .short('p')
                        .long("top-processes")
                        .value_name("N")
                        .help("Number of processes to list (0 hides the list)")
                        .value_parser(value_parser!(usize)),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print one JSON snapshot per line instead of the dashboard")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("export")
                        .short('e')
                        .long("export")
                        .value_name("FILE")
                        .help("Write the collected history as JSON when monitoring ends"),
                ),
        )
        .subcommand(
            Command::new("speedtest")
                .about("Measure latency and download/upload throughput")
                .arg(
                    Arg::new("endpoint")
                        .long("endpoint")
                        .value_name("ID")
                        .help("Configured endpoint to test against (default: fastest)")
                        .conflicts_with("url"),
                )
                .arg(
                    Arg::new("url")
                        .long("url")
                        .value_name("URL")
                        .help("Download URL to test against"),
                )
                .arg(
                    Arg::new("upload-url")
                        .long("upload-url")
                        .value_name("URL")
                        .help("Upload URL used together with --url")
                        .requires("url"),
                )
                .arg(
                    Arg::new("timeout")
                        .short('t')
                        .long("timeout")
                        .value_name("MS")
                        .help("Overall time limit in milliseconds (default: from config)")
                        .value_parser(value_parser!(u64).range(1..)),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the outcome as JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("connectivity")
                .about("Check TCP reachability and latency of well-known hosts")
                .arg(
                    Arg::new("host")
                        .long("host")
                        .value_name("HOST:PORT")
                        .help("Host to check; repeatable (default: from config)")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("timeout")
                        .short('t')
                        .long("timeout")
                        .value_name("MS")
                        .help("Per-host timeout in milliseconds")
                        .value_parser(value_parser!(u64).range(1..))
                        .default_value("3000"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the reports as JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("info")
                .about("Show operating system, processor and network interface details")
                .arg(
                    Arg::new("system")
                        .long("system")
                        .help("Show only operating system and processor details")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("network")
                        .long("network")
                        .help("Show only network interfaces")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the details as JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Show or change the persisted configuration")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(Command::new("show").about("Print the current configuration"))
                .subcommand(
                    Command::new("set")
                        .about("Set a configuration value")
                        .arg(
                            Arg::new("key")
                                .help("Option name, e.g. interval_ms or alerts.cpu_warning")
                                .required(true)
                                .index(1),
                        )
                        .arg(
                            Arg::new("value")
                                .help("New value")
                                .required(true)
                                .index(2),
                        ),
                )
                .subcommand(Command::new("reset").about("Restore the default configuration"))
                .subcommand(Command::new("path").about("Print the configuration file path")),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .help("Target shell")
                        .required(true)
                        .value_parser(value_parser!(Shell)),
                ),
        )
}
