// Speed test, connectivity and host information output

use colored::Colorize;

use crate::core::host::{HostInfo, NetworkInterface};
use crate::core::monitor::{ConnectivityReport, SpeedTestOutcome, SpeedTestResult};

use super::formatters::{format_bps, format_bytes, format_timestamp, format_uptime};

pub fn print_speed_test_result(result: &SpeedTestResult) {
    println!("{}", "Speed test results".cyan().bold());
    println!("  {:<10} {}", "Server:", result.server_id.white().bold());
    println!("  {:<10} {:.1} ms", "Latency:", result.latency_ms);
    println!(
        "  {:<10} {} ({} in total)",
        "Download:",
        format_bps(result.download_bps).green().bold(),
        format_bytes(result.bytes_downloaded)
    );
    match result.upload_bps {
        Some(bps) => println!(
            "  {:<10} {} ({} in total)",
            "Upload:",
            format_bps(bps).green().bold(),
            format_bytes(result.bytes_uploaded)
        ),
        None => println!("  {:<10} {}", "Upload:", "not measured".dimmed()),
    }
    println!("  {}", format_timestamp(result.timestamp_ms).dimmed());
}

pub fn print_speed_test_outcome(outcome: &SpeedTestOutcome) {
    match outcome {
        SpeedTestOutcome::Completed(result) => print_speed_test_result(result),
        SpeedTestOutcome::Cancelled => println!("{}", "Speed test cancelled".yellow()),
        SpeedTestOutcome::Failed(err) => {
            println!("{}", format!("✗ Speed test failed: {}", err).red())
        }
    }
}

pub fn print_connectivity(reports: &[ConnectivityReport]) {
    println!("{}", "Network connectivity".cyan().bold());
    for report in reports {
        match (report.latency_ms, &report.error) {
            (Some(ms), _) => println!("  {:<28} {}", report.host, format!("{:.1} ms", ms).green()),
            (None, Some(err)) => println!(
                "  {:<28} {} {}",
                report.host,
                "UNREACHABLE".red(),
                format!("({})", err).dimmed()
            ),
            (None, None) => println!("  {:<28} {}", report.host, "UNREACHABLE".red()),
        }
    }

    let reachable = reports.iter().filter(|r| r.is_reachable()).count();
    println!();
    println!(
        "{}",
        format!("{}/{} hosts reachable", reachable, reports.len()).dimmed()
    );
}

pub fn print_host_info(info: &HostInfo) {
    println!("{}", "System information".cyan().bold());
    if let Some(hostname) = &info.hostname {
        println!("  {:<14} {}", "Hostname:", hostname.white().bold());
    }
    println!("  {:<14} {} {}", "OS:", info.os_name, info.os_version);
    if let Some(kernel) = &info.kernel_version {
        println!("  {:<14} {}", "Kernel:", kernel);
    }
    println!("  {:<14} {}", "Architecture:", info.architecture);
    println!("  {:<14} {}", "Processor:", info.cpu_model);

    let cores = match info.physical_cores {
        Some(physical) => format!("{} physical, {} logical", physical, info.logical_cores),
        None => format!("{} logical", info.logical_cores),
    };
    println!("  {:<14} {}", "CPU cores:", cores);
    println!("  {:<14} {}", "Uptime:", format_uptime(info.uptime_secs));

    let boot_ms = i64::try_from(info.boot_time)
        .ok()
        .and_then(|secs| secs.checked_mul(1000));
    if let Some(boot_ms) = boot_ms {
        println!("  {:<14} {}", "Booted:", format_timestamp(boot_ms).dimmed());
    }
}

pub fn print_interfaces(interfaces: &[NetworkInterface]) {
    println!("{}", "Network interfaces".cyan().bold());
    if interfaces.is_empty() {
        println!("  {}", "No interfaces found".dimmed());
        return;
    }

    for iface in interfaces {
        let name = if iface.has_address() {
            iface.name.white().bold()
        } else {
            iface.name.dimmed()
        };
        println!("  {} {}", name, iface.mac_address.dimmed());

        for addr in &iface.ipv4 {
            println!("    {:<6} {}", "IPv4", addr.green());
        }
        for addr in &iface.ipv6 {
            println!("    {:<6} {}", "IPv6", addr);
        }
        println!(
            "    {}",
            format!(
                "rx {}  tx {}",
                format_bytes(iface.received_bytes),
                format_bytes(iface.transmitted_bytes)
            )
            .dimmed()
        );
    }
}
