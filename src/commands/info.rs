use anyhow::Result;
use clap::ArgMatches;
use serde::Serialize;

use crate::core::host::{collect_host_info, collect_interfaces, HostInfo, NetworkInterface};
use crate::ui::{print_host_info, print_interfaces};

#[derive(Serialize)]
struct InfoReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<HostInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    interfaces: Option<Vec<NetworkInterface>>,
}

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let mut show_system = matches.get_flag("system");
    let mut show_network = matches.get_flag("network");

    // If no flags are set, show everything
    if !show_system && !show_network {
        show_system = true;
        show_network = true;
    }

    let report = InfoReport {
        system: show_system.then(collect_host_info),
        interfaces: show_network.then(collect_interfaces),
    };

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if let Some(system) = &report.system {
        print_host_info(system);
    }
    if let Some(interfaces) = &report.interfaces {
        if report.system.is_some() {
            println!();
        }
        print_interfaces(interfaces);
    }

    Ok(())
}
