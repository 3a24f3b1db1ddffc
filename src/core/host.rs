//! Facts about the machine that do not change while it is being monitored:
//! operating system, processor, uptime and network interfaces.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use sysinfo::{CpuRefreshKind, Networks, RefreshKind, System};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostInfo {
    pub hostname: Option<String>,
    pub os_name: String,
    pub os_version: String,
    pub kernel_version: Option<String>,
    pub architecture: String,
    pub cpu_model: String,
    pub physical_cores: Option<usize>,
    pub logical_cores: usize,
    pub uptime_secs: u64,
    /// Unix time, seconds
    pub boot_time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    pub mac_address: String,
    /// `address/prefix`
    pub ipv4: Vec<String>,
    pub ipv6: Vec<String>,
    pub received_bytes: u64,
    pub transmitted_bytes: u64,
}

impl NetworkInterface {
    pub fn has_address(&self) -> bool {
        !self.ipv4.is_empty() || !self.ipv6.is_empty()
    }
}

pub fn collect_host_info() -> HostInfo {
    let refresh = RefreshKind::nothing().with_cpu(CpuRefreshKind::everything());
    let sys = System::new_with_specifics(refresh);
    let cpus = sys.cpus();

    let cpu_model = cpus
        .first()
        .map(|cpu| cpu.brand().trim().to_string())
        .filter(|brand| !brand.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    HostInfo {
        hostname: System::host_name(),
        os_name: System::name().unwrap_or_else(|| "Unknown".to_string()),
        os_version: System::os_version().unwrap_or_else(|| "Unknown".to_string()),
        kernel_version: System::kernel_version(),
        architecture: std::env::consts::ARCH.to_string(),
        cpu_model,
        physical_cores: System::physical_core_count(),
        logical_cores: cpus.len(),
        uptime_secs: System::uptime(),
        boot_time: System::boot_time(),
    }
}

/// Every interface the OS reports, sorted by name.
pub fn collect_interfaces() -> Vec<NetworkInterface> {
    let networks = Networks::new_with_refreshed_list();

    let mut interfaces: Vec<NetworkInterface> = networks
        .iter()
        .map(|(name, data)| {
            let (ipv4, ipv6) = split_addresses(
                data.ip_networks()
                    .iter()
                    .map(|network| (network.addr, network.prefix)),
            );
            NetworkInterface {
                name: name.clone(),
                mac_address: data.mac_address().to_string(),
                ipv4,
                ipv6,
                received_bytes: data.total_received(),
                transmitted_bytes: data.total_transmitted(),
            }
        })
        .collect();

    interfaces.sort_by(|a, b| a.name.cmp(&b.name));
    interfaces
}

/// Sorted `address/prefix` strings, IPv4 first.
fn split_addresses(addresses: impl IntoIterator<Item = (IpAddr, u8)>) -> (Vec<String>, Vec<String>) {
    let mut ipv4 = Vec::new();
    let mut ipv6 = Vec::new();

    for (addr, prefix) in addresses {
        let formatted = format!("{}/{}", addr, prefix);
        match addr {
            IpAddr::V4(_) => ipv4.push(formatted),
            IpAddr::V6(_) => ipv6.push(formatted),
        }
    }

    ipv4.sort();
    ipv6.sort();
    (ipv4, ipv6)
}
