use serde::{Deserialize, Serialize};
use std::time::Instant;
use sysinfo::{
    CpuRefreshKind, Disks, MemoryRefreshKind, Networks, ProcessRefreshKind, ProcessesToUpdate,
    RefreshKind, System,
};

use crate::error::{MonitorError, Result};

use super::snapshot::{ProcessStat, Snapshot};

/// Which parts of a [`Snapshot`] a source fills in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub cpu: bool,
    pub memory: bool,
    pub network: bool,
    pub disk: bool,
    pub processes: bool,
    /// Established TCP connection count
    pub connections: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            cpu: true,
            memory: true,
            network: true,
            disk: true,
            processes: true,
            connections: true,
        }
    }

    pub fn none() -> Self {
        Self {
            cpu: false,
            memory: false,
            network: false,
            disk: false,
            processes: false,
            connections: false,
        }
    }

    /// Capabilities present in both sets.
    pub fn intersect(&self, other: &Capabilities) -> Capabilities {
        Capabilities {
            cpu: self.cpu && other.cpu,
            memory: self.memory && other.memory,
            network: self.network && other.network,
            disk: self.disk && other.disk,
            processes: self.processes && other.processes,
            connections: self.connections && other.connections,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.cpu
            || self.memory
            || self.network
            || self.disk
            || self.processes
            || self.connections)
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::all()
    }
}

/// A pluggable provider of metrics snapshots.
///
/// Implementations may cover any subset of [`Capabilities`]; fields outside that
/// subset stay `None`. `sample` is called from a blocking worker thread and
/// should return well within the sampling interval.
pub trait MetricsSource: Send {
    /// Short identifier used in log messages
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Take one reading. Fails with [`MonitorError::SourceUnavailable`] when the
    /// underlying facility cannot be read at all.
    fn sample(&mut self) -> Result<Snapshot>;
}

impl<S: MetricsSource + ?Sized> MetricsSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }

    fn sample(&mut self) -> Result<Snapshot> {
        (**self).sample()
    }
}

/// Source backed by `sysinfo`, working on every platform it supports.
pub struct SysinfoSource {
    system: System,
    networks: Networks,
    disks: Disks,
    capabilities: Capabilities,
    top_processes: usize,
    last_cpu_refresh: Option<Instant>,
}

impl SysinfoSource {
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::all(), 10)
    }

    /// Only the facilities named in `capabilities` are enumerated, so a source
    /// with none enabled is cheap to build.
    pub fn with_capabilities(capabilities: Capabilities, top_processes: usize) -> Self {
        let mut refresh_kind = RefreshKind::nothing();
        if capabilities.cpu || capabilities.processes {
            refresh_kind = refresh_kind.with_cpu(CpuRefreshKind::nothing().with_cpu_usage());
        }
        if capabilities.memory {
            refresh_kind = refresh_kind.with_memory(MemoryRefreshKind::nothing().with_ram());
        }

        let mut system = System::new_with_specifics(refresh_kind);

        // CPU usage is a delta between two refreshes; prime the first one here
        let last_cpu_refresh = if capabilities.cpu || capabilities.processes {
            system.refresh_cpu_usage();
            Some(Instant::now())
        } else {
            None
        };

        Self {
            system,
            networks: if capabilities.network {
                Networks::new_with_refreshed_list()
            } else {
                Networks::new()
            },
            disks: if capabilities.disk {
                Disks::new_with_refreshed_list()
            } else {
                Disks::new()
            },
            capabilities,
            top_processes,
            last_cpu_refresh,
        }
    }

    fn sample_cpu(&mut self) -> Option<f32> {
        let primed_at = self.last_cpu_refresh?;
        if primed_at.elapsed() < sysinfo::MINIMUM_CPU_UPDATE_INTERVAL {
            return None;
        }

        self.system.refresh_cpu_usage();
        self.last_cpu_refresh = Some(Instant::now());

        let usage = self.system.global_cpu_usage();
        usage.is_finite().then_some(usage)
    }

    fn sample_memory(&mut self) -> (Option<u64>, Option<u64>) {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        if total == 0 {
            return (None, None);
        }
        (Some(self.system.used_memory()), Some(total))
    }

    fn sample_network(&mut self) -> (Option<u64>, Option<u64>) {
        self.networks.refresh(true);
        if self.networks.is_empty() {
            return (None, None);
        }

        let (rx, tx) = self
            .networks
            .values()
            .fold((0u64, 0u64), |(rx, tx), data| {
                (
                    rx.saturating_add(data.total_received()),
                    tx.saturating_add(data.total_transmitted()),
                )
            });

        (Some(rx), Some(tx))
    }

    fn sample_disk(&mut self) -> (Option<u64>, Option<u64>) {
        self.disks.refresh(true);

        let (total, available) = self.disks.iter().fold((0u64, 0u64), |(t, a), disk| {
            (
                t.saturating_add(disk.total_space()),
                a.saturating_add(disk.available_space()),
            )
        });

        if total == 0 {
            return (None, None);
        }
        (Some(total.saturating_sub(available)), Some(total))
    }

    fn sample_processes(&mut self) -> Option<Vec<ProcessStat>> {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        );

        let mut processes: Vec<ProcessStat> = self
            .system
            .processes()
            .values()
            .map(|proc| ProcessStat {
                pid: proc.pid().as_u32(),
                name: proc.name().to_string_lossy().to_string(),
                cpu_percent: proc.cpu_usage(),
                memory_bytes: proc.memory(),
            })
            .collect();

        if processes.is_empty() {
            return None;
        }

        // Sort by CPU usage descending
        processes.sort_by(|a, b| {
            b.cpu_percent
                .partial_cmp(&a.cpu_percent)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        processes.truncate(self.top_processes);

        Some(processes)
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSource for SysinfoSource {
    fn name(&self) -> &str {
        "sysinfo"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn sample(&mut self) -> Result<Snapshot> {
        if self.capabilities.is_empty() {
            return Err(MonitorError::source_unavailable(
                "sysinfo source has no capability enabled",
            ));
        }

        let mut snapshot = Snapshot::now();

        if self.capabilities.cpu {
            snapshot.cpu_percent = self.sample_cpu();
        }

        if self.capabilities.memory {
            (snapshot.memory_used, snapshot.memory_total) = self.sample_memory();
        }

        if self.capabilities.network {
            (snapshot.net_rx_bytes, snapshot.net_tx_bytes) = self.sample_network();
        }

        if self.capabilities.disk {
            (snapshot.disk_used, snapshot.disk_total) = self.sample_disk();
        }

        if self.capabilities.connections {
            snapshot.active_connections = read_established_connections();
        }

        if self.capabilities.processes {
            snapshot.processes = self.sample_processes();
        }

        // A missing field is fine; a reading with nothing in it is not
        if snapshot.is_empty() {
            return Err(MonitorError::source_unavailable(
                "no enabled metric could be read",
            ));
        }

        Ok(snapshot)
    }
}

/// `CurrEstab` from the `Tcp:` header and value lines of `/proc/net/snmp`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_tcp_established(snmp: &str) -> Option<u64> {
    let mut tcp = snmp.lines().filter(|line| line.starts_with("Tcp:"));
    let header = tcp.next()?;
    let values = tcp.next()?;

    let column = header.split_whitespace().position(|name| name == "CurrEstab")?;
    values.split_whitespace().nth(column)?.parse().ok()
}

#[cfg(target_os = "linux")]
fn read_established_connections() -> Option<u64> {
    let snmp = std::fs::read_to_string("/proc/net/snmp").ok()?;
    parse_tcp_established(&snmp)
}

// No portable counter outside Linux; the field stays empty
#[cfg(not(target_os = "linux"))]
fn read_established_connections() -> Option<u64> {
    None
}
