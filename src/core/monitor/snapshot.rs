use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One timestamped reading of system and network counters.
///
/// Fields a source cannot provide are `None` rather than zero, so that
/// statistics can tell "absent" apart from "measured as 0".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp_ms: i64, // Unix time, milliseconds
    pub cpu_percent: Option<f32>,
    pub memory_used: Option<u64>,
    pub memory_total: Option<u64>,
    /// Cumulative bytes received over all interfaces
    pub net_rx_bytes: Option<u64>,
    /// Cumulative bytes transmitted over all interfaces
    pub net_tx_bytes: Option<u64>,
    pub disk_used: Option<u64>,
    pub disk_total: Option<u64>,
    /// Established TCP connections
    pub active_connections: Option<u64>,
    pub processes: Option<Vec<ProcessStat>>,
}

impl Snapshot {
    pub fn new(timestamp_ms: i64) -> Self {
        Self {
            timestamp_ms,
            ..Default::default()
        }
    }

    /// Snapshot stamped with the current wall clock time.
    pub fn now() -> Self {
        Self::new(chrono::Utc::now().timestamp_millis())
    }

    pub fn memory_percent(&self) -> Option<f64> {
        percent(self.memory_used?, self.memory_total?)
    }

    pub fn disk_percent(&self) -> Option<f64> {
        percent(self.disk_used?, self.disk_total?)
    }

    /// True when no metric field carries a value.
    pub fn is_empty(&self) -> bool {
        self.cpu_percent.is_none()
            && self.memory_used.is_none()
            && self.memory_total.is_none()
            && self.net_rx_bytes.is_none()
            && self.net_tx_bytes.is_none()
            && self.disk_used.is_none()
            && self.disk_total.is_none()
            && self.active_connections.is_none()
            && self.processes.is_none()
    }
}

fn percent(used: u64, total: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some(used as f64 / total as f64 * 100.0)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessStat {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub memory_bytes: u64,
}

/// Outcome of a successful speed test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedTestResult {
    pub timestamp_ms: i64,
    /// Bits per second
    pub download_bps: f64,
    /// Bits per second; `None` when the endpoint has no upload target
    pub upload_bps: Option<f64>,
    pub latency_ms: f64,
    pub server_id: String,
    pub bytes_downloaded: u64,
    pub bytes_uploaded: u64,
}

/// An item of history: a regular sample or a speed test result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum HistoryEntry {
    Sample(Arc<Snapshot>),
    SpeedTest(Arc<SpeedTestResult>),
}

impl HistoryEntry {
    pub fn timestamp_ms(&self) -> i64 {
        match self {
            HistoryEntry::Sample(s) => s.timestamp_ms,
            HistoryEntry::SpeedTest(r) => r.timestamp_ms,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            HistoryEntry::Sample(_) => "sample",
            HistoryEntry::SpeedTest(_) => "speed_test",
        }
    }

    /// Replace the timestamp, copying the payload if it is shared.
    pub fn restamp(&mut self, timestamp_ms: i64) {
        match self {
            HistoryEntry::Sample(s) => Arc::make_mut(s).timestamp_ms = timestamp_ms,
            HistoryEntry::SpeedTest(r) => Arc::make_mut(r).timestamp_ms = timestamp_ms,
        }
    }

    pub fn as_sample(&self) -> Option<&Arc<Snapshot>> {
        match self {
            HistoryEntry::Sample(s) => Some(s),
            HistoryEntry::SpeedTest(_) => None,
        }
    }

    pub fn as_speed_test(&self) -> Option<&Arc<SpeedTestResult>> {
        match self {
            HistoryEntry::SpeedTest(r) => Some(r),
            HistoryEntry::Sample(_) => None,
        }
    }
}

impl From<Snapshot> for HistoryEntry {
    fn from(snapshot: Snapshot) -> Self {
        HistoryEntry::Sample(Arc::new(snapshot))
    }
}

impl From<SpeedTestResult> for HistoryEntry {
    fn from(result: SpeedTestResult) -> Self {
        HistoryEntry::SpeedTest(Arc::new(result))
    }
}

/// A numeric series that can be read out of history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    CpuPercent,
    MemoryUsed,
    MemoryPercent,
    DiskPercent,
    /// Established TCP connections
    ActiveConnections,
    /// Received bytes per second, derived from consecutive samples
    NetRxRate,
    /// Transmitted bytes per second, derived from consecutive samples
    NetTxRate,
    DownloadBps,
    UploadBps,
    LatencyMs,
}

impl Metric {
    pub const ALL: [Metric; 10] = [
        Metric::CpuPercent,
        Metric::MemoryUsed,
        Metric::MemoryPercent,
        Metric::DiskPercent,
        Metric::ActiveConnections,
        Metric::NetRxRate,
        Metric::NetTxRate,
        Metric::DownloadBps,
        Metric::UploadBps,
        Metric::LatencyMs,
    ];

    /// Metrics fed by the sampling loop.
    pub const SAMPLED: [Metric; 7] = [
        Metric::CpuPercent,
        Metric::MemoryUsed,
        Metric::MemoryPercent,
        Metric::DiskPercent,
        Metric::ActiveConnections,
        Metric::NetRxRate,
        Metric::NetTxRate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::CpuPercent => "cpu_percent",
            Metric::MemoryUsed => "memory_used",
            Metric::MemoryPercent => "memory_percent",
            Metric::DiskPercent => "disk_percent",
            Metric::ActiveConnections => "active_connections",
            Metric::NetRxRate => "net_rx_rate",
            Metric::NetTxRate => "net_tx_rate",
            Metric::DownloadBps => "download_bps",
            Metric::UploadBps => "upload_bps",
            Metric::LatencyMs => "latency_ms",
        }
    }

    pub fn from_name(name: &str) -> Option<Metric> {
        Metric::ALL.iter().copied().find(|m| m.name() == name)
    }

    /// Counter metrics need two consecutive samples to produce a value.
    pub fn is_rate(&self) -> bool {
        matches!(self, Metric::NetRxRate | Metric::NetTxRate)
    }

    pub fn is_speed_test(&self) -> bool {
        matches!(
            self,
            Metric::DownloadBps | Metric::UploadBps | Metric::LatencyMs
        )
    }

    /// Value of a gauge metric in one sample. Rate and speed test metrics
    /// return `None`.
    pub fn sample_value(&self, snapshot: &Snapshot) -> Option<f64> {
        let value = match self {
            Metric::CpuPercent => snapshot.cpu_percent.map(f64::from),
            Metric::MemoryUsed => snapshot.memory_used.map(|v| v as f64),
            Metric::MemoryPercent => snapshot.memory_percent(),
            Metric::DiskPercent => snapshot.disk_percent(),
            Metric::ActiveConnections => snapshot.active_connections.map(|v| v as f64),
            _ => None,
        };
        value.filter(|v| v.is_finite())
    }

    /// Value carried directly by one entry. Rate metrics return `None` here;
    /// see [`Metric::series`].
    pub fn value(&self, entry: &HistoryEntry) -> Option<f64> {
        match entry {
            HistoryEntry::Sample(s) => self.sample_value(s),
            HistoryEntry::SpeedTest(r) => {
                let value = match self {
                    Metric::DownloadBps => Some(r.download_bps),
                    Metric::UploadBps => r.upload_bps,
                    Metric::LatencyMs => Some(r.latency_ms),
                    _ => None,
                };
                value.filter(|v| v.is_finite())
            }
        }
    }

    fn counter(&self, snapshot: &Snapshot) -> Option<u64> {
        match self {
            Metric::NetRxRate => snapshot.net_rx_bytes,
            Metric::NetTxRate => snapshot.net_tx_bytes,
            _ => None,
        }
    }

    /// Per-second increase of a rate metric's counter from `previous` to
    /// `current`. `None` when either sample lacks the counter, time did not
    /// move forward, or the counter went down (interface reset).
    pub fn rate_between(&self, previous: &Snapshot, current: &Snapshot) -> Option<f64> {
        let before = self.counter(previous)?;
        let after = self.counter(current)?;
        let elapsed_ms = current.timestamp_ms - previous.timestamp_ms;
        if elapsed_ms <= 0 || after < before {
            return None;
        }
        Some((after - before) as f64 * 1000.0 / elapsed_ms as f64)
    }

    /// Usable values of this metric over `entries`, oldest first.
    ///
    /// Entries without the value are skipped. For rate metrics each value comes
    /// from a pair of consecutive samples, see [`Metric::rate_between`].
    pub fn series<'a, I>(&self, entries: I) -> Vec<f64>
    where
        I: IntoIterator<Item = &'a HistoryEntry>,
    {
        if !self.is_rate() {
            return entries.into_iter().filter_map(|e| self.value(e)).collect();
        }

        let samples: Vec<&Snapshot> = entries
            .into_iter()
            .filter_map(HistoryEntry::as_sample)
            .map(|s| s.as_ref())
            .collect();

        samples
            .windows(2)
            .filter_map(|pair| self.rate_between(pair[0], pair[1]))
            .collect()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
