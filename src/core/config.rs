use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::monitor::{AlertConfig, Capabilities, SpeedTestEndpoint};
use crate::error::{MonitorError, Result};

/// Largest upload payload a speed test will allocate.
pub const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Monitor settings.
///
/// A value is immutable once handed to a session; changing settings at runtime
/// goes through `MonitorSession::reconfigure`, which swaps the whole value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sampling period
    pub interval_ms: u64,
    /// Maximum retained history entries
    pub history_capacity: usize,
    /// Standard deviation multiplier for anomaly detection
    pub anomaly_k: f64,
    /// Consecutive non-anomalous samples required to clear an anomaly
    pub hysteresis_n: usize,
    /// Samples required before an anomaly may be flagged
    pub min_samples: usize,
    /// Entries examined by the per-sample anomaly detector
    pub baseline_window: usize,
    /// Per-sample timeout; half the interval when unset
    pub sample_timeout_ms: Option<u64>,
    pub speedtest_timeout_ms: u64,
    /// TCP connects used for the latency median
    pub latency_samples: usize,
    /// Payload size for the upload phase
    pub upload_bytes: usize,
    pub endpoints: Vec<SpeedTestEndpoint>,
    /// `host:port` pairs checked by the connectivity probe
    pub connectivity_hosts: Vec<String>,
    pub alerts: AlertConfig,
    pub capabilities: Capabilities,
    pub top_processes: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            history_capacity: 300,
            anomaly_k: 2.0,
            hysteresis_n: 3,
            min_samples: 5,
            baseline_window: 60,
            sample_timeout_ms: None,
            speedtest_timeout_ms: 30_000,
            latency_samples: 3,
            upload_bytes: 1024 * 1024,
            endpoints: vec![
                SpeedTestEndpoint {
                    id: "cloudflare".to_string(),
                    download_url: "https://speed.cloudflare.com/__down?bytes=10000000".to_string(),
                    upload_url: Some("https://speed.cloudflare.com/__up".to_string()),
                },
                SpeedTestEndpoint {
                    id: "httpbin".to_string(),
                    download_url: "http://httpbin.org/bytes/1048576".to_string(),
                    upload_url: Some("http://httpbin.org/post".to_string()),
                },
            ],
            connectivity_hosts: vec![
                "google.com:80".to_string(),
                "cloudflare.com:80".to_string(),
                "github.com:80".to_string(),
                "stackoverflow.com:80".to_string(),
            ],
            alerts: AlertConfig::default(),
            capabilities: Capabilities::all(),
            top_processes: 10,
        }
    }
}

impl MonitorConfig {
    /// Check every option. Rejected configurations never reach a session.
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(MonitorError::config_invalid("interval_ms must be greater than 0"));
        }
        if self.history_capacity == 0 {
            return Err(MonitorError::config_invalid(
                "history_capacity must be greater than 0",
            ));
        }
        if !self.anomaly_k.is_finite() || self.anomaly_k <= 0.0 {
            return Err(MonitorError::config_invalid(format!(
                "anomaly_k must be a positive number, got {}",
                self.anomaly_k
            )));
        }
        if self.hysteresis_n == 0 {
            return Err(MonitorError::config_invalid("hysteresis_n must be at least 1"));
        }
        if self.min_samples < 2 {
            return Err(MonitorError::config_invalid("min_samples must be at least 2"));
        }
        if self.baseline_window < self.min_samples {
            return Err(MonitorError::config_invalid(format!(
                "baseline_window ({}) must not be smaller than min_samples ({})",
                self.baseline_window, self.min_samples
            )));
        }
        if let Some(timeout) = self.sample_timeout_ms {
            if timeout == 0 || timeout > self.interval_ms {
                return Err(MonitorError::config_invalid(format!(
                    "sample_timeout_ms must be within 1..={} ms",
                    self.interval_ms
                )));
            }
        }
        if self.speedtest_timeout_ms == 0 {
            return Err(MonitorError::config_invalid(
                "speedtest_timeout_ms must be greater than 0",
            ));
        }
        if self.latency_samples == 0 {
            return Err(MonitorError::config_invalid("latency_samples must be at least 1"));
        }
        if self.upload_bytes > MAX_UPLOAD_BYTES {
            return Err(MonitorError::config_invalid(format!(
                "upload_bytes must not exceed {} bytes",
                MAX_UPLOAD_BYTES
            )));
        }
        for endpoint in &self.endpoints {
            endpoint.validate()?;
        }
        self.alerts.validate()?;
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Bound on a single `sample()` call.
    pub fn sample_timeout(&self) -> Duration {
        match self.sample_timeout_ms {
            Some(ms) => Duration::from_millis(ms),
            None => Duration::from_millis((self.interval_ms / 2).max(1)),
        }
    }

    pub fn speedtest_timeout(&self) -> Duration {
        Duration::from_millis(self.speedtest_timeout_ms)
    }

    /// Load from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from `path`. A missing or empty file yields the defaults; a file
    /// that cannot be parsed is replaced by the defaults with a warning.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let data = fs::read(path)?;
        if data.is_empty() {
            return Ok(Self::default());
        }

        let config = match serde_json::from_slice::<MonitorConfig>(&data) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring unreadable config file {:?}: {}", path, e);
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_vec_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            MonitorError::config_invalid("Could not determine config directory")
        })?;

        Ok(config_dir.join("sysmon").join("config.json"))
    }

    /// Set a scalar option from its textual form, as typed on the command line.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
            value.trim().parse::<T>().map_err(|_| {
                MonitorError::config_invalid(format!("Invalid value '{}' for {}", value, key))
            })
        }

        let mut updated = self.clone();
        match key {
            "interval_ms" => updated.interval_ms = parse(key, value)?,
            "history_capacity" => updated.history_capacity = parse(key, value)?,
            "anomaly_k" => updated.anomaly_k = parse(key, value)?,
            "hysteresis_n" => updated.hysteresis_n = parse(key, value)?,
            "min_samples" => updated.min_samples = parse(key, value)?,
            "baseline_window" => updated.baseline_window = parse(key, value)?,
            "sample_timeout_ms" => {
                updated.sample_timeout_ms = match value.trim() {
                    "" | "auto" | "none" => None,
                    v => Some(parse(key, v)?),
                }
            }
            "speedtest_timeout_ms" => updated.speedtest_timeout_ms = parse(key, value)?,
            "latency_samples" => updated.latency_samples = parse(key, value)?,
            "upload_bytes" => updated.upload_bytes = parse(key, value)?,
            "top_processes" => updated.top_processes = parse(key, value)?,
            "alerts.cpu_warning" => updated.alerts.cpu_warning = parse(key, value)?,
            "alerts.cpu_critical" => updated.alerts.cpu_critical = parse(key, value)?,
            "alerts.memory_warning" => updated.alerts.memory_warning = parse(key, value)?,
            "alerts.memory_critical" => updated.alerts.memory_critical = parse(key, value)?,
            "alerts.disk_warning" => updated.alerts.disk_warning = parse(key, value)?,
            "alerts.disk_critical" => updated.alerts.disk_critical = parse(key, value)?,
            "alerts.enabled" => updated.alerts.enabled = parse(key, value)?,
            "capabilities.cpu" => updated.capabilities.cpu = parse(key, value)?,
            "capabilities.memory" => updated.capabilities.memory = parse(key, value)?,
            "capabilities.network" => updated.capabilities.network = parse(key, value)?,
            "capabilities.disk" => updated.capabilities.disk = parse(key, value)?,
            "capabilities.processes" => updated.capabilities.processes = parse(key, value)?,
            "capabilities.connections" => updated.capabilities.connections = parse(key, value)?,
            _ => {
                return Err(MonitorError::config_invalid(format!(
                    "Unknown configuration key '{}'",
                    key
                )))
            }
        }

        updated.validate()?;
        *self = updated;
        Ok(())
    }
}
