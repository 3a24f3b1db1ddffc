//! Network speed test: TCP connect latency, then a timed download and an
//! optional upload against a configured endpoint.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::watch;
use url::Url;

use crate::core::config::{MonitorConfig, MAX_UPLOAD_BYTES};
use crate::error::{MonitorError, Result};

use super::snapshot::SpeedTestResult;

/// A server a speed test can run against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedTestEndpoint {
    pub id: String,
    pub download_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,
}

impl SpeedTestEndpoint {
    pub fn new(id: impl Into<String>, download_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            download_url: download_url.into(),
            upload_url: None,
        }
    }

    pub fn with_upload(mut self, upload_url: impl Into<String>) -> Self {
        self.upload_url = Some(upload_url.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.parse()
            .map(|_| ())
            .map_err(|e| MonitorError::config_invalid(format!("endpoint '{}': {}", self.id, e)))
    }

    /// `host:port` used for latency measurement.
    pub fn latency_target(&self) -> std::result::Result<String, SpeedTestError> {
        let (download, _) = self.parse()?;
        host_port(&download)
    }

    fn parse(&self) -> std::result::Result<(Url, Option<Url>), SpeedTestError> {
        if self.id.trim().is_empty() {
            return Err(SpeedTestError::InvalidEndpoint("empty id".to_string()));
        }
        let download = parse_http_url(&self.download_url)?;
        let upload = self.upload_url.as_deref().map(parse_http_url).transpose()?;
        Ok((download, upload))
    }
}

fn parse_http_url(raw: &str) -> std::result::Result<Url, SpeedTestError> {
    let url =
        Url::parse(raw).map_err(|e| SpeedTestError::InvalidEndpoint(format!("{}: {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(SpeedTestError::InvalidEndpoint(format!(
            "{}: unsupported scheme '{}'",
            raw,
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(SpeedTestError::InvalidEndpoint(format!("{}: missing host", raw)));
    }
    Ok(url)
}

fn host_port(url: &Url) -> std::result::Result<String, SpeedTestError> {
    let host = url
        .host_str()
        .ok_or_else(|| SpeedTestError::InvalidEndpoint(format!("{}: missing host", url)))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| SpeedTestError::InvalidEndpoint(format!("{}: unknown port", url)))?;
    Ok(format!("{}:{}", host, port))
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeedTestError {
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Server answered with HTTP {0}")]
    Http(u16),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Speed test timed out")]
    Timeout,

    #[error("Server returned an empty body")]
    EmptyBody,
}

impl From<reqwest::Error> for SpeedTestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SpeedTestError::Timeout
        } else if err.is_connect() {
            SpeedTestError::Connect(err.to_string())
        } else if let Some(status) = err.status() {
            SpeedTestError::Http(status.as_u16())
        } else {
            SpeedTestError::Transfer(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum SpeedTestOutcome {
    Completed(SpeedTestResult),
    Cancelled,
    Failed(SpeedTestError),
}

impl SpeedTestOutcome {
    pub fn result(&self) -> Option<&SpeedTestResult> {
        match self {
            SpeedTestOutcome::Completed(result) => Some(result),
            _ => None,
        }
    }
}

/// Cooperative cancellation shared between a caller and a running speed test.
///
/// Clones observe the same flag. Cancelling is permanent.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`CancelToken::cancel`] has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // Sender is owned by self, so this cannot close while we wait
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs speed tests. Holds a reusable HTTP client.
#[derive(Debug, Clone)]
pub struct SpeedTestProbe {
    client: reqwest::Client,
    latency_samples: usize,
    upload_bytes: usize,
}

impl SpeedTestProbe {
    pub fn new(latency_samples: usize, upload_bytes: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sysmon/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MonitorError::runtime(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, latency_samples, upload_bytes))
    }

    pub fn with_client(client: reqwest::Client, latency_samples: usize, upload_bytes: usize) -> Self {
        Self {
            client,
            latency_samples: latency_samples.max(1),
            upload_bytes: upload_bytes.min(MAX_UPLOAD_BYTES),
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Result<Self> {
        Self::new(config.latency_samples, config.upload_bytes)
    }

    /// Same client, settings taken from `config`.
    pub fn reconfigured(&self, config: &MonitorConfig) -> Self {
        Self::with_client(self.client.clone(), config.latency_samples, config.upload_bytes)
    }

    /// Run one speed test.
    ///
    /// The whole run is bounded by `timeout`. Cancellation is observed at every
    /// network await; a cancelled or failed run reports no partial numbers.
    pub async fn run(
        &self,
        endpoint: &SpeedTestEndpoint,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> SpeedTestOutcome {
        if cancel.is_cancelled() {
            return SpeedTestOutcome::Cancelled;
        }

        info!("Starting speed test against '{}'", endpoint.id);

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => SpeedTestOutcome::Cancelled,
            measured = tokio::time::timeout(timeout, self.measure(endpoint)) => match measured {
                Ok(Ok(result)) => SpeedTestOutcome::Completed(result),
                Ok(Err(err)) => SpeedTestOutcome::Failed(err),
                Err(_) => SpeedTestOutcome::Failed(SpeedTestError::Timeout),
            },
        };

        match &outcome {
            SpeedTestOutcome::Completed(result) => info!(
                "Speed test '{}' done: {:.2} Mbps down, {:.1} ms latency",
                endpoint.id,
                result.download_bps / 1_000_000.0,
                result.latency_ms
            ),
            SpeedTestOutcome::Cancelled => info!("Speed test '{}' cancelled", endpoint.id),
            SpeedTestOutcome::Failed(err) => info!("Speed test '{}' failed: {}", endpoint.id, err),
        }

        outcome
    }

    async fn measure(
        &self,
        endpoint: &SpeedTestEndpoint,
    ) -> std::result::Result<SpeedTestResult, SpeedTestError> {
        let (download_url, upload_url) = endpoint.parse()?;

        let target = host_port(&download_url)?;
        let latency_ms = self.measure_latency(&target).await?;

        let (bytes_downloaded, download_bps) = self.download(download_url).await?;

        let (bytes_uploaded, upload_bps) = match upload_url {
            Some(url) => {
                let (bytes, bps) = self.upload(url).await?;
                (bytes, Some(bps))
            }
            None => (0, None),
        };

        Ok(SpeedTestResult {
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            download_bps,
            upload_bps,
            latency_ms,
            server_id: endpoint.id.clone(),
            bytes_downloaded,
            bytes_uploaded,
        })
    }

    /// Median of several TCP connects. Individual failures are tolerated as
    /// long as one connect succeeds.
    async fn measure_latency(&self, target: &str) -> std::result::Result<f64, SpeedTestError> {
        let mut samples = Vec::with_capacity(self.latency_samples);
        let mut last_error = None;

        for _ in 0..self.latency_samples {
            match connect_time(target).await {
                Ok(ms) => samples.push(ms),
                Err(e) => {
                    debug!("Latency probe to {} failed: {}", target, e);
                    last_error = Some(e);
                }
            }
        }

        if samples.is_empty() {
            let reason = last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempt made".to_string());
            return Err(SpeedTestError::Connect(format!("{}: {}", target, reason)));
        }

        Ok(median(&mut samples))
    }

    async fn download(&self, url: Url) -> std::result::Result<(u64, f64), SpeedTestError> {
        let start = Instant::now();
        let mut response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpeedTestError::Http(status.as_u16()));
        }

        let mut bytes = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| SpeedTestError::Transfer(e.to_string()))?
        {
            bytes += chunk.len() as u64;
        }

        if bytes == 0 {
            return Err(SpeedTestError::EmptyBody);
        }

        Ok((bytes, bits_per_second(bytes, start.elapsed())))
    }

    async fn upload(&self, url: Url) -> std::result::Result<(u64, f64), SpeedTestError> {
        let payload = vec![0u8; self.upload_bytes];
        let bytes = payload.len() as u64;

        let start = Instant::now();
        let response = self.client.post(url).body(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpeedTestError::Http(status.as_u16()));
        }

        Ok((bytes, bits_per_second(bytes, start.elapsed())))
    }
}

async fn connect_time(target: &str) -> std::io::Result<f64> {
    let start = Instant::now();
    let stream = TcpStream::connect(target).await?;
    let elapsed = start.elapsed();
    drop(stream);
    Ok(elapsed.as_secs_f64() * 1000.0)
}

fn bits_per_second(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64().max(1e-6);
    bytes as f64 * 8.0 / secs
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Reachability of one host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityReport {
    pub host: String,
    pub latency_ms: Option<f64>,
    pub error: Option<String>,
}

impl ConnectivityReport {
    pub fn is_reachable(&self) -> bool {
        self.latency_ms.is_some()
    }
}

/// Measure TCP connect latency to each `host:port` concurrently.
///
/// Reports come back in the order of `hosts`.
pub async fn probe_connectivity(hosts: &[String], timeout: Duration) -> Vec<ConnectivityReport> {
    let handles: Vec<_> = hosts
        .iter()
        .cloned()
        .map(|host| {
            tokio::spawn(async move {
                let measured = tokio::time::timeout(timeout, connect_time(&host)).await;
                let (latency_ms, error) = match measured {
                    Ok(Ok(ms)) => (Some(ms), None),
                    Ok(Err(e)) => (None, Some(e.to_string())),
                    Err(_) => (None, Some("timed out".to_string())),
                };
                ConnectivityReport {
                    host,
                    latency_ms,
                    error,
                }
            })
        })
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    for (handle, host) in handles.into_iter().zip(hosts) {
        let report = handle.await.unwrap_or_else(|e| ConnectivityReport {
            host: host.clone(),
            latency_ms: None,
            error: Some(format!("probe task failed: {}", e)),
        });
        reports.push(report);
    }
    reports
}

/// The endpoint with the lowest connect latency, with that latency.
pub async fn select_fastest(
    endpoints: &[SpeedTestEndpoint],
    timeout: Duration,
) -> Option<(&SpeedTestEndpoint, f64)> {
    let candidates: Vec<(&SpeedTestEndpoint, String)> = endpoints
        .iter()
        .filter_map(|ep| ep.latency_target().ok().map(|target| (ep, target)))
        .collect();

    let targets: Vec<String> = candidates.iter().map(|(_, t)| t.clone()).collect();
    let reports = probe_connectivity(&targets, timeout).await;

    candidates
        .into_iter()
        .zip(reports)
        .filter_map(|((ep, _), report)| report.latency_ms.map(|ms| (ep, ms)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}
