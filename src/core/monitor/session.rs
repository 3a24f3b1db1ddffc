//! Process-wide monitoring session.
//!
//! Owns the history, the sampling loop and the live configuration, and answers
//! queries from the presentation layer while sampling continues.

use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use crate::core::config::MonitorConfig;
use crate::error::{MonitorError, Result};

use super::alerts::{evaluate_alerts, Alert};
use super::detector::{AnomalyDetector, StateTransition, TrendState};
use super::history::{HistoryView, SharedHistory, Window};
use super::scheduler::{Scheduler, SchedulerState, SchedulerStats, SnapshotSink, StopOutcome};
use super::snapshot::{Metric, Snapshot, SpeedTestResult};
use super::source::{MetricsSource, SysinfoSource};
use super::speedtest::{
    probe_connectivity, select_fastest, CancelToken, ConnectivityReport, SpeedTestEndpoint,
    SpeedTestError, SpeedTestOutcome, SpeedTestProbe,
};
use super::trend::{TrendEngine, TrendResult};

const MAX_TRANSITIONS: usize = 100;

/// Sink fed by the sampling loop: stores the sample, then updates alerts and
/// anomaly states from it.
struct Recorder {
    history: SharedHistory,
    config_rx: watch::Receiver<Arc<MonitorConfig>>,
    detector: Mutex<AnomalyDetector>,
    alerts: Mutex<Vec<Alert>>,
    transitions: Mutex<VecDeque<StateTransition>>,
}

impl Recorder {
    fn new(history: SharedHistory, config_rx: watch::Receiver<Arc<MonitorConfig>>) -> Self {
        Self {
            history,
            config_rx,
            detector: Mutex::new(AnomalyDetector::new()),
            alerts: Mutex::new(Vec::new()),
            transitions: Mutex::new(VecDeque::new()),
        }
    }

    fn record_transitions(&self, transitions: Vec<StateTransition>) {
        if transitions.is_empty() {
            return;
        }

        let mut log = self.transitions.lock();
        for t in transitions {
            match t.to {
                TrendState::Anomalous => warn!("{} became anomalous ({:?} -> {:?})", t.metric, t.from, t.to),
                _ => info!("{} is {:?} (was {:?})", t.metric, t.to, t.from),
            }
            if log.len() >= MAX_TRANSITIONS {
                log.pop_front();
            }
            log.push_back(t);
        }
    }
}

impl SnapshotSink for Recorder {
    fn accept(&self, snapshot: Snapshot) {
        let config = self.config_rx.borrow().clone();
        let mut alerts = evaluate_alerts(&snapshot, &config.alerts);

        // A speed test may have been stored while this sample was being taken
        let stored_at = self.history.append(snapshot);

        for alert in &mut alerts {
            alert.timestamp_ms = stored_at;
            debug!("Alert: {}", alert.message);
        }
        *self.alerts.lock() = alerts;

        let window = self.history.window(Window::Last(config.baseline_window));
        let transitions = self.detector.lock().observe(
            &window,
            config.anomaly_k,
            config.min_samples,
            config.hysteresis_n,
        );
        self.record_transitions(transitions);
    }
}

pub struct MonitorSession {
    config_tx: watch::Sender<Arc<MonitorConfig>>,
    history: SharedHistory,
    recorder: Arc<Recorder>,
    source: Option<Box<dyn MetricsSource>>,
    scheduler: Option<Scheduler>,
    probe: SpeedTestProbe,
}

impl MonitorSession {
    /// Create a session. Sampling does not begin until [`MonitorSession::start`].
    pub fn new(config: MonitorConfig, source: impl MetricsSource + 'static) -> Result<Self> {
        config.validate()?;

        let probe = SpeedTestProbe::from_config(&config)?;
        let history = SharedHistory::with_capacity(config.history_capacity);
        let (config_tx, config_rx) = watch::channel(Arc::new(config));
        let recorder = Arc::new(Recorder::new(history.clone(), config_rx));

        Ok(Self {
            config_tx,
            history,
            recorder,
            source: Some(Box::new(source)),
            scheduler: None,
            probe,
        })
    }

    /// Session sampling the local machine through `sysinfo`.
    pub fn with_sysinfo(config: MonitorConfig) -> Result<Self> {
        let source = SysinfoSource::with_capabilities(config.capabilities, config.top_processes);
        Self::new(config, source)
    }

    /// Replace the HTTP client used for speed tests.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        let config = self.config();
        self.probe = SpeedTestProbe::with_client(client, config.latency_samples, config.upload_bytes);
        self
    }

    pub fn config(&self) -> Arc<MonitorConfig> {
        self.config_tx.borrow().clone()
    }

    /// Start sampling. Needs a tokio runtime; a session samples only once, so
    /// starting again after [`MonitorSession::stop`] fails.
    pub fn start(&mut self) -> Result<()> {
        if self.scheduler.is_some() {
            return Ok(());
        }

        // Keep the source when there is no runtime to start on
        tokio::runtime::Handle::try_current()
            .map_err(|e| MonitorError::runtime(format!("session needs a tokio runtime: {}", e)))?;

        let source = self
            .source
            .take()
            .ok_or_else(|| MonitorError::runtime("session was already stopped"))?;

        info!("Starting monitor session with source '{}'", source.name());
        let scheduler = Scheduler::spawn(
            source,
            self.recorder.clone(),
            self.config_tx.subscribe(),
        )?;
        self.scheduler = Some(scheduler);
        Ok(())
    }

    pub fn pause(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.pause();
        }
    }

    pub fn resume(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.resume();
        }
    }

    /// `None` before the first [`MonitorSession::start`].
    pub fn state(&self) -> Option<SchedulerState> {
        self.scheduler.as_ref().map(Scheduler::state)
    }

    pub fn stats(&self) -> Option<SchedulerStats> {
        self.scheduler.as_ref().map(Scheduler::stats)
    }

    pub fn sample_in_flight(&self) -> bool {
        self.scheduler
            .as_ref()
            .is_some_and(Scheduler::sample_in_flight)
    }

    /// Stop sampling, waiting at most `timeout`. History is kept.
    pub async fn stop(&mut self, timeout: Duration) -> StopOutcome {
        match self.scheduler.as_mut() {
            Some(scheduler) => scheduler.stop(timeout).await,
            None => StopOutcome::Graceful,
        }
    }

    /// Swap in a new configuration. Takes effect at the next tick; a smaller
    /// history capacity evicts the oldest entries right away.
    pub fn reconfigure(&mut self, config: MonitorConfig) -> Result<()> {
        config.validate()?;

        if config.history_capacity != self.history.capacity() {
            info!(
                "History capacity changed from {} to {}",
                self.history.capacity(),
                config.history_capacity
            );
            self.history.resize(config.history_capacity);
        }

        self.probe = self.probe.reconfigured(&config);
        self.config_tx.send_replace(Arc::new(config));
        Ok(())
    }

    /// Stop sampling and discard history.
    pub async fn shutdown(mut self, timeout: Duration) -> StopOutcome {
        let outcome = self.stop(timeout).await;
        self.history.clear();
        info!("Monitor session shut down ({:?})", outcome);
        outcome
    }

    /// Most recent system sample.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.history.latest_sample()
    }

    pub fn latest_speed_test(&self) -> Option<Arc<SpeedTestResult>> {
        self.history.latest_speed_test()
    }

    pub fn history(&self, window: Window) -> HistoryView {
        self.history.window(window)
    }

    fn engine(&self) -> TrendEngine {
        TrendEngine::from_config(&self.config())
    }

    pub fn trends(&self, metric: Metric, window: Window) -> Result<TrendResult> {
        let (current, previous) = self.history.window_pair(window);
        self.engine()
            .analyze(metric, &current, &previous)
            .ok_or_else(|| {
                MonitorError::insufficient_data(format!(
                    "no usable samples for {} in a window of {} entries",
                    metric,
                    current.len()
                ))
            })
    }

    pub fn trends_for(&self, metrics: &[Metric], window: Window) -> Result<Vec<TrendResult>> {
        let (current, previous) = self.history.window_pair(window);
        self.engine().analyze_all(metrics, &current, &previous)
    }

    pub fn trend_states(&self) -> BTreeMap<Metric, TrendState> {
        self.recorder.detector.lock().states()
    }

    /// State changes seen so far, oldest first (bounded).
    pub fn transitions(&self) -> Vec<StateTransition> {
        self.recorder.transitions.lock().iter().copied().collect()
    }

    /// Threshold alerts raised by the most recent sample.
    pub fn alerts(&self) -> Vec<Alert> {
        self.recorder.alerts.lock().clone()
    }

    /// Run one speed test and store a completed result in history.
    pub async fn run_speed_test(
        &self,
        endpoint: &SpeedTestEndpoint,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> SpeedTestOutcome {
        let outcome = self.probe.run(endpoint, timeout, cancel).await;
        match outcome {
            SpeedTestOutcome::Completed(result) => {
                SpeedTestOutcome::Completed(self.record_speed_test(result))
            }
            other => other,
        }
    }

    /// Speed test against whichever of `endpoints` answers fastest. Endpoint
    /// selection counts against `timeout`.
    pub async fn run_best(
        &self,
        endpoints: &[SpeedTestEndpoint],
        timeout: Duration,
        cancel: &CancelToken,
    ) -> SpeedTestOutcome {
        if endpoints.is_empty() {
            return SpeedTestOutcome::Failed(SpeedTestError::InvalidEndpoint(
                "no endpoints configured".to_string(),
            ));
        }

        let started = Instant::now();
        let selected = tokio::select! {
            biased;
            _ = cancel.cancelled() => return SpeedTestOutcome::Cancelled,
            selected = select_fastest(endpoints, timeout) => selected,
        };

        let Some((endpoint, latency_ms)) = selected else {
            return SpeedTestOutcome::Failed(SpeedTestError::Connect(
                "no endpoint is reachable".to_string(),
            ));
        };
        info!("Selected endpoint '{}' ({:.1} ms)", endpoint.id, latency_ms);

        let remaining = timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return SpeedTestOutcome::Failed(SpeedTestError::Timeout);
        }
        self.run_speed_test(endpoint, remaining, cancel).await
    }

    /// Connect latency to each configured connectivity host.
    pub async fn connectivity(&self, timeout: Duration) -> Vec<ConnectivityReport> {
        probe_connectivity(&self.config().connectivity_hosts, timeout).await
    }

    /// Insert a speed test result. The returned copy carries the timestamp it
    /// was stored with.
    fn record_speed_test(&self, mut result: SpeedTestResult) -> SpeedTestResult {
        result.timestamp_ms = self.history.append(result.clone());
        result
    }
}
