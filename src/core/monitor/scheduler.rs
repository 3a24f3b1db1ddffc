//! Fixed-interval sampling loop.
//!
//! One tokio task owns the ticker. Each tick hands the blocking `sample()` call
//! to the blocking pool and waits for it up to the sample timeout. A sample
//! that overruns is abandoned: its result is dropped and every tick is skipped
//! until it returns, so there is never more than one sample in flight and no
//! backlog of ticks builds up.

use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::core::config::MonitorConfig;
use crate::error::{MonitorError, Result};

use super::snapshot::Snapshot;
use super::source::MetricsSource;

/// Receives every snapshot the scheduler takes.
pub trait SnapshotSink: Send + Sync + 'static {
    fn accept(&self, snapshot: Snapshot);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Running,
    Paused,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    /// The loop finished on its own within the timeout
    Graceful,
    /// The loop had to be aborted
    Forced,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub samples: u64,
    /// Ticks skipped because an abandoned sample was still running
    pub skipped_busy: u64,
    pub source_errors: u64,
    pub timeouts: u64,
}

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    samples: AtomicU64,
    skipped_busy: AtomicU64,
    source_errors: AtomicU64,
    timeouts: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            samples: self.samples.load(Ordering::Relaxed),
            skipped_busy: self.skipped_busy.load(Ordering::Relaxed),
            source_errors: self.source_errors.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Marks a sample as in flight for as long as it lives.
struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    fn new(flag: Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

type SharedSource = Arc<Mutex<Box<dyn MetricsSource>>>;

/// Handle to a running sampling loop.
pub struct Scheduler {
    control_tx: watch::Sender<SchedulerState>,
    counters: Arc<Counters>,
    in_flight: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Start sampling `source` into `sink`. Must be called from within a
    /// tokio runtime.
    pub fn spawn(
        source: impl MetricsSource + 'static,
        sink: Arc<dyn SnapshotSink>,
        config_rx: watch::Receiver<Arc<MonitorConfig>>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| MonitorError::runtime(format!("scheduler needs a tokio runtime: {}", e)))?;

        let (control_tx, control_rx) = watch::channel(SchedulerState::Running);
        let counters = Arc::new(Counters::default());
        let in_flight = Arc::new(AtomicBool::new(false));

        let source: Box<dyn MetricsSource> = Box::new(source);
        let worker = Worker::new(
            Arc::new(Mutex::new(source)),
            sink,
            config_rx,
            control_rx,
            counters.clone(),
            in_flight.clone(),
        );

        let handle = runtime.spawn(worker.run());

        Ok(Self {
            control_tx,
            counters,
            in_flight,
            handle: Some(handle),
        })
    }

    pub fn state(&self) -> SchedulerState {
        *self.control_tx.borrow()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.counters.snapshot()
    }

    /// True while a `sample()` call is executing, including an abandoned one.
    pub fn sample_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Stop taking samples until [`Scheduler::resume`]. No effect once stopped.
    pub fn pause(&self) {
        self.transition(SchedulerState::Running, SchedulerState::Paused);
    }

    pub fn resume(&self) {
        self.transition(SchedulerState::Paused, SchedulerState::Running);
    }

    fn transition(&self, from: SchedulerState, to: SchedulerState) {
        self.control_tx.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        });
    }

    /// Ask the loop to stop and wait up to `timeout` for it to wind down,
    /// including any abandoned sample still running. Aborts it afterwards.
    ///
    /// After [`StopOutcome::Graceful`] no `sample()` call is running. After
    /// [`StopOutcome::Forced`] a blocking `sample()` may still be finishing on
    /// its worker thread and [`Scheduler::sample_in_flight`] stays true until
    /// it returns; its result is dropped and never reaches the sink.
    pub async fn stop(&mut self, timeout: Duration) -> StopOutcome {
        self.control_tx.send_replace(SchedulerState::Stopped);

        let Some(mut handle) = self.handle.take() else {
            return StopOutcome::Graceful;
        };

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => StopOutcome::Graceful,
            Ok(Err(e)) => {
                error!("Sampling loop ended abnormally: {}", e);
                StopOutcome::Forced
            }
            Err(_) => {
                warn!(
                    "Sampling loop did not stop within {:?}, aborting",
                    timeout
                );
                handle.abort();
                StopOutcome::Forced
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.control_tx.send_replace(SchedulerState::Stopped);
    }
}

fn ticker(period: Duration, first_tick: Instant) -> Interval {
    let mut ticker = interval_at(first_tick, period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

struct Worker {
    source: SharedSource,
    sink: Arc<dyn SnapshotSink>,
    config_rx: watch::Receiver<Arc<MonitorConfig>>,
    control_rx: watch::Receiver<SchedulerState>,
    counters: Arc<Counters>,
    in_flight: Arc<AtomicBool>,
    config: Arc<MonitorConfig>,
    ticker: Interval,
    /// Sample that overran its timeout and is still running
    pending: Option<JoinHandle<Result<Snapshot>>>,
}

impl Worker {
    fn new(
        source: SharedSource,
        sink: Arc<dyn SnapshotSink>,
        mut config_rx: watch::Receiver<Arc<MonitorConfig>>,
        control_rx: watch::Receiver<SchedulerState>,
        counters: Arc<Counters>,
        in_flight: Arc<AtomicBool>,
    ) -> Self {
        let config = config_rx.borrow_and_update().clone();
        let ticker = ticker(config.interval(), Instant::now());
        Self {
            source,
            sink,
            config_rx,
            control_rx,
            counters,
            in_flight,
            config,
            ticker,
            pending: None,
        }
    }

    async fn run(mut self) {
        info!(
            "Sampling loop started: interval {:?}, sample timeout {:?}",
            self.config.interval(),
            self.config.sample_timeout()
        );

        loop {
            let state = *self.control_rx.borrow_and_update();
            match state {
                SchedulerState::Stopped => break,
                SchedulerState::Paused => {
                    debug!("Sampling loop paused");
                    if self.control_rx.changed().await.is_err() {
                        break;
                    }
                    if *self.control_rx.borrow() == SchedulerState::Running {
                        debug!("Sampling loop resumed");
                        self.ticker.reset_immediately();
                    }
                    continue;
                }
                SchedulerState::Running => {}
            }

            tokio::select! {
                _ = self.ticker.tick() => self.on_tick().await,
                changed = self.control_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        // Leave no sample behind: wait for an abandoned one before finishing
        if let Some(pending) = self.pending.take() {
            debug!("Waiting for abandoned sample before stopping");
            let _ = pending.await;
        }

        let stats = self.counters.snapshot();
        info!(
            "Sampling loop stopped after {} ticks ({} samples, {} busy skips, {} errors, {} timeouts)",
            stats.ticks, stats.samples, stats.skipped_busy, stats.source_errors, stats.timeouts
        );
    }

    fn apply_config_changes(&mut self) {
        if !self.config_rx.has_changed().unwrap_or(false) {
            return;
        }

        let config = self.config_rx.borrow_and_update().clone();
        if config.interval_ms != self.config.interval_ms {
            info!(
                "Sampling interval changed from {:?} to {:?}",
                self.config.interval(),
                config.interval()
            );
            self.ticker = ticker(config.interval(), Instant::now() + config.interval());
        }
        self.config = config;
    }

    fn is_running(&self) -> bool {
        *self.control_rx.borrow() == SchedulerState::Running
    }

    async fn on_tick(&mut self) {
        Counters::bump(&self.counters.ticks);
        self.apply_config_changes();

        if let Some(pending) = &self.pending {
            if !pending.is_finished() {
                Counters::bump(&self.counters.skipped_busy);
                debug!("Previous sample still running, skipping tick");
                return;
            }
            // Result of an abandoned sample is discarded
            self.pending = None;
        }

        if !self.is_running() {
            return;
        }

        let source = self.source.clone();
        let guard = InFlightGuard::new(self.in_flight.clone());
        let mut handle = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            source.lock().sample()
        });

        let timeout = self.config.sample_timeout();
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(Ok(snapshot))) => {
                if !self.is_running() {
                    trace!("Discarding sample taken while stopping");
                    return;
                }
                Counters::bump(&self.counters.samples);
                trace!("Sample taken at {}", snapshot.timestamp_ms);
                self.sink.accept(snapshot);
            }
            Ok(Ok(Err(e))) => {
                Counters::bump(&self.counters.source_errors);
                if e.is_transient() {
                    warn!("Skipping tick: {}", e);
                } else {
                    error!("Skipping tick: {}", e);
                }
            }
            Ok(Err(e)) => {
                Counters::bump(&self.counters.source_errors);
                error!("Sampling task failed: {}", e);
            }
            Err(_) => {
                Counters::bump(&self.counters.timeouts);
                warn!("Sample exceeded {:?}, abandoning it", timeout);
                self.pending = Some(handle);
            }
        }
    }
}
