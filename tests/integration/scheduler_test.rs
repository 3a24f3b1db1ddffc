use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysmon::core::monitor::{Scheduler, SchedulerState, Snapshot, SnapshotSink, StopOutcome};
use sysmon::MonitorConfig;
use tokio::sync::watch;

use super::support::{wait_until, ScriptedSource, SleepySource};

#[derive(Default)]
struct Collected(Mutex<Vec<Snapshot>>);

impl SnapshotSink for Collected {
    fn accept(&self, snapshot: Snapshot) {
        self.0.lock().push(snapshot);
    }
}

fn config(interval_ms: u64, sample_timeout_ms: Option<u64>) -> MonitorConfig {
    MonitorConfig {
        interval_ms,
        sample_timeout_ms,
        ..MonitorConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_returns_within_timeout_and_leaves_nothing_in_flight() {
    let sink = Arc::new(Collected::default());
    let (_config_tx, config_rx) = watch::channel(Arc::new(config(50, Some(50))));
    let source = SleepySource {
        delay: Duration::from_millis(30),
        taken: 0,
    };

    let mut scheduler = Scheduler::spawn(source, sink.clone(), config_rx).unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;

    let timeout = Duration::from_millis(500);
    let started = Instant::now();
    let outcome = scheduler.stop(timeout).await;

    assert!(started.elapsed() < timeout + Duration::from_millis(100));
    assert_eq!(outcome, StopOutcome::Graceful);
    assert!(!scheduler.sample_in_flight());
    assert_eq!(scheduler.state(), SchedulerState::Stopped);

    // Nothing arrives after stop
    let count = sink.0.lock().len();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sink.0.lock().len(), count);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_interval_change_applies_at_next_tick() {
    let sink = Arc::new(Collected::default());
    let (config_tx, config_rx) = watch::channel(Arc::new(config(1000, None)));
    let values = vec![1.0; 100];

    let mut scheduler = Scheduler::spawn(ScriptedSource::new(&values), sink.clone(), config_rx).unwrap();

    // First tick fires immediately, the next only after a second
    assert!(wait_until(Duration::from_millis(500), || sink.0.lock().len() == 1).await);

    config_tx.send_replace(Arc::new(config(10, None)));
    // The pending one-second tick applies the change; afterwards samples flow fast
    assert!(wait_until(Duration::from_secs(3), || sink.0.lock().len() >= 10).await);

    scheduler.stop(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_source_errors_are_skipped_ticks() {
    let sink = Arc::new(Collected::default());
    let (_config_tx, config_rx) = watch::channel(Arc::new(config(5, None)));

    let mut scheduler =
        Scheduler::spawn(ScriptedSource::new(&[1.0, 2.0]), sink.clone(), config_rx).unwrap();

    assert!(wait_until(Duration::from_secs(2), || scheduler.stats().source_errors >= 3).await);
    assert_eq!(scheduler.state(), SchedulerState::Running);
    assert_eq!(sink.0.lock().len(), 2);

    scheduler.stop(Duration::from_secs(1)).await;
}
