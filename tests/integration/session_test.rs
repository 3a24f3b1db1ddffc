use std::time::Duration;
use sysmon::core::monitor::{
    CancelToken, Metric, MonitorSession, SchedulerState, SpeedTestEndpoint, StopOutcome,
    TrendState, Window,
};
use sysmon::{MonitorConfig, MonitorError};

use super::support::{direct_client, serve_bytes, wait_until, LaggingSource, ScriptedSource};

const SPIKE: [f32; 11] = [10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 90.0, 10.0, 10.0, 10.0];

fn fast_config() -> MonitorConfig {
    MonitorConfig {
        interval_ms: 5,
        ..MonitorConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cpu_spike_is_reported_and_recovers() {
    let mut session = MonitorSession::new(fast_config(), ScriptedSource::new(&SPIKE)).unwrap();
    session.start().unwrap();

    assert!(
        wait_until(Duration::from_secs(3), || session.history(Window::All).len() == SPIKE.len())
            .await
    );
    assert_eq!(session.stop(Duration::from_secs(1)).await, StopOutcome::Graceful);

    let cpu: Vec<(TrendState, i64)> = session
        .transitions()
        .into_iter()
        .filter(|t| t.metric == Metric::CpuPercent)
        .map(|t| (t.to, t.timestamp_ms))
        .collect();

    // Stable at the 5th sample, anomalous at the 90, stable again three samples later
    assert_eq!(
        cpu,
        vec![
            (TrendState::Stable, 5000),
            (TrendState::Anomalous, 8000),
            (TrendState::Stable, 11000),
        ]
    );
    assert_eq!(session.trend_states()[&Metric::CpuPercent], TrendState::Stable);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_trends_and_current_while_sampling() {
    let values = [20.0, 30.0, 40.0, 50.0];
    let mut session = MonitorSession::new(fast_config(), ScriptedSource::new(&values)).unwrap();

    assert!(matches!(
        session.trends(Metric::CpuPercent, Window::All),
        Err(MonitorError::InsufficientData(_))
    ));
    assert!(session.current().is_none());

    session.start().unwrap();
    assert!(wait_until(Duration::from_secs(3), || session.history(Window::All).len() == 4).await);

    let current = session.current().unwrap();
    assert_eq!(current.cpu_percent, Some(50.0));

    let trend = session.trends(Metric::CpuPercent, Window::Last(2)).unwrap();
    assert_eq!(trend.mean, 45.0);
    assert_eq!(trend.delta_vs_previous_window, Some(20.0));

    // Metrics the source never provides are left out, not errors
    let all = session.trends_for(&Metric::ALL, Window::All).unwrap();
    assert_eq!(all.len(), 1);

    session.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pause_resume_and_restart_rules() {
    let values = vec![1.0; 1000];
    let mut session = MonitorSession::new(fast_config(), ScriptedSource::new(&values)).unwrap();
    assert_eq!(session.state(), None);

    session.start().unwrap();
    // Starting twice is a no-op
    session.start().unwrap();
    assert_eq!(session.state(), Some(SchedulerState::Running));

    session.pause();
    assert_eq!(session.state(), Some(SchedulerState::Paused));
    session.resume();
    assert_eq!(session.state(), Some(SchedulerState::Running));

    session.stop(Duration::from_secs(1)).await;
    assert_eq!(session.state(), Some(SchedulerState::Stopped));
    assert!(!session.sample_in_flight());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reconfigure_shrinks_history() {
    let values: Vec<f32> = (0..20).map(|v| v as f32).collect();
    let mut session = MonitorSession::new(fast_config(), ScriptedSource::new(&values)).unwrap();
    session.start().unwrap();
    assert!(wait_until(Duration::from_secs(3), || session.history(Window::All).len() == 20).await);

    let smaller = MonitorConfig {
        history_capacity: 5,
        ..fast_config()
    };
    session.reconfigure(smaller).unwrap();

    let view = session.history(Window::All);
    assert_eq!(view.len(), 5);
    assert_eq!(view.samples().last().unwrap().cpu_percent, Some(19.0));
    assert_eq!(session.config().history_capacity, 5);

    let invalid = MonitorConfig {
        anomaly_k: -1.0,
        ..fast_config()
    };
    assert!(matches!(
        session.reconfigure(invalid),
        Err(MonitorError::ConfigInvalid(_))
    ));
    assert_eq!(session.config().anomaly_k, 2.0);

    session.stop(Duration::from_secs(1)).await;
}

#[test]
fn test_invalid_config_is_rejected_up_front() {
    let config = MonitorConfig {
        history_capacity: 0,
        ..MonitorConfig::default()
    };
    assert!(MonitorSession::new(config, ScriptedSource::new(&[])).is_err());
}

#[test]
fn test_start_needs_a_runtime() {
    let mut session = MonitorSession::new(fast_config(), ScriptedSource::new(&[1.0])).unwrap();
    assert!(matches!(session.start(), Err(MonitorError::Runtime(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_speed_test_during_slow_sample_keeps_the_sample() {
    let url = serve_bytes(&[7u8; 2048]).await;
    let config = MonitorConfig {
        interval_ms: 5000,
        ..MonitorConfig::default()
    };
    let source = LaggingSource {
        delay: Duration::from_millis(500),
    };
    let mut session = MonitorSession::new(config, source)
        .unwrap()
        .with_http_client(direct_client());
    session.start().unwrap();

    // The first sample is stamped, then stays in flight for a while
    assert!(wait_until(Duration::from_secs(2), || session.sample_in_flight()).await);
    let outcome = session
        .run_speed_test(
            &SpeedTestEndpoint::new("local", url),
            Duration::from_secs(5),
            &CancelToken::new(),
        )
        .await;
    let result = outcome.result().cloned().expect("speed test should complete");

    assert!(wait_until(Duration::from_secs(3), || session.current().is_some()).await);
    session.stop(Duration::from_secs(1)).await;

    let history = session.history(Window::All);
    assert_eq!(history.speed_tests().count(), 1);
    assert_eq!(history.samples().count(), 1);
    assert_eq!(session.stats().unwrap().samples, 1);

    let sample = session.current().unwrap();
    assert!(sample.timestamp_ms > result.timestamp_ms);
    assert_eq!(sample.cpu_percent, Some(5.0));
}
