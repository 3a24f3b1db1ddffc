use sysmon::core::monitor::{
    HistoryBuffer, Metric, Snapshot, TrendDirection, TrendEngine, Window,
};
use sysmon::MonitorError;

fn history(values: &[Option<f32>]) -> HistoryBuffer {
    let mut buffer = HistoryBuffer::with_capacity(100);
    for (i, value) in values.iter().enumerate() {
        buffer
            .push(
                Snapshot {
                    cpu_percent: *value,
                    ..Snapshot::new((i as i64 + 1) * 1000)
                }
                .into(),
            )
            .unwrap();
    }
    buffer
}

#[test]
fn test_window_without_usable_samples_is_insufficient() {
    let buffer = history(&[None, None, None]);
    let (current, previous) = buffer.window_pair(Window::All);

    let err = TrendEngine::default()
        .analyze_all(&Metric::ALL, &current, &previous)
        .unwrap_err();
    assert!(matches!(err, MonitorError::InsufficientData(_)));
}

#[test]
fn test_no_flag_one_sample_short_of_minimum() {
    let engine = TrendEngine::new(2.0, 5);

    // min_samples - 1 values: even a huge spike is not flagged
    let buffer = history(&[Some(10.0), Some(10.0), Some(10.0), Some(95.0)]);
    let (current, previous) = buffer.window_pair(Window::All);
    let trend = engine.analyze(Metric::CpuPercent, &current, &previous).unwrap();
    assert!(!trend.anomaly_flag);

    // One more sample makes the same spike count
    let buffer = history(&[Some(10.0), Some(10.0), Some(10.0), Some(10.0), Some(95.0)]);
    let (current, previous) = buffer.window_pair(Window::All);
    let trend = engine.analyze(Metric::CpuPercent, &current, &previous).unwrap();
    assert!(trend.anomaly_flag);
}

#[test]
fn test_gaps_do_not_count_toward_minimum() {
    let buffer = history(&[Some(10.0), None, Some(10.0), None, Some(10.0), Some(10.0), Some(95.0)]);
    let (current, previous) = buffer.window_pair(Window::All);

    let trend = TrendEngine::new(2.0, 6)
        .analyze(Metric::CpuPercent, &current, &previous)
        .unwrap();
    assert_eq!(trend.window, 5);
    assert!(!trend.anomaly_flag);
}

#[test]
fn test_falling_trend_against_previous_window() {
    let buffer = history(&[Some(80.0), Some(80.0), Some(40.0), Some(40.0)]);
    let (current, previous) = buffer.window_pair(Window::Last(2));

    let trend = TrendEngine::default()
        .analyze(Metric::CpuPercent, &current, &previous)
        .unwrap();
    assert_eq!(trend.delta_vs_previous_window, Some(-40.0));
    assert_eq!(trend.direction, TrendDirection::Falling);
}

#[test]
fn test_network_rates_from_counters() {
    let mut buffer = HistoryBuffer::with_capacity(10);
    for (i, rx) in [1_000u64, 3_000, 5_000, 100].iter().enumerate() {
        buffer
            .push(
                Snapshot {
                    net_rx_bytes: Some(*rx),
                    ..Snapshot::new(i as i64 * 1000)
                }
                .into(),
            )
            .unwrap();
    }
    let (current, previous) = buffer.window_pair(Window::All);

    // The counter reset between the last two samples yields no rate
    let trend = TrendEngine::default()
        .analyze(Metric::NetRxRate, &current, &previous)
        .unwrap();
    assert_eq!(trend.window, 2);
    assert_eq!(trend.mean, 2_000.0);
}
