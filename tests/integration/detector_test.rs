use sysmon::core::monitor::{AnomalyDetector, HistoryBuffer, Metric, Snapshot, TrendState, Window};

const K: f64 = 2.0;
const MIN_SAMPLES: usize = 5;
const HYSTERESIS: usize = 3;

/// Push each CPU value and return the CPU state after it.
fn run(values: &[f32]) -> Vec<TrendState> {
    let mut history = HistoryBuffer::with_capacity(100);
    let mut detector = AnomalyDetector::new();

    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            history
                .push(
                    Snapshot {
                        cpu_percent: Some(v),
                        ..Snapshot::new(i as i64 * 1000)
                    }
                    .into(),
                )
                .unwrap();
            detector.observe(&history.window(Window::Last(60)), K, MIN_SAMPLES, HYSTERESIS);
            detector.state(Metric::CpuPercent)
        })
        .collect()
}

#[test]
fn test_spike_then_recovery_after_three_calm_samples() {
    let states = run(&[10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 90.0, 10.0, 10.0, 10.0]);

    use TrendState::*;
    assert_eq!(
        states,
        vec![
            Unknown, Unknown, Unknown, Unknown, Stable, Stable, Stable, Anomalous,
            // N - 1 calm samples are not enough
            Anomalous, Anomalous,
            // the N-th is
            Stable,
        ]
    );
}

#[test]
fn test_unknown_until_minimum_samples() {
    let states = run(&[10.0, 10.0, 10.0, 95.0]);
    assert!(states.iter().all(|s| *s == TrendState::Unknown));
}

#[test]
fn test_first_judgement_may_be_anomalous() {
    let states = run(&[10.0, 10.0, 10.0, 10.0, 95.0]);
    assert_eq!(states[4], TrendState::Anomalous);
}

#[test]
fn test_metrics_absent_from_samples_stay_unknown() {
    let mut history = HistoryBuffer::with_capacity(10);
    let mut detector = AnomalyDetector::new();
    for ts in 0..8 {
        history
            .push(
                Snapshot {
                    cpu_percent: Some(5.0),
                    ..Snapshot::new(ts)
                }
                .into(),
            )
            .unwrap();
        detector.observe(&history.window(Window::All), K, MIN_SAMPLES, HYSTERESIS);
    }

    let states = detector.states();
    assert_eq!(states[&Metric::CpuPercent], TrendState::Stable);
    assert_eq!(states[&Metric::DiskPercent], TrendState::Unknown);
}
