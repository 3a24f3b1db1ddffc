use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use sysmon::core::monitor::{HistoryEntry, SharedHistory, Snapshot, SpeedTestResult, Window};

fn timestamps(history: &SharedHistory, window: Window) -> Vec<i64> {
    history
        .window(window)
        .iter()
        .map(HistoryEntry::timestamp_ms)
        .collect()
}

#[test]
fn test_capacity_five_keeps_last_five_of_seven() {
    let history = SharedHistory::with_capacity(5);
    for ts in 1..=7 {
        history.push(Snapshot::new(ts)).unwrap();
    }

    assert_eq!(timestamps(&history, Window::All), vec![3, 4, 5, 6, 7]);
}

#[test]
fn test_overflow_keeps_most_recent_in_order() {
    for capacity in [1usize, 2, 10, 64] {
        let history = SharedHistory::with_capacity(capacity);
        let pushed = capacity as i64 * 3 + 1;
        for ts in 1..=pushed {
            history.push(Snapshot::new(ts)).unwrap();
        }

        let expected: Vec<i64> = (pushed - capacity as i64 + 1..=pushed).collect();
        assert_eq!(timestamps(&history, Window::All), expected);
    }
}

#[test]
fn test_speed_tests_share_the_timeline() {
    let history = SharedHistory::with_capacity(10);
    history.push(Snapshot::new(1000)).unwrap();
    history
        .push(SpeedTestResult {
            timestamp_ms: 1500,
            download_bps: 8_000_000.0,
            upload_bps: None,
            latency_ms: 12.0,
            server_id: "local".to_string(),
            bytes_downloaded: 1_000_000,
            bytes_uploaded: 0,
        })
        .unwrap();
    history.push(Snapshot::new(2000)).unwrap();

    let view = history.window(Window::All);
    assert_eq!(view.samples().count(), 2);
    assert_eq!(view.speed_tests().count(), 1);
    assert_eq!(history.latest_speed_test().unwrap().server_id, "local");
}

#[test]
fn test_export_is_tagged_json() {
    let history = SharedHistory::with_capacity(4);
    history
        .push(Snapshot {
            cpu_percent: Some(12.5),
            ..Snapshot::new(1)
        })
        .unwrap();

    let json = history.window(Window::All).to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value[0]["kind"], "sample");
    assert_eq!(value[0]["data"]["cpu_percent"], 12.5);
}

#[test]
fn test_readers_never_see_partial_writes() {
    let history = SharedHistory::with_capacity(50);
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let history = history.clone();
        let done = done.clone();
        thread::spawn(move || {
            for ts in 1..=2000 {
                history.push(Snapshot::new(ts)).unwrap();
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let history = history.clone();
            let done = done.clone();
            thread::spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    let ts = timestamps(&history, Window::Last(20));
                    assert!(ts.len() <= 20);
                    // Contiguous and increasing: each view is one consistent state
                    assert!(ts.windows(2).all(|w| w[1] == w[0] + 1));
                    thread::sleep(Duration::from_micros(50));
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(history.len(), 50);
}
