use std::fs;
use sysmon::core::monitor::SpeedTestEndpoint;
use sysmon::{MonitorConfig, MonitorError};
use tempfile::TempDir;

#[test]
fn test_missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = MonitorConfig::load_from(&dir.path().join("config.json")).unwrap();
    assert_eq!(config, MonitorConfig::default());
}

#[test]
fn test_save_and_load_preserve_changes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let mut config = MonitorConfig::default();
    config.set_value("interval_ms", "250").unwrap();
    config.set_value("alerts.cpu_warning", "60").unwrap();
    config.endpoints = vec![SpeedTestEndpoint::new("lan", "http://192.168.1.10/blob")];
    config.save_to(&path).unwrap();

    let loaded = MonitorConfig::load_from(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.interval_ms, 250);
}

#[test]
fn test_partial_file_fills_in_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{ "anomaly_k": 3.0 }"#).unwrap();

    let config = MonitorConfig::load_from(&path).unwrap();
    assert_eq!(config.anomaly_k, 3.0);
    assert_eq!(config.history_capacity, MonitorConfig::default().history_capacity);
}

#[test]
fn test_corrupt_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, "{ not json").unwrap();

    assert_eq!(MonitorConfig::load_from(&path).unwrap(), MonitorConfig::default());
}

#[test]
fn test_invalid_values_in_file_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{ "interval_ms": 0 }"#).unwrap();

    assert!(matches!(
        MonitorConfig::load_from(&path),
        Err(MonitorError::ConfigInvalid(_))
    ));
}

#[test]
fn test_validation_rules() {
    let base = MonitorConfig::default;

    let cases = [
        MonitorConfig { history_capacity: 0, ..base() },
        MonitorConfig { anomaly_k: 0.0, ..base() },
        MonitorConfig { anomaly_k: f64::NAN, ..base() },
        MonitorConfig { hysteresis_n: 0, ..base() },
        MonitorConfig { min_samples: 1, ..base() },
        MonitorConfig { baseline_window: 3, ..base() },
        MonitorConfig {
            endpoints: vec![SpeedTestEndpoint::new("bad", "ftp://example.com")],
            ..base()
        },
    ];

    for config in cases {
        assert!(config.validate().is_err(), "{:?} should be invalid", config);
    }
}

#[test]
fn test_save_refuses_invalid_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    let config = MonitorConfig {
        interval_ms: 0,
        ..MonitorConfig::default()
    };

    assert!(config.save_to(&path).is_err());
    assert!(!path.exists());
}

#[test]
fn test_file_without_connections_capability_enables_it() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{"capabilities": {"cpu": true, "network": false}}"#).unwrap();

    let config = MonitorConfig::load_from(&path).unwrap();
    assert!(config.capabilities.cpu);
    assert!(!config.capabilities.network);
    assert!(config.capabilities.connections);
}
