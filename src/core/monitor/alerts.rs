//! Alert system for monitoring critical conditions.
//!
//! Evaluates a snapshot against fixed percentage thresholds and generates alerts.
//! Statistical anomalies are handled separately by the detector.

use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};

use super::snapshot::Snapshot;

/// Alert configuration with thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub enabled: bool,
    pub cpu_warning: f32,     // Warning threshold (%)
    pub cpu_critical: f32,    // Critical threshold (%)
    pub memory_warning: f32,  // Warning threshold (%)
    pub memory_critical: f32, // Critical threshold (%)
    pub disk_warning: f32,    // Warning threshold (%)
    pub disk_critical: f32,   // Critical threshold (%)
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cpu_warning: 80.0,
            cpu_critical: 95.0,
            memory_warning: 85.0,
            memory_critical: 95.0,
            disk_warning: 90.0,
            disk_critical: 97.0,
        }
    }
}

impl AlertConfig {
    pub fn validate(&self) -> Result<()> {
        let pairs = [
            ("cpu", self.cpu_warning, self.cpu_critical),
            ("memory", self.memory_warning, self.memory_critical),
            ("disk", self.disk_warning, self.disk_critical),
        ];

        for (name, warning, critical) in pairs {
            let in_range = |v: f32| v > 0.0 && v <= 100.0;
            if !in_range(warning) || !in_range(critical) {
                return Err(MonitorError::config_invalid(format!(
                    "{} alert thresholds must be within (0, 100]",
                    name
                )));
            }
            if warning > critical {
                return Err(MonitorError::config_invalid(format!(
                    "{} warning threshold ({}) exceeds critical threshold ({})",
                    name, warning, critical
                )));
            }
        }
        Ok(())
    }
}

/// An individual alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub category: AlertCategory,
    pub message: String,
    pub value: f32,
    pub threshold: f32,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertSeverity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertCategory {
    Cpu,
    Memory,
    Disk,
}

impl AlertCategory {
    fn label(&self) -> &'static str {
        match self {
            AlertCategory::Cpu => "CPU usage",
            AlertCategory::Memory => "Memory usage",
            AlertCategory::Disk => "Disk usage",
        }
    }
}

fn check(
    alerts: &mut Vec<Alert>,
    category: AlertCategory,
    value: Option<f32>,
    warning: f32,
    critical: f32,
    timestamp_ms: i64,
) {
    let Some(value) = value else {
        return;
    };

    let (severity, threshold, kind) = if value >= critical {
        (AlertSeverity::Critical, critical, "critical")
    } else if value >= warning {
        (AlertSeverity::Warning, warning, "warning")
    } else {
        return;
    };

    alerts.push(Alert {
        severity,
        category,
        message: format!(
            "{} at {:.1}% ({} threshold: {:.1}%)",
            category.label(),
            value,
            kind,
            threshold
        ),
        value,
        threshold,
        timestamp_ms,
    });
}

/// Evaluate a snapshot and generate alerts. Absent fields never alert.
pub fn evaluate_alerts(snapshot: &Snapshot, config: &AlertConfig) -> Vec<Alert> {
    let mut alerts = Vec::new();
    if !config.enabled {
        return alerts;
    }

    let ts = snapshot.timestamp_ms;

    check(
        &mut alerts,
        AlertCategory::Cpu,
        snapshot.cpu_percent,
        config.cpu_warning,
        config.cpu_critical,
        ts,
    );

    check(
        &mut alerts,
        AlertCategory::Memory,
        snapshot.memory_percent().map(|v| v as f32),
        config.memory_warning,
        config.memory_critical,
        ts,
    );

    check(
        &mut alerts,
        AlertCategory::Disk,
        snapshot.disk_percent().map(|v| v as f32),
        config.disk_warning,
        config.disk_critical,
        ts,
    );

    alerts
}
