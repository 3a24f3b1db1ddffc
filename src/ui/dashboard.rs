//! Text dashboard for `sysmon monitor`.

use colored::Colorize;
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::core::monitor::{
    Alert, AlertSeverity, Metric, SchedulerStats, Snapshot, SpeedTestResult, TrendDirection,
    TrendResult, TrendState,
};

use super::formatters::{
    color_by_usage, format_bps, format_byte_rate, format_size, format_timestamp, usage_bar,
};

const BAR_WIDTH: usize = 30;

/// Everything one dashboard frame shows.
pub struct DashboardFrame<'a> {
    pub snapshot: &'a Snapshot,
    pub trends: &'a [TrendResult],
    pub states: &'a BTreeMap<Metric, TrendState>,
    pub alerts: &'a [Alert],
    pub speed_test: Option<&'a SpeedTestResult>,
    pub stats: Option<SchedulerStats>,
}

impl DashboardFrame<'_> {
    fn trend(&self, metric: Metric) -> Option<&TrendResult> {
        self.trends.iter().find(|t| t.metric == metric)
    }

    fn marker(&self, metric: Metric) -> String {
        let state = self.states.get(&metric).copied().unwrap_or_default();
        let arrow = match self.trend(metric).map(|t| t.direction) {
            Some(TrendDirection::Rising) => "↑",
            Some(TrendDirection::Falling) => "↓",
            _ => " ",
        };

        match state {
            TrendState::Anomalous => format!("{} {}", arrow, "ANOMALY".red().bold()),
            TrendState::Stable => format!("{} {}", arrow, "stable".dimmed()),
            TrendState::Unknown => format!("{} {}", arrow, "warming up".dimmed()),
        }
    }
}

/// Render a frame as text, ready to print after clearing the screen.
pub fn render_dashboard(frame: &DashboardFrame) -> String {
    let mut out = String::new();
    let s = frame.snapshot;

    let _ = writeln!(out, "{}", "System Monitor".cyan().bold());
    let _ = writeln!(out, "{}", format_timestamp(s.timestamp_ms).dimmed());
    let _ = writeln!(out);

    if let Some(cpu) = s.cpu_percent {
        let cpu = f64::from(cpu);
        let _ = writeln!(
            out,
            "{:<8} {} {:>6}  {}",
            "CPU".white().bold(),
            usage_bar(cpu, BAR_WIDTH),
            color_by_usage(&format!("{:.1}%", cpu), cpu),
            frame.marker(Metric::CpuPercent)
        );
    }

    if let (Some(pct), Some(used), Some(total)) =
        (s.memory_percent(), s.memory_used, s.memory_total)
    {
        let _ = writeln!(
            out,
            "{:<8} {} {:>6}  {}",
            "Memory".white().bold(),
            usage_bar(pct, BAR_WIDTH),
            color_by_usage(&format!("{:.1}%", pct), pct),
            frame.marker(Metric::MemoryPercent)
        );
        let _ = writeln!(
            out,
            "{:<8} {}",
            "",
            format!("{} / {}", format_size(used), format_size(total)).dimmed()
        );
    }

    if let (Some(pct), Some(used), Some(total)) = (s.disk_percent(), s.disk_used, s.disk_total) {
        let _ = writeln!(
            out,
            "{:<8} {} {:>6}  {}",
            "Disk".white().bold(),
            usage_bar(pct, BAR_WIDTH),
            color_by_usage(&format!("{:.1}%", pct), pct),
            frame.marker(Metric::DiskPercent)
        );
        let _ = writeln!(
            out,
            "{:<8} {}",
            "",
            format!("{} / {}", format_size(used), format_size(total)).dimmed()
        );
    }

    let rx = frame.trend(Metric::NetRxRate).map(|t| t.latest);
    let tx = frame.trend(Metric::NetTxRate).map(|t| t.latest);
    if rx.is_some() || tx.is_some() {
        let show = |rate: Option<f64>| rate.map(format_byte_rate).unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<8} ↓ {:<14} ↑ {:<14} {}",
            "Network".white().bold(),
            show(rx),
            show(tx),
            frame.marker(Metric::NetRxRate)
        );
    }

    if let Some(connections) = s.active_connections {
        let _ = writeln!(
            out,
            "{:<8} {} established  {}",
            "Conns".white().bold(),
            connections,
            frame.marker(Metric::ActiveConnections)
        );
    }

    if let Some(result) = frame.speed_test {
        let _ = writeln!(
            out,
            "{:<8} {} down, {} latency ({}, {})",
            "Speed".white().bold(),
            format_bps(result.download_bps).green(),
            format!("{:.1} ms", result.latency_ms).green(),
            result.server_id,
            format_timestamp(result.timestamp_ms).dimmed()
        );
    }

    if let Some(processes) = &s.processes {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{}",
            format!("{:<8} {:<28} {:>7} {:>12}", "PID", "NAME", "CPU%", "MEMORY").bold()
        );
        for p in processes {
            let name: String = p.name.chars().take(28).collect();
            let _ = writeln!(
                out,
                "{:<8} {:<28} {:>7.1} {:>12}",
                p.pid,
                name,
                p.cpu_percent,
                format_size(p.memory_bytes)
            );
        }
    }

    if !frame.alerts.is_empty() {
        let _ = writeln!(out);
        for alert in frame.alerts {
            let line = match alert.severity {
                AlertSeverity::Critical => format!("✗ {}", alert.message).red().bold(),
                AlertSeverity::Warning => format!("⚠ {}", alert.message).yellow(),
            };
            let _ = writeln!(out, "{}", line);
        }
    }

    if let Some(stats) = frame.stats {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{}",
            format!(
                "samples {}  skipped {}  errors {}  timeouts {}   Ctrl+C to quit",
                stats.samples, stats.skipped_busy, stats.source_errors, stats.timeouts
            )
            .dimmed()
        );
    }

    out
}
