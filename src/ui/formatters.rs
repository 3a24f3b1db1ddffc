use chrono::{DateTime, Local, TimeZone};
use colored::{ColoredString, Colorize};
use humansize::{format_size as human_format_size, BINARY, DECIMAL};

/// Format a byte count for memory and disk sizes (KiB, MiB, GiB)
pub fn format_size(size: u64) -> String {
    human_format_size(size, BINARY)
}

/// Format a transferred byte count (kB, MB, GB)
pub fn format_bytes(bytes: u64) -> String {
    human_format_size(bytes, DECIMAL)
}

/// Format a per-second byte rate
pub fn format_byte_rate(bytes_per_sec: f64) -> String {
    format!("{}/s", human_format_size(bytes_per_sec.max(0.0) as u64, DECIMAL))
}

/// Format a bit rate in Mbps (or kbps for slow links)
pub fn format_bps(bits_per_sec: f64) -> String {
    if bits_per_sec >= 1_000_000.0 {
        format!("{:.2} Mbps", bits_per_sec / 1_000_000.0)
    } else {
        format!("{:.1} kbps", bits_per_sec / 1_000.0)
    }
}

/// Format a Unix millisecond timestamp in local time (YYYY-MM-DD HH:MM:SS)
pub fn format_timestamp(timestamp_ms: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms).single() {
        Some(datetime) => format_time(datetime),
        None => timestamp_ms.to_string(),
    }
}

pub fn format_time(datetime: DateTime<Local>) -> String {
    datetime.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Format an uptime in seconds as `3d 04:05:06` (days omitted when zero)
pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if days > 0 {
        format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, secs)
    } else {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    }
}

/// Usage bar like `[████░░░░]`, colored by load
pub fn usage_bar(usage_percent: f64, width: usize) -> String {
    let clamped = usage_percent.clamp(0.0, 100.0);
    let filled = ((clamped / 100.0) * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);

    let bar = format!("{}{}", "█".repeat(filled), "░".repeat(empty));
    format!("[{}]", color_by_usage(&bar, clamped))
}

/// Red from 85%, yellow from 70%, green below
pub fn color_by_usage(text: &str, usage_percent: f64) -> ColoredString {
    if usage_percent >= 85.0 {
        text.red()
    } else if usage_percent >= 70.0 {
        text.yellow()
    } else {
        text.green()
    }
}
