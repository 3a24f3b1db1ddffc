//! Statistics over history windows.
//!
//! For each metric the engine reports mean, population standard deviation,
//! extremes, the change against the preceding window and whether the newest
//! value is anomalous (`latest > mean + k * stddev` of the values before it).

use serde::{Deserialize, Serialize};

use crate::core::config::MonitorConfig;
use crate::error::{MonitorError, Result};

use super::history::HistoryView;
use super::snapshot::Metric;

/// Relative change below which a trend counts as flat.
const FLAT_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Rising,
    Falling,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub metric: Metric,
    /// Usable values in the window
    pub window: usize,
    pub mean: f64,
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
    pub latest: f64,
    /// `mean(current) - mean(previous)`; `None` without a usable previous window
    pub delta_vs_previous_window: Option<f64>,
    pub direction: TrendDirection,
    pub anomaly_flag: bool,
}

/// Mean and population standard deviation.
pub fn mean_stddev(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}

/// Whether the last value of `values` deviates from the ones before it.
///
/// Never flags with fewer than `min_samples` values: too little data is not
/// an anomaly.
pub fn is_anomalous(values: &[f64], k: f64, min_samples: usize) -> bool {
    let Some((&latest, baseline)) = values.split_last() else {
        return false;
    };
    if values.len() < min_samples.max(2) {
        return false;
    }

    match mean_stddev(baseline) {
        Some((mean, stddev)) => latest > mean + k * stddev,
        None => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendEngine {
    pub k: f64,
    pub min_samples: usize,
}

impl Default for TrendEngine {
    fn default() -> Self {
        Self {
            k: 2.0,
            min_samples: 5,
        }
    }
}

impl TrendEngine {
    pub fn new(k: f64, min_samples: usize) -> Self {
        Self { k, min_samples }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config.anomaly_k, config.min_samples)
    }

    /// Trend of one metric, or `None` when `current` has no usable value for it.
    pub fn analyze(
        &self,
        metric: Metric,
        current: &HistoryView,
        previous: &HistoryView,
    ) -> Option<TrendResult> {
        let values = metric.series(current);
        self.analyze_values(metric, &values, &metric.series(previous))
    }

    /// Trend computed from already extracted series.
    pub fn analyze_values(
        &self,
        metric: Metric,
        values: &[f64],
        previous: &[f64],
    ) -> Option<TrendResult> {
        let (mean, stddev) = mean_stddev(values)?;
        let latest = *values.last()?;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let previous_mean = mean_stddev(previous).map(|(m, _)| m);
        let delta = previous_mean.map(|prev| mean - prev);
        let direction = match previous_mean {
            Some(prev) => direction(mean, prev),
            None => TrendDirection::Flat,
        };

        Some(TrendResult {
            metric,
            window: values.len(),
            mean,
            stddev,
            min,
            max,
            latest,
            delta_vs_previous_window: delta,
            direction,
            anomaly_flag: is_anomalous(values, self.k, self.min_samples),
        })
    }

    /// Trends for several metrics. Metrics without data are left out; the call
    /// fails only when none of them has a usable value.
    pub fn analyze_all(
        &self,
        metrics: &[Metric],
        current: &HistoryView,
        previous: &HistoryView,
    ) -> Result<Vec<TrendResult>> {
        let results: Vec<TrendResult> = metrics
            .iter()
            .filter_map(|&metric| self.analyze(metric, current, previous))
            .collect();

        if results.is_empty() {
            let names: Vec<&str> = metrics.iter().map(Metric::name).collect();
            return Err(MonitorError::insufficient_data(format!(
                "no usable samples for {} in a window of {} entries",
                names.join(", "),
                current.len()
            )));
        }

        Ok(results)
    }
}

fn direction(mean: f64, previous_mean: f64) -> TrendDirection {
    let delta = mean - previous_mean;
    let scale = previous_mean.abs().max(f64::EPSILON);
    if (delta / scale).abs() <= FLAT_TOLERANCE {
        TrendDirection::Flat
    } else if delta > 0.0 {
        TrendDirection::Rising
    } else {
        TrendDirection::Falling
    }
}
