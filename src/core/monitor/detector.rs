//! Per-metric anomaly state with hysteresis.
//!
//! `Unknown -> Stable -> Anomalous -> Stable`. A metric turns anomalous on the
//! first flagged sample and only returns to stable after `hysteresis_n`
//! consecutive unflagged samples, so a noisy value does not make it flap.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::history::HistoryView;
use super::snapshot::Metric;
use super::trend::is_anomalous;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendState {
    /// Not enough data yet to judge
    #[default]
    Unknown,
    Stable,
    Anomalous,
}

/// A state change produced by [`MetricTracker::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub metric: Metric,
    pub from: TrendState,
    pub to: TrendState,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, Default)]
pub struct MetricTracker {
    state: TrendState,
    calm_streak: usize,
}

impl MetricTracker {
    pub fn state(&self) -> TrendState {
        self.state
    }

    /// Feed the verdict for the newest sample. `None` means the sample could
    /// not be judged (too little data) and leaves the state unchanged.
    pub fn observe(&mut self, flag: Option<bool>, hysteresis_n: usize) -> Option<TrendState> {
        let flag = flag?;
        let before = self.state;

        self.state = match (self.state, flag) {
            (TrendState::Unknown | TrendState::Stable, true) => {
                self.calm_streak = 0;
                TrendState::Anomalous
            }
            (TrendState::Unknown | TrendState::Stable, false) => TrendState::Stable,
            (TrendState::Anomalous, true) => {
                self.calm_streak = 0;
                TrendState::Anomalous
            }
            (TrendState::Anomalous, false) => {
                self.calm_streak += 1;
                if self.calm_streak >= hysteresis_n.max(1) {
                    self.calm_streak = 0;
                    TrendState::Stable
                } else {
                    TrendState::Anomalous
                }
            }
        };

        (self.state != before).then_some(self.state)
    }
}

/// Trackers for every sampled metric, fed once per inserted sample.
#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    trackers: BTreeMap<Metric, MetricTracker>,
}

impl AnomalyDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Judge the newest value of each sampled metric in `window` and update
    /// the trackers. A metric to which the newest sample added no value is
    /// skipped, so a counter reset never counts as a calm sample.
    pub fn observe(
        &mut self,
        window: &HistoryView,
        k: f64,
        min_samples: usize,
        hysteresis_n: usize,
    ) -> Vec<StateTransition> {
        let Some(newest) = window.samples().last() else {
            return Vec::new();
        };
        let timestamp_ms = newest.timestamp_ms;

        let mut transitions = Vec::new();
        for metric in Metric::SAMPLED {
            if !contributes(metric, window) {
                continue;
            }

            let values = metric.series(window);
            let flag = (values.len() >= min_samples).then(|| is_anomalous(&values, k, min_samples));

            let tracker = self.trackers.entry(metric).or_default();
            let from = tracker.state();
            if let Some(to) = tracker.observe(flag, hysteresis_n) {
                transitions.push(StateTransition {
                    metric,
                    from,
                    to,
                    timestamp_ms,
                });
            }
        }

        transitions
    }

    pub fn state(&self, metric: Metric) -> TrendState {
        self.trackers
            .get(&metric)
            .map(MetricTracker::state)
            .unwrap_or_default()
    }

    pub fn states(&self) -> BTreeMap<Metric, TrendState> {
        Metric::SAMPLED
            .iter()
            .map(|&m| (m, self.state(m)))
            .collect()
    }

    pub fn reset(&mut self) {
        self.trackers.clear();
    }
}

/// Whether the newest sample in `window` added a value to `metric`'s series.
fn contributes(metric: Metric, window: &HistoryView) -> bool {
    let mut samples = window.samples().rev();
    let Some(newest) = samples.next() else {
        return false;
    };

    if metric.is_rate() {
        samples
            .next()
            .is_some_and(|previous| metric.rate_between(previous, newest).is_some())
    } else {
        metric.sample_value(newest).is_some()
    }
}
