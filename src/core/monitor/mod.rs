//! System and network monitoring core.
//!
//! A [`MetricsSource`] is sampled on a fixed interval by the [`Scheduler`], each
//! [`Snapshot`] lands in a bounded history, and the [`TrendEngine`] and
//! [`AnomalyDetector`] derive statistics and anomaly states from it. Speed tests
//! run on demand and are stored in the same history. [`MonitorSession`] ties
//! these together.

pub mod alerts;
mod detector;
mod history;
mod scheduler;
mod session;
mod snapshot;
mod source;
pub mod speedtest;
mod trend;

pub use alerts::{evaluate_alerts, Alert, AlertCategory, AlertConfig, AlertSeverity};
pub use detector::{AnomalyDetector, MetricTracker, StateTransition, TrendState};
pub use history::{HistoryBuffer, HistoryView, SharedHistory, Window};
pub use scheduler::{Scheduler, SchedulerState, SchedulerStats, SnapshotSink, StopOutcome};
pub use session::MonitorSession;
pub use snapshot::{HistoryEntry, Metric, ProcessStat, Snapshot, SpeedTestResult};
pub use source::{Capabilities, MetricsSource, SysinfoSource};
pub use speedtest::{
    probe_connectivity, select_fastest, CancelToken, ConnectivityReport, SpeedTestEndpoint,
    SpeedTestError, SpeedTestOutcome, SpeedTestProbe,
};
pub use trend::{is_anomalous, mean_stddev, TrendDirection, TrendEngine, TrendResult};
