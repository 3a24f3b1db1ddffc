use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{MonitorError, Result};

use super::snapshot::{HistoryEntry, Snapshot, SpeedTestResult};

const DEFAULT_HISTORY_SIZE: usize = 300;

/// Selects a contiguous, newest-anchored part of history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    All,
    /// The newest `n` entries
    Last(usize),
    /// Entries no older than this, measured back from the newest entry
    Since(Duration),
}

/// Bounded, insertion-ordered history with ring semantics.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    capacity: usize,
    entries: VecDeque<HistoryEntry>,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn newest_timestamp(&self) -> Option<i64> {
        self.entries.back().map(HistoryEntry::timestamp_ms)
    }

    /// Append an entry, evicting the oldest one when full.
    ///
    /// Timestamps must be strictly increasing; an entry that is not newer than
    /// the newest retained one is rejected and the buffer is left untouched.
    pub fn push(&mut self, entry: HistoryEntry) -> Result<()> {
        let timestamp = entry.timestamp_ms();
        if let Some(newest) = self.newest_timestamp() {
            if timestamp <= newest {
                return Err(MonitorError::OutOfOrder { timestamp, newest });
            }
        }

        self.insert(entry);
        Ok(())
    }

    /// Append an entry, moving its timestamp to just after the newest one when
    /// it is not already later. Returns the timestamp the entry was stored with.
    ///
    /// Used by writers whose timestamps are taken before the entry is ready,
    /// such as a sample that was started before a speed test finished.
    pub fn append(&mut self, mut entry: HistoryEntry) -> i64 {
        if let Some(newest) = self.newest_timestamp() {
            if entry.timestamp_ms() <= newest {
                debug!(
                    "Restamping {} entry from {} to {}",
                    entry.kind(),
                    entry.timestamp_ms(),
                    newest + 1
                );
                entry.restamp(newest + 1);
            }
        }

        let timestamp = entry.timestamp_ms();
        self.insert(entry);
        timestamp
    }

    fn insert(&mut self, entry: HistoryEntry) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Change the capacity, dropping the oldest entries if it shrinks.
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn latest_sample(&self) -> Option<Arc<Snapshot>> {
        self.entries
            .iter()
            .rev()
            .find_map(|e| e.as_sample().cloned())
    }

    pub fn latest_speed_test(&self) -> Option<Arc<SpeedTestResult>> {
        self.entries
            .iter()
            .rev()
            .find_map(|e| e.as_speed_test().cloned())
    }

    /// Index range of `window`, and of the window of equal size just before it.
    fn ranges(&self, window: Window) -> (std::ops::Range<usize>, std::ops::Range<usize>) {
        let len = self.entries.len();
        match window {
            Window::All => (0..len, 0..0),
            Window::Last(n) => {
                let start = len.saturating_sub(n);
                let prev_start = start.saturating_sub(n);
                (start..len, prev_start..start)
            }
            Window::Since(span) => {
                let Some(newest) = self.newest_timestamp() else {
                    return (0..0, 0..0);
                };
                let span_ms = i64::try_from(span.as_millis()).unwrap_or(i64::MAX);
                let cutoff = newest.saturating_sub(span_ms);
                let prev_cutoff = cutoff.saturating_sub(span_ms);

                let start = self.first_at_or_after(cutoff);
                let prev_start = self.first_at_or_after(prev_cutoff);
                (start..len, prev_start..start)
            }
        }
    }

    /// Timestamps are sorted, so a binary search finds the cut point.
    fn first_at_or_after(&self, timestamp: i64) -> usize {
        self.entries
            .partition_point(|e| e.timestamp_ms() < timestamp)
    }

    fn view(&self, range: std::ops::Range<usize>) -> HistoryView {
        HistoryView {
            entries: self.entries.range(range).cloned().collect(),
        }
    }

    pub fn window(&self, window: Window) -> HistoryView {
        let (current, _) = self.ranges(window);
        self.view(current)
    }

    /// The window and its predecessor, taken from the same buffer state.
    pub fn window_pair(&self, window: Window) -> (HistoryView, HistoryView) {
        let (current, previous) = self.ranges(window);
        (self.view(current), self.view(previous))
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable copy of part of history.
///
/// Cloning is cheap and every call to [`HistoryView::iter`] starts over from the
/// oldest entry; the view never observes later changes to the buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryView {
    entries: Arc<[HistoryEntry]>,
}

impl Default for HistoryView {
    fn default() -> Self {
        Self {
            entries: Arc::from(Vec::new()),
        }
    }
}

impl HistoryView {
    pub fn iter(&self) -> std::slice::Iter<'_, HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn samples(&self) -> impl DoubleEndedIterator<Item = &Arc<Snapshot>> + '_ {
        self.entries.iter().filter_map(HistoryEntry::as_sample)
    }

    pub fn speed_tests(&self) -> impl DoubleEndedIterator<Item = &Arc<SpeedTestResult>> + '_ {
        self.entries.iter().filter_map(HistoryEntry::as_speed_test)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl<'a> IntoIterator for &'a HistoryView {
    type Item = &'a HistoryEntry;
    type IntoIter = std::slice::Iter<'a, HistoryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// History shared between the sampling loop, speed tests and readers.
///
/// Writers take the lock only for a push; readers copy the part they need under
/// a read lock, so no reader can see a partially applied write.
#[derive(Debug, Clone, Default)]
pub struct SharedHistory {
    inner: Arc<RwLock<HistoryBuffer>>,
}

impl SharedHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HistoryBuffer::with_capacity(capacity))),
        }
    }

    pub fn push(&self, entry: impl Into<HistoryEntry>) -> Result<()> {
        self.inner.write().push(entry.into())
    }

    /// See [`HistoryBuffer::append`]. The ordering check and the insert happen
    /// under one write lock.
    pub fn append(&self, entry: impl Into<HistoryEntry>) -> i64 {
        self.inner.write().append(entry.into())
    }

    pub fn window(&self, window: Window) -> HistoryView {
        self.inner.read().window(window)
    }

    pub fn window_pair(&self, window: Window) -> (HistoryView, HistoryView) {
        self.inner.read().window_pair(window)
    }

    pub fn latest_sample(&self) -> Option<Arc<Snapshot>> {
        self.inner.read().latest_sample()
    }

    pub fn latest_speed_test(&self) -> Option<Arc<SpeedTestResult>> {
        self.inner.read().latest_speed_test()
    }

    pub fn resize(&self, capacity: usize) {
        self.inner.write().resize(capacity);
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.read().capacity()
    }
}
