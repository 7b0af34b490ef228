//! Time-bounded metric snapshot storage.
//!
//! [`SnapshotStore`] keeps, per metric, the observations recorded within a
//! retention horizon (24 hours by default), ordered by timestamp. Expiry is
//! lazy: each `record` call first drops that metric's points older than the
//! horizon, measured from the newest timestamp the metric has seen.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Read access to recorded metric values.
///
/// `None` means "never observed" (or already expired), which callers must
/// keep distinct from an observed zero.
pub trait SnapshotLookup {
    /// Returns the value of the newest snapshot for `metric`.
    fn latest_value(&self, metric: &str) -> Option<f64>;

    /// Returns the value of the newest snapshot taken at or before `at`.
    fn value_at(&self, metric: &str, at: DateTime<Utc>) -> Option<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Point {
    timestamp: DateTime<Utc>,
    value: f64,
}

/// Per-metric windows of recent observations.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    retention: Duration,
    /// Points per metric, ascending by timestamp. Equal timestamps keep
    /// insertion order.
    series: HashMap<String, Vec<Point>>,
}

impl SnapshotStore {
    /// Default retention horizon.
    pub const DEFAULT_RETENTION_HOURS: i64 = 24;

    /// Creates a store with the given retention horizon.
    #[must_use]
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            series: HashMap::new(),
        }
    }

    /// Returns the retention horizon.
    #[must_use]
    pub const fn retention(&self) -> Duration {
        self.retention
    }

    /// Records an observation.
    ///
    /// Points of the same metric older than the retention horizon are
    /// evicted first. An observation that is itself already past the
    /// horizon is dropped.
    pub fn record(&mut self, metric: &str, value: f64, timestamp: DateTime<Utc>) {
        let points = self.series.entry(metric.to_string()).or_default();

        let newest = points
            .last()
            .map_or(timestamp, |p| p.timestamp.max(timestamp));
        // A horizon reaching before chrono's time range evicts nothing.
        if let Some(cutoff) = newest.checked_sub_signed(self.retention) {
            let expired = points.partition_point(|p| p.timestamp < cutoff);
            if expired > 0 {
                points.drain(..expired);
                debug!(metric = %metric, evicted = expired, cutoff = %cutoff, "evicted expired snapshots");
            }

            if timestamp < cutoff {
                debug!(metric = %metric, timestamp = %timestamp, "dropped snapshot older than retention");
                return;
            }
        }

        // After every existing point with the same timestamp, so the latest
        // recorded one wins lookups.
        let pos = points.partition_point(|p| p.timestamp <= timestamp);
        points.insert(pos, Point { timestamp, value });

        debug!(
            metric = %metric,
            value = value,
            points_count = points.len(),
            "recorded snapshot"
        );
    }

    /// Returns the names of all metrics with retained points.
    #[must_use]
    pub fn metrics(&self) -> Vec<String> {
        self.series
            .iter()
            .filter(|(_, points)| !points.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Returns the number of retained points for `metric`.
    #[must_use]
    pub fn len(&self, metric: &str) -> usize {
        self.series.get(metric).map_or(0, Vec::len)
    }

    /// Returns true if no points are retained for any metric.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.values().all(Vec::is_empty)
    }

    /// Drops all recorded points.
    pub fn clear(&mut self) {
        self.series.clear();
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(Duration::hours(Self::DEFAULT_RETENTION_HOURS))
    }
}

impl SnapshotLookup for SnapshotStore {
    fn latest_value(&self, metric: &str) -> Option<f64> {
        self.series.get(metric)?.last().map(|p| p.value)
    }

    fn value_at(&self, metric: &str, at: DateTime<Utc>) -> Option<f64> {
        let points = self.series.get(metric)?;
        let idx = points.partition_point(|p| p.timestamp <= at);
        idx.checked_sub(1).map(|i| points[i].value)
    }
}
