//! Bounded, most-recent-first log of fired alerts.

use std::sync::Arc;

use tracing::{debug, info};
use vigil_persist::{JsonCollection, KeyValueStore};

use crate::error::Result;
use crate::types::Alert;

/// Alert log capped at a fixed number of entries.
///
/// New alerts go to the head; once the log is over capacity the oldest
/// entries are discarded. Like [`crate::RuleRegistry`], every mutation is
/// persisted before it becomes visible.
#[derive(Debug)]
pub struct AlertHistory {
    /// Newest first.
    alerts: Vec<Alert>,
    capacity: usize,
    collection: JsonCollection<Alert>,
}

impl AlertHistory {
    /// Default maximum number of retained alerts.
    pub const DEFAULT_CAPACITY: usize = 100;

    /// Loads the history from `key` in `store`.
    ///
    /// A persisted log longer than `capacity` is truncated to its newest
    /// `capacity` entries in memory; the next write persists the cap.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Storage` if the stored collection cannot be read.
    pub fn load(store: Arc<dyn KeyValueStore>, key: &str, capacity: usize) -> Result<Self> {
        let collection = JsonCollection::new(store, key);
        let mut alerts = collection.load()?;
        alerts.truncate(capacity);
        debug!(key = %key, count = alerts.len(), capacity, "loaded alert history");
        Ok(Self {
            alerts,
            capacity,
            collection,
        })
    }

    /// Returns the capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Inserts `alert` at the head, discarding the oldest entries past capacity.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Storage` if the log could not be saved; the alert
    /// is then not recorded.
    pub fn append(&mut self, alert: Alert) -> Result<()> {
        let mut next = Vec::with_capacity(self.alerts.len() + 1);
        next.push(alert);
        next.extend(self.alerts.iter().cloned());

        let evicted = next.len().saturating_sub(self.capacity);
        next.truncate(self.capacity);
        self.commit(next)?;

        if evicted > 0 {
            debug!(evicted, capacity = self.capacity, "evicted oldest alerts");
        }
        Ok(())
    }

    /// Returns the full log, newest first.
    #[must_use]
    pub fn list(&self) -> Vec<Alert> {
        self.alerts.clone()
    }

    /// Returns an alert by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Alert> {
        self.alerts.iter().find(|a| a.id == id).cloned()
    }

    /// Returns the alerts not yet acknowledged, newest first.
    #[must_use]
    pub fn unacknowledged(&self) -> Vec<Alert> {
        self.alerts
            .iter()
            .filter(|a| !a.acknowledged)
            .cloned()
            .collect()
    }

    /// Marks the alert with `id` as acknowledged.
    ///
    /// Unknown or already acknowledged IDs are a no-op. Returns `true` if
    /// an alert changed.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Storage` if the change could not be saved.
    pub fn acknowledge(&mut self, id: &str) -> Result<bool> {
        let Some(idx) = self
            .alerts
            .iter()
            .position(|a| a.id == id && !a.acknowledged)
        else {
            return Ok(false);
        };

        let mut next = self.alerts.clone();
        next[idx].acknowledged = true;
        self.commit(next)?;

        debug!(alert_id = %id, "acknowledged alert");
        Ok(true)
    }

    /// Acknowledges every alert. Returns how many changed.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Storage` if the change could not be saved.
    pub fn acknowledge_all(&mut self) -> Result<usize> {
        let pending = self.alerts.iter().filter(|a| !a.acknowledged).count();
        if pending == 0 {
            return Ok(0);
        }

        let mut next = self.alerts.clone();
        for alert in &mut next {
            alert.acknowledged = true;
        }
        self.commit(next)?;

        info!(count = pending, "acknowledged all alerts");
        Ok(pending)
    }

    /// Empties the log.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Storage` if the change could not be saved.
    pub fn clear(&mut self) -> Result<()> {
        self.commit(Vec::new())?;
        info!("cleared alert history");
        Ok(())
    }

    /// Returns the number of retained alerts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    /// Returns true if the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    fn commit(&mut self, next: Vec<Alert>) -> Result<()> {
        self.collection.save(&next)?;
        self.alerts = next;
        Ok(())
    }
}
