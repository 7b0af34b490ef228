//! Alert monitor: wires ingestion to evaluation to history.
//!
//! [`AlertMonitor`] is the entry point of the engine. The host constructs
//! one per observed client, injecting the storage backend, and feeds it
//! metric observations through [`AlertMonitor::ingest`]. Each ingestion:
//!
//! 1. records the snapshot,
//! 2. evaluates every enabled rule watching that metric,
//! 3. appends an [`Alert`] to history for each rule that triggered,
//! 4. hands each new alert to the registered handlers.
//!
//! There is no cooldown: a rule whose condition keeps holding fires again
//! on every ingestion of its metric.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use vigil_persist::{KeyValueStore, validate_key};

use crate::error::{AlertError, Result};
use crate::evaluator::{Evaluation, evaluate};
use crate::handlers::AlertHandler;
use crate::history::AlertHistory;
use crate::registry::RuleRegistry;
use crate::snapshot::{SnapshotLookup, SnapshotStore};
use crate::types::{Alert, MetricSnapshot, Rule, RuleDraft, RulePatch};

/// Configuration for the alert monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// How long snapshots are retained (in seconds).
    pub snapshot_retention_secs: u64,
    /// Maximum number of alerts kept in history.
    pub history_capacity: usize,
    /// Storage key for the rule collection.
    pub rules_key: String,
    /// Storage key for the alert history collection.
    pub history_key: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            snapshot_retention_secs: 86_400, // 24 hours
            history_capacity: AlertHistory::DEFAULT_CAPACITY,
            rules_key: "alert-rules".to_string(),
            history_key: "alert-history".to_string(),
        }
    }
}

impl MonitorConfig {
    /// Checks that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Validation` if the retention or capacity is zero,
    /// the retention is out of range, a storage key is not a valid store key,
    /// or both keys are the same.
    pub fn validate(&self) -> Result<()> {
        if self.snapshot_retention_secs == 0 {
            return Err(AlertError::validation("snapshot retention must be positive"));
        }
        if self.retention().is_none() {
            return Err(AlertError::validation("snapshot retention is out of range"));
        }
        if self.history_capacity == 0 {
            return Err(AlertError::validation("history capacity must be positive"));
        }
        for key in [&self.rules_key, &self.history_key] {
            validate_key(key).map_err(|e| AlertError::validation(e.to_string()))?;
        }
        if self.rules_key == self.history_key {
            return Err(AlertError::validation(
                "rules and history must use different storage keys",
            ));
        }
        Ok(())
    }

    /// Returns the snapshot retention, or `None` if it does not fit a duration.
    #[must_use]
    pub fn retention(&self) -> Option<Duration> {
        i64::try_from(self.snapshot_retention_secs)
            .ok()
            .and_then(Duration::try_seconds)
    }
}

/// The result of one [`AlertMonitor::ingest`] call.
#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
    /// Number of enabled rules evaluated for the ingested metric.
    pub rules_evaluated: usize,
    /// Alerts fired by this ingestion, in the order they were appended.
    pub alerts: Vec<Alert>,
    /// Number of handler deliveries that failed.
    pub handler_failures: usize,
}

impl IngestOutcome {
    /// Returns true if at least one rule fired.
    #[must_use]
    pub fn fired(&self) -> bool {
        !self.alerts.is_empty()
    }
}

#[derive(Debug)]
struct MonitorState {
    registry: RuleRegistry,
    snapshots: SnapshotStore,
    history: AlertHistory,
}

/// The alerting engine for one observed client.
///
/// All mutators (ingestion, rule CRUD, acknowledge, clear) are serialized
/// behind a single lock, so the monitor can be shared across threads
/// through an `Arc`. Handlers run after that lock is released.
pub struct AlertMonitor {
    config: MonitorConfig,
    state: Mutex<MonitorState>,
    handlers: RwLock<Vec<Box<dyn AlertHandler>>>,
}

impl AlertMonitor {
    /// Creates a monitor with default configuration, loading persisted rules
    /// and history from `store`.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Storage` if persisted state cannot be read.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        Self::with_config(MonitorConfig::default(), store)
    }

    /// Creates a monitor with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Validation` for an unusable configuration, or
    /// `AlertError::Storage` if persisted state cannot be read.
    pub fn with_config(config: MonitorConfig, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        config.validate()?;
        let retention = config
            .retention()
            .ok_or_else(|| AlertError::validation("snapshot retention is out of range"))?;

        let registry = RuleRegistry::load(Arc::clone(&store), &config.rules_key)?;
        let history = AlertHistory::load(store, &config.history_key, config.history_capacity)?;

        info!(
            rules = registry.len(),
            alerts = history.len(),
            retention_secs = config.snapshot_retention_secs,
            "alert monitor started"
        );

        Ok(Self {
            config,
            state: Mutex::new(MonitorState {
                registry,
                snapshots: SnapshotStore::new(retention),
                history,
            }),
            handlers: RwLock::new(Vec::new()),
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &MonitorConfig {
        &self.config
    }

    // ============ Ingestion ============

    /// Records an observation and fires every enabled rule on `metric` whose
    /// condition now holds.
    ///
    /// Fired alerts carry `triggered_at = timestamp` and are appended to
    /// history before any handler sees them.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Validation` if `value` is NaN or infinite; nothing
    /// is recorded then.
    ///
    /// Returns `AlertError::Storage` if an alert could not be saved to
    /// history. Alerts appended earlier in the same call are still delivered
    /// to handlers; evaluation of the remaining rules is abandoned.
    pub fn ingest(&self, metric: &str, value: f64, timestamp: DateTime<Utc>) -> Result<IngestOutcome> {
        if !value.is_finite() {
            warn!(metric = %metric, value = value, "rejected non-finite observation");
            return Err(AlertError::validation(format!(
                "observed value for {metric:?} must be finite, got {value}"
            )));
        }

        let mut outcome = IngestOutcome::default();
        let mut failure = None;

        {
            let mut state = self.state.lock();
            state.snapshots.record(metric, value, timestamp);

            let rules = state.registry.rules_for_metric(metric);
            outcome.rules_evaluated = rules.len();

            for rule in &rules {
                match evaluate(rule, &state.snapshots, timestamp) {
                    Evaluation::Triggered(trigger) => {
                        let alert = Alert::new(
                            rule,
                            trigger.severity,
                            trigger.message,
                            trigger.current,
                            trigger.baseline,
                            timestamp,
                        );
                        if let Err(e) = state.history.append(alert.clone()) {
                            warn!(rule_id = %rule.id, error = %e, "failed to record alert");
                            failure = Some(e);
                            break;
                        }
                        info!(
                            rule_id = %rule.id,
                            rule_name = %rule.name,
                            alert_id = %alert.id,
                            severity = %alert.severity,
                            value = value,
                            "alert fired"
                        );
                        outcome.alerts.push(alert);
                    }
                    Evaluation::NotTriggered(reason) => {
                        debug!(rule_id = %rule.id, metric = %metric, reason = %reason, "rule not triggered");
                    }
                }
            }
        }

        outcome.handler_failures = self.emit(&outcome.alerts);

        match failure {
            Some(e) => Err(e),
            None => Ok(outcome),
        }
    }

    /// Ingests a [`MetricSnapshot`]. See [`AlertMonitor::ingest`].
    ///
    /// # Errors
    ///
    /// Same as [`AlertMonitor::ingest`].
    pub fn ingest_snapshot(&self, snapshot: &MetricSnapshot) -> Result<IngestOutcome> {
        self.ingest(&snapshot.metric, snapshot.value, snapshot.timestamp)
    }

    /// Delivers alerts to every handler, returning the number of failures.
    fn emit(&self, alerts: &[Alert]) -> usize {
        if alerts.is_empty() {
            return 0;
        }

        let handlers = self.handlers.read();
        let mut failures = 0;

        for alert in alerts {
            for handler in handlers.iter() {
                match catch_unwind(AssertUnwindSafe(|| handler.handle(alert))) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(handler = %handler.name(), alert_id = %alert.id, error = %e, "alert handler failed");
                        failures += 1;
                    }
                    Err(_) => {
                        warn!(handler = %handler.name(), alert_id = %alert.id, "alert handler panicked");
                        failures += 1;
                    }
                }
            }
        }

        failures
    }

    // ============ Handlers ============

    /// Registers a handler for fired alerts.
    ///
    /// Handlers must not register further handlers from inside `handle`.
    pub fn on_alert(&self, handler: Box<dyn AlertHandler>) {
        info!(handler = %handler.name(), "registered alert handler");
        self.handlers.write().push(handler);
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    // ============ Rule Management ============

    /// Registers a new rule. See [`RuleRegistry::register`].
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Validation` or `AlertError::Storage`.
    pub fn register_rule(&self, draft: RuleDraft) -> Result<Rule> {
        self.state.lock().registry.register(draft)
    }

    /// Updates a rule. See [`RuleRegistry::update`].
    ///
    /// # Errors
    ///
    /// Returns `AlertError::RuleNotFound`, `AlertError::Validation` or
    /// `AlertError::Storage`.
    pub fn update_rule(&self, id: &str, patch: &RulePatch) -> Result<Rule> {
        self.state.lock().registry.update(id, patch)
    }

    /// Enables or disables a rule.
    ///
    /// # Errors
    ///
    /// Same as [`AlertMonitor::update_rule`].
    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<Rule> {
        self.state.lock().registry.set_enabled(id, enabled)
    }

    /// Deletes a rule. Unknown IDs are a no-op.
    ///
    /// Alerts already fired by the rule stay in history.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Storage` if the removal could not be saved.
    pub fn delete_rule(&self, id: &str) -> Result<()> {
        self.state.lock().registry.delete(id).map(|_| ())
    }

    /// Returns a rule by ID.
    #[must_use]
    pub fn get_rule(&self, id: &str) -> Option<Rule> {
        self.state.lock().registry.get(id)
    }

    /// Returns all rules.
    #[must_use]
    pub fn list_rules(&self) -> Vec<Rule> {
        self.state.lock().registry.list()
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.state.lock().registry.len()
    }

    // ============ Alert History ============

    /// Returns the alert history, newest first.
    #[must_use]
    pub fn alerts(&self) -> Vec<Alert> {
        self.state.lock().history.list()
    }

    /// Returns unacknowledged alerts, newest first.
    #[must_use]
    pub fn unacknowledged_alerts(&self) -> Vec<Alert> {
        self.state.lock().history.unacknowledged()
    }

    /// Acknowledges an alert. Unknown IDs are a no-op.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Storage` if the change could not be saved.
    pub fn acknowledge(&self, alert_id: &str) -> Result<()> {
        self.state.lock().history.acknowledge(alert_id).map(|_| ())
    }

    /// Acknowledges every alert, returning how many changed.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Storage` if the change could not be saved.
    pub fn acknowledge_all(&self) -> Result<usize> {
        self.state.lock().history.acknowledge_all()
    }

    /// Empties the alert history.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Storage` if the change could not be saved.
    pub fn clear_history(&self) -> Result<()> {
        self.state.lock().history.clear()
    }

    // ============ Snapshots ============

    /// Returns the newest recorded value of `metric`.
    #[must_use]
    pub fn latest_value(&self, metric: &str) -> Option<f64> {
        self.state.lock().snapshots.latest_value(metric)
    }

    /// Returns the value of `metric` at or before `at`.
    #[must_use]
    pub fn value_at(&self, metric: &str, at: DateTime<Utc>) -> Option<f64> {
        self.state.lock().snapshots.value_at(metric, at)
    }

    /// Returns the number of retained snapshots for `metric`.
    #[must_use]
    pub fn snapshot_count(&self, metric: &str) -> usize {
        self.state.lock().snapshots.len(metric)
    }
}

impl std::fmt::Debug for AlertMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertMonitor")
            .field("config", &self.config)
            .field("handlers", &self.handler_count())
            .finish_non_exhaustive()
    }
}
