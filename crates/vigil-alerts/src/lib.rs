//! Metric alerting engine for the Vigil dashboard.
//!
//! `vigil-alerts` watches a stream of metric observations for one client,
//! evaluates user-defined rules against those observations, and keeps a
//! bounded history of the alerts that fired.
//!
//! # Features
//!
//! - **Rules**: threshold, percent increase and percent decrease conditions
//! - **Snapshots**: a rolling 24 hour window of observations per metric
//! - **History**: the newest 100 alerts, persisted across restarts
//! - **Handlers**: forward fired alerts to a log, a channel or a closure
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::{Duration, Utc};
//! use vigil_alerts::{AlertMonitor, Condition, LogHandler, MemoryStore, RuleDraft, Severity};
//!
//! let monitor = AlertMonitor::new(Arc::new(MemoryStore::new())).unwrap();
//! monitor.on_alert(Box::new(LogHandler::default()));
//!
//! // Fire when 5xx responses grow by 50% or more over five minutes
//! let draft = RuleDraft::builder("5xx spike", "status5xx", Condition::Increase, 50.0)
//!     .time_window_minutes(5)
//!     .build()
//!     .unwrap();
//! monitor.register_rule(draft).unwrap();
//!
//! let now = Utc::now();
//! monitor.ingest("status5xx", 10.0, now - Duration::minutes(5)).unwrap();
//! let outcome = monitor.ingest("status5xx", 20.0, now).unwrap();
//!
//! assert_eq!(outcome.alerts.len(), 1);
//! assert_eq!(outcome.alerts[0].severity, Severity::High);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod evaluator;
pub mod handlers;
pub mod history;
pub mod monitor;
pub mod registry;
pub mod snapshot;
pub mod types;

// Re-export main types at crate root
pub use error::{AlertError, HandlerError, Result};
pub use evaluator::{Evaluation, SkipReason, Trigger, evaluate};
pub use handlers::{AlertHandler, ChannelHandler, FnHandler, LogHandler};
pub use history::AlertHistory;
pub use monitor::{AlertMonitor, IngestOutcome, MonitorConfig};
pub use registry::RuleRegistry;
pub use snapshot::{SnapshotLookup, SnapshotStore};
pub use types::{
    Alert, Condition, MetricSnapshot, Rule, RuleDraft, RuleDraftBuilder, RulePatch, Severity,
};
pub use vigil_persist::{FileStore, KeyValueStore, MemoryStore, PersistError};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use vigil_persist::{KeyValueStore, MemoryStore, PersistError};

    /// Memory store whose writes can be made to fail on demand.
    #[derive(Debug, Clone, Default)]
    pub struct FlakyStore {
        inner: MemoryStore,
        fail: Arc<AtomicBool>,
    }

    impl FlakyStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_writes(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> vigil_persist::Result<Option<Vec<u8>>> {
            self.inner.get(key)
        }

        fn put(&self, key: &str, value: &[u8]) -> vigil_persist::Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(PersistError::Io {
                    key: key.to_string(),
                    source: std::io::Error::other("disk full"),
                });
            }
            self.inner.put(key, value)
        }
    }
}
