//! Delivery targets for fired alerts.
//!
//! The monitor hands every fired alert to each registered [`AlertHandler`]
//! once, after the alert is already in history. Delivery is best-effort:
//! a failing handler is logged and skipped, never retried.

use std::fmt;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::HandlerError;
use crate::types::{Alert, Severity};

/// Receives fired alerts.
///
/// Implement this trait to surface alerts in a banner, a push
/// notification, or any other sink.
pub trait AlertHandler: Send + Sync + fmt::Debug {
    /// Returns the name of this handler.
    fn name(&self) -> &str;

    /// Delivers one alert.
    ///
    /// # Errors
    ///
    /// Returns `HandlerError` if the alert could not be delivered.
    fn handle(&self, alert: &Alert) -> Result<(), HandlerError>;
}

/// A handler that writes alerts to `tracing`.
#[derive(Debug, Clone)]
pub struct LogHandler {
    name: String,
}

impl LogHandler {
    /// Creates a log handler.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for LogHandler {
    fn default() -> Self {
        Self::new("log")
    }
}

impl AlertHandler for LogHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, alert: &Alert) -> Result<(), HandlerError> {
        match alert.severity {
            Severity::High => warn!(
                alert_id = %alert.id,
                rule = %alert.rule_name,
                severity = %alert.severity,
                value = alert.value,
                "ALERT: {}",
                alert.message
            ),
            Severity::Medium | Severity::Low => info!(
                alert_id = %alert.id,
                rule = %alert.rule_name,
                severity = %alert.severity,
                value = alert.value,
                "ALERT: {}",
                alert.message
            ),
        }
        Ok(())
    }
}

/// A handler that forwards alerts into a tokio channel.
///
/// This lets an async consumer (a UI task, a notification worker) receive
/// alerts without blocking ingestion.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    name: String,
    tx: mpsc::UnboundedSender<Alert>,
}

impl ChannelHandler {
    /// Creates a handler and the receiving end of its channel.
    #[must_use]
    pub fn new(name: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<Alert>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::from_sender(name, tx), rx)
    }

    /// Wraps an existing sender.
    #[must_use]
    pub fn from_sender(name: impl Into<String>, tx: mpsc::UnboundedSender<Alert>) -> Self {
        Self {
            name: name.into(),
            tx,
        }
    }
}

impl AlertHandler for ChannelHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, alert: &Alert) -> Result<(), HandlerError> {
        self.tx
            .send(alert.clone())
            .map_err(|_| HandlerError::new(&self.name, "receiver dropped"))
    }
}

/// A handler backed by a closure.
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&Alert) -> Result<(), HandlerError> + Send + Sync,
{
    /// Creates a closure handler.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish()
    }
}

impl<F> AlertHandler for FnHandler<F>
where
    F: Fn(&Alert) -> Result<(), HandlerError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, alert: &Alert) -> Result<(), HandlerError> {
        (self.f)(alert)
    }
}
