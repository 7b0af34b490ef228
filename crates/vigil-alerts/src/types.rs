//! Core types for the alerting engine.
//!
//! - [`Condition`]: what kind of change a rule watches for
//! - [`Severity`]: coarse classification of how far a trigger overshot
//! - [`RuleDraft`] / [`RulePatch`]: rule input before an ID is assigned, and partial updates
//! - [`Rule`]: a stored, validated rule
//! - [`MetricSnapshot`]: one observed data point
//! - [`Alert`]: a fired alert as kept in history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AlertError, Result};

/// The condition a rule evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    /// The metric grew by at least `value` percent over the rule's window.
    Increase,
    /// The metric shrank by at least `value` percent over the rule's window.
    Decrease,
    /// The latest observation is at or above `value`.
    Threshold,
}

impl Condition {
    /// Returns the condition as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Increase => "increase",
            Self::Decrease => "decrease",
            Self::Threshold => "threshold",
        }
    }

    /// Returns true for conditions that compare against a baseline.
    #[must_use]
    pub const fn uses_window(&self) -> bool {
        matches!(self, Self::Increase | Self::Decrease)
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The severity of a fired alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The condition was only just met.
    Low,
    /// The observation overshot the rule's value by more than a fifth of it.
    Medium,
    /// The observation overshot the rule's value by at least the value itself.
    High,
}

impl Severity {
    /// Overshoot ratio at or above which an alert is [`Severity::High`].
    pub const HIGH_EXCESS: f64 = 1.0;
    /// Overshoot ratio above which an alert is [`Severity::Medium`].
    ///
    /// The bound is exclusive: a 60% increase against a 50% rule, or a
    /// reading of 12 against a threshold of 10, overshoots by exactly 0.2
    /// and stays [`Severity::Low`].
    pub const MEDIUM_EXCESS: f64 = 0.2;

    /// Classifies an overshoot.
    ///
    /// `observed` and `limit` are in the rule's units: the absolute value for
    /// threshold rules, the percentage change for increase/decrease rules.
    /// The overshoot ratio is `(observed - limit) / limit`.
    #[must_use]
    pub fn from_excess(observed: f64, limit: f64) -> Self {
        let excess = (observed - limit) / limit;
        if excess >= Self::HIGH_EXCESS {
            Self::High
        } else if excess > Self::MEDIUM_EXCESS {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Returns the severity as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rule fields before the registry assigns an ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDraft {
    /// Display name.
    pub name: String,
    /// The metric series this rule watches.
    pub metric: String,
    /// What the rule checks for.
    pub condition: Condition,
    /// Percentage for increase/decrease, absolute value for threshold.
    pub value: f64,
    /// Lookback window for increase/decrease rules.
    pub time_window_minutes: u32,
    /// Whether the rule is evaluated.
    pub enabled: bool,
}

impl RuleDraft {
    /// Maximum allowed length for rule names.
    pub const MAX_NAME_LENGTH: usize = 256;

    /// Creates a builder with the required fields.
    pub fn builder(
        name: impl Into<String>,
        metric: impl Into<String>,
        condition: Condition,
        value: f64,
    ) -> RuleDraftBuilder {
        RuleDraftBuilder::new(name, metric, condition, value)
    }

    /// Checks the rule invariants.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Validation` if:
    /// - The name is blank or exceeds the maximum length
    /// - The value is not a positive finite number
    /// - The time window is zero
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AlertError::validation("rule name cannot be empty"));
        }
        if self.name.chars().count() > Self::MAX_NAME_LENGTH {
            return Err(AlertError::validation(format!(
                "rule name exceeds maximum length of {} characters",
                Self::MAX_NAME_LENGTH
            )));
        }
        if !self.value.is_finite() || self.value <= 0.0 {
            return Err(AlertError::validation(format!(
                "rule value must be a positive number, got {}",
                self.value
            )));
        }
        if self.time_window_minutes == 0 {
            return Err(AlertError::validation(
                "time window must be at least one minute",
            ));
        }
        Ok(())
    }
}

/// Builder for [`RuleDraft`] values.
#[derive(Debug)]
pub struct RuleDraftBuilder {
    draft: RuleDraft,
}

impl RuleDraftBuilder {
    fn new(
        name: impl Into<String>,
        metric: impl Into<String>,
        condition: Condition,
        value: f64,
    ) -> Self {
        Self {
            draft: RuleDraft {
                name: name.into(),
                metric: metric.into(),
                condition,
                value,
                time_window_minutes: 5,
                enabled: true,
            },
        }
    }

    /// Sets the lookback window in minutes.
    #[must_use]
    pub const fn time_window_minutes(mut self, minutes: u32) -> Self {
        self.draft.time_window_minutes = minutes;
        self
    }

    /// Sets whether the rule is enabled.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.draft.enabled = enabled;
        self
    }

    /// Builds and validates the draft.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Validation` if the draft breaks a rule invariant.
    pub fn build(self) -> Result<RuleDraft> {
        self.draft.validate()?;
        Ok(self.draft)
    }
}

/// A partial update to a stored rule. `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RulePatch {
    /// New display name.
    pub name: Option<String>,
    /// New metric.
    pub metric: Option<String>,
    /// New condition.
    pub condition: Option<Condition>,
    /// New value.
    pub value: Option<f64>,
    /// New window.
    pub time_window_minutes: Option<u32>,
    /// New enabled flag.
    pub enabled: Option<bool>,
}

impl RulePatch {
    /// A patch that only flips the enabled flag.
    #[must_use]
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::default()
        }
    }

    /// Returns true if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A stored alert rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Unique, immutable identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// The metric series this rule watches.
    pub metric: String,
    /// What the rule checks for.
    pub condition: Condition,
    /// Percentage for increase/decrease, absolute value for threshold.
    pub value: f64,
    /// Lookback window for increase/decrease rules.
    pub time_window_minutes: u32,
    /// Whether the rule is evaluated.
    pub enabled: bool,
}

impl Rule {
    /// Creates a rule from a draft with a freshly generated ID.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Validation` if the draft breaks a rule invariant.
    pub fn from_draft(draft: RuleDraft) -> Result<Self> {
        draft.validate()?;
        Ok(Self::with_id(Uuid::new_v4().to_string(), draft))
    }

    fn with_id(id: String, draft: RuleDraft) -> Self {
        Self {
            id,
            name: draft.name,
            metric: draft.metric,
            condition: draft.condition,
            value: draft.value,
            time_window_minutes: draft.time_window_minutes,
            enabled: draft.enabled,
        }
    }

    /// Returns the rule's fields as a draft.
    #[must_use]
    pub fn to_draft(&self) -> RuleDraft {
        RuleDraft {
            name: self.name.clone(),
            metric: self.metric.clone(),
            condition: self.condition,
            value: self.value,
            time_window_minutes: self.time_window_minutes,
            enabled: self.enabled,
        }
    }

    /// Returns a copy of this rule with `patch` applied, re-validated.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Validation` if the merged rule breaks an invariant.
    pub fn patched(&self, patch: &RulePatch) -> Result<Self> {
        let mut draft = self.to_draft();
        if let Some(name) = &patch.name {
            draft.name.clone_from(name);
        }
        if let Some(metric) = &patch.metric {
            draft.metric.clone_from(metric);
        }
        if let Some(condition) = patch.condition {
            draft.condition = condition;
        }
        if let Some(value) = patch.value {
            draft.value = value;
        }
        if let Some(minutes) = patch.time_window_minutes {
            draft.time_window_minutes = minutes;
        }
        if let Some(enabled) = patch.enabled {
            draft.enabled = enabled;
        }
        draft.validate()?;
        Ok(Self::with_id(self.id.clone(), draft))
    }

    /// Returns the lookback window as a chrono duration.
    #[must_use]
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.time_window_minutes))
    }
}

/// One observed metric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// The metric series.
    pub metric: String,
    /// The observed value.
    pub value: f64,
    /// When the value was observed.
    pub timestamp: DateTime<Utc>,
}

impl MetricSnapshot {
    /// Creates a snapshot.
    pub fn new(metric: impl Into<String>, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            metric: metric.into(),
            value,
            timestamp,
        }
    }
}

/// A fired alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Unique identifier for this alert.
    pub id: String,
    /// The rule that fired. The rule may since have been deleted.
    pub rule_id: String,
    /// The rule's name when it fired.
    #[serde(default)]
    pub rule_name: String,
    /// The metric the rule watched.
    #[serde(default)]
    pub metric: String,
    /// Timestamp of the ingestion that fired the rule.
    pub triggered_at: DateTime<Utc>,
    /// Human-readable description with the numbers behind the trigger.
    pub message: String,
    /// How far the trigger overshot the rule.
    pub severity: Severity,
    /// Whether a user has acknowledged the alert.
    #[serde(default)]
    pub acknowledged: bool,
    /// The latest observed value when the rule fired.
    #[serde(default)]
    pub value: f64,
    /// The baseline used by increase/decrease rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<f64>,
}

impl Alert {
    /// Creates an unacknowledged alert with a fresh ID.
    pub fn new(
        rule: &Rule,
        severity: Severity,
        message: impl Into<String>,
        value: f64,
        baseline: Option<f64>,
        triggered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            metric: rule.metric.clone(),
            triggered_at,
            message: message.into(),
            severity,
            acknowledged: false,
            value,
            baseline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> RuleDraft {
        RuleDraft::builder("5xx spike", "status5xx", Condition::Increase, 50.0)
            .time_window_minutes(5)
            .build()
            .unwrap()
    }

    mod condition_tests {
        use super::*;

        #[test]
        fn condition_as_str() {
            assert_eq!(Condition::Increase.as_str(), "increase");
            assert_eq!(Condition::Decrease.as_str(), "decrease");
            assert_eq!(Condition::Threshold.as_str(), "threshold");
        }

        #[test]
        fn condition_uses_window() {
            assert!(Condition::Increase.uses_window());
            assert!(Condition::Decrease.uses_window());
            assert!(!Condition::Threshold.uses_window());
        }

        #[test]
        fn condition_serializes_lowercase() {
            assert_eq!(
                serde_json::to_string(&Condition::Threshold).unwrap(),
                "\"threshold\""
            );
            let parsed: Condition = serde_json::from_str("\"decrease\"").unwrap();
            assert_eq!(parsed, Condition::Decrease);
        }

        #[test]
        fn unknown_condition_is_rejected() {
            assert!(serde_json::from_str::<Condition>("\"spike\"").is_err());
        }
    }

    mod severity_tests {
        use super::*;
        use test_case::test_case;

        // increase rules: observed and limit are percentages
        #[test_case(60.0, 50.0, Severity::Low ; "excess exactly a fifth")]
        #[test_case(50.0, 50.0, Severity::Low ; "boundary")]
        #[test_case(61.0, 50.0, Severity::Medium ; "just over a fifth")]
        #[test_case(99.0, 50.0, Severity::Medium ; "just under double")]
        #[test_case(100.0, 50.0, Severity::High ; "double")]
        #[test_case(150.0, 50.0, Severity::High ; "triple")]
        #[test_case(20.0, 10.0, Severity::High ; "threshold doubled")]
        #[test_case(12.0, 10.0, Severity::Low ; "threshold exactly a fifth over")]
        #[test_case(13.0, 10.0, Severity::Medium ; "threshold thirty percent over")]
        fn severity_from_excess(observed: f64, limit: f64, expected: Severity) {
            assert_eq!(Severity::from_excess(observed, limit), expected);
        }

        #[test]
        fn infinite_excess_is_high() {
            assert_eq!(Severity::from_excess(f64::INFINITY, 50.0), Severity::High);
        }

        #[test]
        fn severity_ordering() {
            assert!(Severity::Low < Severity::Medium);
            assert!(Severity::Medium < Severity::High);
        }

        #[test]
        fn severity_display() {
            assert_eq!(Severity::Low.to_string(), "low");
            assert_eq!(Severity::Medium.to_string(), "medium");
            assert_eq!(Severity::High.to_string(), "high");
        }
    }

    mod draft_tests {
        use super::*;
        use test_case::test_case;

        #[test]
        fn builder_defaults() {
            let d = RuleDraft::builder("r", "requests", Condition::Threshold, 100.0)
                .build()
                .unwrap();
            assert!(d.enabled);
            assert_eq!(d.time_window_minutes, 5);
        }

        #[test_case("", 1.0, 5 ; "empty name")]
        #[test_case("   ", 1.0, 5 ; "blank name")]
        #[test_case("r", 0.0, 5 ; "zero value")]
        #[test_case("r", -3.0, 5 ; "negative value")]
        #[test_case("r", f64::NAN, 5 ; "nan value")]
        #[test_case("r", f64::INFINITY, 5 ; "infinite value")]
        #[test_case("r", 1.0, 0 ; "zero window")]
        fn invalid_drafts_rejected(name: &str, value: f64, window: u32) {
            let result = RuleDraft::builder(name, "m", Condition::Increase, value)
                .time_window_minutes(window)
                .build();
            assert!(matches!(result, Err(AlertError::Validation { .. })));
        }

        #[test]
        fn name_too_long_rejected() {
            let long = "a".repeat(RuleDraft::MAX_NAME_LENGTH + 1);
            match RuleDraft::builder(long, "m", Condition::Threshold, 1.0).build() {
                Err(AlertError::Validation { reason }) => assert!(reason.contains("maximum length")),
                other => panic!("expected Validation error, got {other:?}"),
            }
        }

        #[test]
        fn any_metric_string_accepted() {
            assert!(
                RuleDraft::builder("r", "", Condition::Threshold, 1.0)
                    .build()
                    .is_ok()
            );
        }

        #[test]
        fn draft_deserializes_camel_case() {
            let json = r#"{"name":"n","metric":"m","condition":"increase","value":50,"timeWindowMinutes":5,"enabled":true}"#;
            let d: RuleDraft = serde_json::from_str(json).unwrap();
            assert_eq!(d.time_window_minutes, 5);
            assert_eq!(d.condition, Condition::Increase);
        }
    }

    mod rule_tests {
        use super::*;

        #[test]
        fn from_draft_assigns_unique_ids() {
            let a = Rule::from_draft(draft()).unwrap();
            let b = Rule::from_draft(draft()).unwrap();
            assert_ne!(a.id, b.id);
            assert_eq!(a.to_draft(), draft());
        }

        #[test]
        fn patched_keeps_id() {
            let rule = Rule::from_draft(draft()).unwrap();
            let patch = RulePatch {
                name: Some("renamed".to_string()),
                value: Some(75.0),
                ..RulePatch::default()
            };
            let updated = rule.patched(&patch).unwrap();
            assert_eq!(updated.id, rule.id);
            assert_eq!(updated.name, "renamed");
            assert!((updated.value - 75.0).abs() < f64::EPSILON);
            assert_eq!(updated.metric, rule.metric);
        }

        #[test]
        fn patched_revalidates() {
            let rule = Rule::from_draft(draft()).unwrap();
            let patch = RulePatch {
                time_window_minutes: Some(0),
                ..RulePatch::default()
            };
            assert!(matches!(
                rule.patched(&patch),
                Err(AlertError::Validation { .. })
            ));
        }

        #[test]
        fn empty_patch() {
            assert!(RulePatch::default().is_empty());
            assert!(!RulePatch::enabled(false).is_empty());
        }

        #[test]
        fn window_duration() {
            let rule = Rule::from_draft(draft()).unwrap();
            assert_eq!(rule.window(), chrono::Duration::minutes(5));
        }

        #[test]
        fn rule_serializes_camel_case() {
            let rule = Rule::from_draft(draft()).unwrap();
            let value = serde_json::to_value(&rule).unwrap();
            assert_eq!(value["timeWindowMinutes"], 5);
            assert_eq!(value["condition"], "increase");
            let parsed: Rule = serde_json::from_value(value).unwrap();
            assert_eq!(parsed, rule);
        }
    }

    mod alert_tests {
        use super::*;

        #[test]
        fn new_alert_is_unacknowledged() {
            let rule = Rule::from_draft(draft()).unwrap();
            let now = Utc::now();
            let alert = Alert::new(&rule, Severity::Low, "msg", 16.0, Some(10.0), now);

            assert_eq!(alert.rule_id, rule.id);
            assert_eq!(alert.rule_name, "5xx spike");
            assert_eq!(alert.metric, "status5xx");
            assert_eq!(alert.triggered_at, now);
            assert!(!alert.acknowledged);
        }

        #[test]
        fn alert_json_uses_wire_names() {
            let rule = Rule::from_draft(draft()).unwrap();
            let alert = Alert::new(&rule, Severity::High, "msg", 25.0, None, Utc::now());
            let value = serde_json::to_value(&alert).unwrap();

            assert!(value.get("ruleId").is_some());
            assert!(value.get("triggeredAt").is_some());
            assert_eq!(value["severity"], "high");
            assert!(value.get("baseline").is_none());
        }

        #[test]
        fn minimal_alert_json_loads() {
            let json = r#"{"id":"a1","ruleId":"r1","triggeredAt":"2026-01-01T00:00:00Z","message":"m","severity":"medium"}"#;
            let alert: Alert = serde_json::from_str(json).unwrap();
            assert_eq!(alert.severity, Severity::Medium);
            assert!(!alert.acknowledged);
            assert!(alert.baseline.is_none());
        }
    }
}
