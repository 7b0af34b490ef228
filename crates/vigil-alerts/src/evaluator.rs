//! Trigger evaluation.
//!
//! [`evaluate`] is a pure decision function: given a rule, read access to
//! recorded snapshots, and the evaluation instant, it reports whether the
//! rule's condition holds and, if so, how severe the overshoot is.
//!
//! | condition   | fires when                                             |
//! |-------------|--------------------------------------------------------|
//! | `threshold` | `current >= value`                                     |
//! | `increase`  | `(current - baseline) / baseline * 100 >= value`       |
//! | `decrease`  | `baseline > 0` and `(baseline - current) / baseline * 100 >= value` |
//!
//! The baseline is the snapshot at or before `now - time_window_minutes`.
//! A missing current value or baseline never triggers. An increase from a
//! zero baseline fires for any positive current value.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::snapshot::SnapshotLookup;
use crate::types::{Condition, Rule, Severity};

/// Why a rule did not trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The rule is disabled.
    Disabled,
    /// The metric has never been observed (or everything expired).
    NoData,
    /// No snapshot exists at or before the start of the rule's window.
    NoBaseline,
    /// Data is present but the condition does not hold.
    ConditionNotMet,
}

impl SkipReason {
    /// Returns the reason as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::NoData => "no data",
            Self::NoBaseline => "no baseline",
            Self::ConditionNotMet => "condition not met",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Details of a satisfied condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    /// How far the observation overshot the rule.
    pub severity: Severity,
    /// Human-readable description including the observed numbers.
    pub message: String,
    /// The latest observed value.
    pub current: f64,
    /// The baseline value for increase/decrease rules.
    pub baseline: Option<f64>,
    /// The percentage change for increase/decrease rules. `None` for
    /// threshold rules and for increases from a zero baseline.
    pub change_percent: Option<f64>,
}

/// The outcome of evaluating one rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// The condition holds.
    Triggered(Trigger),
    /// The condition does not hold.
    NotTriggered(SkipReason),
}

impl Evaluation {
    /// Returns true if the rule triggered.
    #[must_use]
    pub const fn is_triggered(&self) -> bool {
        matches!(self, Self::Triggered(_))
    }

    /// Returns the trigger details, if the rule triggered.
    #[must_use]
    pub const fn trigger(&self) -> Option<&Trigger> {
        match self {
            Self::Triggered(t) => Some(t),
            Self::NotTriggered(_) => None,
        }
    }

    /// Returns the severity, if the rule triggered.
    #[must_use]
    pub fn severity(&self) -> Option<Severity> {
        self.trigger().map(|t| t.severity)
    }

    /// Returns the alert message, if the rule triggered.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.trigger().map(|t| t.message.as_str())
    }

    /// Returns the skip reason, if the rule did not trigger.
    #[must_use]
    pub const fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Self::Triggered(_) => None,
            Self::NotTriggered(reason) => Some(*reason),
        }
    }
}

/// Evaluates `rule` against the snapshots visible through `lookup` at `now`.
pub fn evaluate<L>(rule: &Rule, lookup: &L, now: DateTime<Utc>) -> Evaluation
where
    L: SnapshotLookup + ?Sized,
{
    if !rule.enabled {
        return Evaluation::NotTriggered(SkipReason::Disabled);
    }

    let Some(current) = lookup.latest_value(&rule.metric) else {
        return Evaluation::NotTriggered(SkipReason::NoData);
    };

    match rule.condition {
        Condition::Threshold => evaluate_threshold(rule, current),
        Condition::Increase | Condition::Decrease => {
            let Some(baseline) = now
                .checked_sub_signed(rule.window())
                .and_then(|start| lookup.value_at(&rule.metric, start))
            else {
                return Evaluation::NotTriggered(SkipReason::NoBaseline);
            };
            if rule.condition == Condition::Increase {
                evaluate_increase(rule, current, baseline)
            } else {
                evaluate_decrease(rule, current, baseline)
            }
        }
    }
}

/// `observed >= limit`, false whenever either side is NaN.
fn reaches(observed: f64, limit: f64) -> bool {
    matches!(
        observed.partial_cmp(&limit),
        Some(Ordering::Greater | Ordering::Equal)
    )
}

/// `observed > limit`, false whenever either side is NaN.
fn above(observed: f64, limit: f64) -> bool {
    observed.partial_cmp(&limit) == Some(Ordering::Greater)
}

fn evaluate_threshold(rule: &Rule, current: f64) -> Evaluation {
    if !reaches(current, rule.value) {
        return Evaluation::NotTriggered(SkipReason::ConditionNotMet);
    }

    Evaluation::Triggered(Trigger {
        severity: Severity::from_excess(current, rule.value),
        message: format!(
            "{}: {} is {} (threshold {})",
            rule.name, rule.metric, current, rule.value
        ),
        current,
        baseline: None,
        change_percent: None,
    })
}

#[allow(clippy::float_cmp)] // an exactly-zero baseline is the division guard
fn evaluate_increase(rule: &Rule, current: f64, baseline: f64) -> Evaluation {
    if baseline == 0.0 {
        if !above(current, 0.0) {
            return Evaluation::NotTriggered(SkipReason::ConditionNotMet);
        }
        return Evaluation::Triggered(Trigger {
            severity: Severity::High,
            message: format!(
                "{}: {} rose from 0 to {} over {} min (rule: increase >= {}%)",
                rule.name, rule.metric, current, rule.time_window_minutes, rule.value
            ),
            current,
            baseline: Some(baseline),
            change_percent: None,
        });
    }

    let change = (current - baseline) / baseline * 100.0;
    if !reaches(change, rule.value) {
        return Evaluation::NotTriggered(SkipReason::ConditionNotMet);
    }

    Evaluation::Triggered(Trigger {
        severity: Severity::from_excess(change, rule.value),
        message: format!(
            "{}: {} increased {:.1}% over {} min ({} -> {}, rule: increase >= {}%)",
            rule.name, rule.metric, change, rule.time_window_minutes, baseline, current, rule.value
        ),
        current,
        baseline: Some(baseline),
        change_percent: Some(change),
    })
}

fn evaluate_decrease(rule: &Rule, current: f64, baseline: f64) -> Evaluation {
    if !above(baseline, 0.0) {
        return Evaluation::NotTriggered(SkipReason::ConditionNotMet);
    }

    let change = (baseline - current) / baseline * 100.0;
    if !reaches(change, rule.value) {
        return Evaluation::NotTriggered(SkipReason::ConditionNotMet);
    }

    Evaluation::Triggered(Trigger {
        severity: Severity::from_excess(change, rule.value),
        message: format!(
            "{}: {} decreased {:.1}% over {} min ({} -> {}, rule: decrease >= {}%)",
            rule.name, rule.metric, change, rule.time_window_minutes, baseline, current, rule.value
        ),
        current,
        baseline: Some(baseline),
        change_percent: Some(change),
    })
}
