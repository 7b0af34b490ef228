//! Durable CRUD store for alert rules.
//!
//! Every mutation is write-through: the next rule list is built, persisted
//! under the rules key, and only swapped into memory once the write
//! succeeded. A failed write leaves the registry exactly as it was.

use std::sync::Arc;

use tracing::{debug, info};
use vigil_persist::{JsonCollection, KeyValueStore};

use crate::error::{AlertError, Result};
use crate::types::{Rule, RuleDraft, RulePatch};

/// Registry of alert rules backed by a [`KeyValueStore`].
#[derive(Debug)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
    collection: JsonCollection<Rule>,
}

impl RuleRegistry {
    /// Loads the registry from `key` in `store`.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Storage` if the stored collection cannot be read.
    pub fn load(store: Arc<dyn KeyValueStore>, key: &str) -> Result<Self> {
        let collection = JsonCollection::new(store, key);
        let rules = collection.load()?;
        debug!(key = %key, count = rules.len(), "loaded alert rules");
        Ok(Self { rules, collection })
    }

    /// Validates `draft`, assigns it a fresh ID and persists it.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Validation` for invalid fields, or
    /// `AlertError::Storage` if the rule could not be saved.
    pub fn register(&mut self, draft: RuleDraft) -> Result<Rule> {
        let rule = Rule::from_draft(draft)?;

        let mut next = self.rules.clone();
        next.push(rule.clone());
        self.commit(next)?;

        info!(rule_id = %rule.id, rule_name = %rule.name, metric = %rule.metric, "registered alert rule");
        Ok(rule)
    }

    /// Applies `patch` to the rule with `id`, re-validating the result.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::RuleNotFound` if no such rule exists,
    /// `AlertError::Validation` if the merged rule is invalid, or
    /// `AlertError::Storage` if it could not be saved.
    pub fn update(&mut self, id: &str, patch: &RulePatch) -> Result<Rule> {
        let idx = self.position(id).ok_or_else(|| AlertError::RuleNotFound {
            id: id.to_string(),
        })?;
        let updated = self.rules[idx].patched(patch)?;

        let mut next = self.rules.clone();
        next[idx] = updated.clone();
        self.commit(next)?;

        info!(rule_id = %updated.id, rule_name = %updated.name, "updated alert rule");
        Ok(updated)
    }

    /// Enables or disables the rule with `id`.
    ///
    /// # Errors
    ///
    /// Same as [`RuleRegistry::update`].
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<Rule> {
        self.update(id, &RulePatch::enabled(enabled))
    }

    /// Deletes the rule with `id`. Unknown IDs are a no-op.
    ///
    /// Returns `true` if a rule was removed.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Storage` if the removal could not be saved.
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        let Some(idx) = self.position(id) else {
            debug!(rule_id = %id, "delete of unknown rule ignored");
            return Ok(false);
        };

        let mut next = self.rules.clone();
        next.remove(idx);
        self.commit(next)?;

        info!(rule_id = %id, "deleted alert rule");
        Ok(true)
    }

    /// Returns a rule by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Rule> {
        self.rules.iter().find(|r| r.id == id).cloned()
    }

    /// Returns all rules.
    #[must_use]
    pub fn list(&self) -> Vec<Rule> {
        self.rules.clone()
    }

    /// Returns the enabled rules watching `metric`.
    #[must_use]
    pub fn rules_for_metric(&self, metric: &str) -> Vec<Rule> {
        self.rules
            .iter()
            .filter(|r| r.enabled && r.metric == metric)
            .cloned()
            .collect()
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.rules.iter().position(|r| r.id == id)
    }

    fn commit(&mut self, next: Vec<Rule>) -> Result<()> {
        self.collection.save(&next)?;
        self.rules = next;
        Ok(())
    }
}
