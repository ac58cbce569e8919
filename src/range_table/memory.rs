use std::sync::{Mutex, RwLock};

use chrono::Utc;
use uuid::Uuid;

use super::{RangeTableStore, RuleSnapshot, StoreError};
use crate::models::{RuleDraft, StagingRule};

/// Process-local store. Used when no database is configured and in tests.
pub struct MemoryRangeTable {
    /// Serializes writers; holds the last issued revision.
    writer: Mutex<i64>,
    published: RwLock<RuleSnapshot>,
}

impl MemoryRangeTable {
    pub fn new() -> Self {
        Self {
            writer: Mutex::new(0),
            published: RwLock::new(RuleSnapshot::empty()),
        }
    }

    fn publish(&self, snapshot: RuleSnapshot) -> Result<(), StoreError> {
        let mut guard = self
            .published
            .write()
            .map_err(|_| StoreError::Unavailable("snapshot lock poisoned".into()))?;
        *guard = snapshot;
        Ok(())
    }
}

impl Default for MemoryRangeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RangeTableStore for MemoryRangeTable {
    fn list(&self) -> Result<RuleSnapshot, StoreError> {
        self.published
            .read()
            .map(|snap| snap.clone())
            .map_err(|_| StoreError::Unavailable("snapshot lock poisoned".into()))
    }

    fn upsert(&self, draft: RuleDraft) -> Result<StagingRule, StoreError> {
        draft.validate()?;

        let mut revision = self
            .writer
            .lock()
            .map_err(|_| StoreError::Unavailable("writer lock poisoned".into()))?;

        let id = draft.id.unwrap_or_else(Uuid::new_v4);
        let rule = draft.into_rule(id, *revision + 1, Utc::now());

        let mut rules: Vec<StagingRule> = self
            .list()?
            .iter()
            .filter(|r| r.id != id)
            .cloned()
            .collect();
        rules.push(rule.clone());
        self.publish(RuleSnapshot::new(rules))?;
        *revision += 1;

        tracing::info!(rule_id = %rule.id, stage = rule.stage, revision = rule.revision, "Staging rule saved");
        Ok(rule)
    }

    fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let _writer = self
            .writer
            .lock()
            .map_err(|_| StoreError::Unavailable("writer lock poisoned".into()))?;

        let current = self.list()?;
        if current.find(&id).is_none() {
            return Err(StoreError::NotFound(id));
        }
        let rules = current.iter().filter(|r| r.id != id).cloned().collect();
        self.publish(RuleSnapshot::new(rules))?;

        tracing::info!(rule_id = %id, "Staging rule deleted");
        Ok(())
    }
}
