use std::path::Path;
use std::sync::{Mutex, RwLock};

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use super::{RangeTableStore, RuleSnapshot, StoreError};
use crate::db::{self, DatabaseError};
use crate::models::{RuleDraft, StagingRule};

/// SQLite-backed store. The connection is the single writer; the published
/// snapshot is rebuilt from the table inside the write transaction and
/// swapped in only after commit.
pub struct SqliteRangeTable {
    conn: Mutex<Connection>,
    published: RwLock<RuleSnapshot>,
}

impl SqliteRangeTable {
    /// Open (and migrate) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = db::open_database(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = db::open_memory_database()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        let snapshot = RuleSnapshot::new(db::list_staging_rules(&conn)?);
        tracing::info!(rules = snapshot.len(), "Range table loaded");
        Ok(Self {
            conn: Mutex::new(conn),
            published: RwLock::new(snapshot),
        })
    }

    fn publish(&self, snapshot: RuleSnapshot) -> Result<(), StoreError> {
        let mut guard = self
            .published
            .write()
            .map_err(|_| StoreError::Unavailable("snapshot lock poisoned".into()))?;
        *guard = snapshot;
        Ok(())
    }

    /// Run one write in a transaction and return the re-read table.
    fn write<T>(
        &self,
        op: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".into()))?;

        let tx = conn.transaction().map_err(DatabaseError::from)?;
        let value = op(&tx)?;
        let snapshot = RuleSnapshot::new(db::list_staging_rules(&tx)?);
        tx.commit().map_err(DatabaseError::from)?;

        self.publish(snapshot)?;
        Ok(value)
    }
}

impl RangeTableStore for SqliteRangeTable {
    fn list(&self) -> Result<RuleSnapshot, StoreError> {
        self.published
            .read()
            .map(|snap| snap.clone())
            .map_err(|_| StoreError::Unavailable("snapshot lock poisoned".into()))
    }

    fn upsert(&self, draft: RuleDraft) -> Result<StagingRule, StoreError> {
        draft.validate()?;

        let rule = self.write(|conn| {
            let revision = db::next_rule_revision(conn)?;
            let id = draft.id.unwrap_or_else(Uuid::new_v4);
            let rule = draft.into_rule(id, revision, Utc::now());
            db::upsert_staging_rule(conn, &rule)?;
            Ok(rule)
        })?;

        tracing::info!(rule_id = %rule.id, stage = rule.stage, revision = rule.revision, "Staging rule saved");
        Ok(rule)
    }

    fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.write(|conn| match db::delete_staging_rule(conn, &id) {
            Err(DatabaseError::NotFound { .. }) => Err(StoreError::NotFound(id)),
            other => other.map_err(StoreError::from),
        })?;

        tracing::info!(rule_id = %id, "Staging rule deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range_table::test_support::{draft, exercise_store};

    #[test]
    fn sqlite_store_contract() {
        exercise_store(&SqliteRangeTable::open_in_memory().unwrap());
    }

    #[test]
    fn rules_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("rules.db");

        let saved = {
            let store = SqliteRangeTable::open(&path).unwrap();
            store.upsert(draft(3, 30.0, 60.0)).unwrap()
        };

        let reopened = SqliteRangeTable::open(&path).unwrap();
        let snap = reopened.list().unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].id, saved.id);
        assert_eq!(snap[0].revision, saved.revision);
    }

    #[test]
    fn failed_delete_keeps_snapshot() {
        let store = SqliteRangeTable::open_in_memory().unwrap();
        store.upsert(draft(2, 60.0, 90.0)).unwrap();
        let before = store.list().unwrap();
        assert!(store.delete(Uuid::new_v4()).is_err());
        assert_eq!(store.list().unwrap().rules(), before.rules());
    }
}
