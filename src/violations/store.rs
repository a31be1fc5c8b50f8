// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Violation ledger with single-writer synchronization

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};

use super::{ViolationId, ViolationRecord};
use crate::db::Database;
use crate::error::{ServiceError, ServiceResult};

#[derive(Default)]
struct Ledger {
    records: Vec<ViolationRecord>,
    index: HashMap<ViolationId, usize>,
}

impl Ledger {
    fn push(&mut self, record: ViolationRecord) {
        self.index.insert(record.id, self.records.len());
        self.records.push(record);
    }
}

/// Outcome of a notification request
#[derive(Debug, Clone)]
pub struct MarkOutcome {
    pub record: ViolationRecord,
    /// `false` when the record had already been notified
    pub transitioned: bool,
}

/// Owner of the violation ledger.
///
/// Mutations take the write lock for their whole duration. With a database
/// attached, the row is written before the in-memory ledger changes, so a
/// storage failure leaves both sides untouched.
pub struct ViolationStore {
    ledger: RwLock<Ledger>,
    backend: Option<Arc<Database>>,
}

impl ViolationStore {
    /// Volatile store
    pub fn in_memory() -> Self {
        Self {
            ledger: RwLock::new(Ledger::default()),
            backend: None,
        }
    }

    /// Store persisted to `db`, seeded with the records already on disk
    pub fn with_database(db: Arc<Database>) -> Result<Self> {
        let mut ledger = Ledger::default();
        for record in db.load_violations()? {
            ledger.push(record);
        }
        info!("Loaded {} violations from database", ledger.records.len());

        Ok(Self {
            ledger: RwLock::new(ledger),
            backend: Some(db),
        })
    }

    /// Insert a new record; fails on an existing id
    pub fn append(&self, record: ViolationRecord) -> ServiceResult<ViolationId> {
        let mut ledger = self.ledger.write();
        if ledger.index.contains_key(&record.id) {
            return Err(ServiceError::DuplicateViolation(record.id));
        }

        if let Some(db) = &self.backend {
            db.insert_violation(&record)?;
        }

        let id = record.id;
        ledger.push(record);
        debug!(%id, total = ledger.records.len(), "violation appended");
        Ok(id)
    }

    pub fn get(&self, id: &ViolationId) -> ServiceResult<ViolationRecord> {
        let ledger = self.ledger.read();
        ledger
            .index
            .get(id)
            .map(|&pos| ledger.records[pos].clone())
            .ok_or_else(|| ServiceError::ViolationNotFound(id.to_string()))
    }

    /// Set `notified`/`notified_at` once. Re-marking returns the record unchanged.
    pub fn mark_notified(&self, id: &ViolationId, at: DateTime<Utc>) -> ServiceResult<MarkOutcome> {
        let mut ledger = self.ledger.write();
        let pos = *ledger
            .index
            .get(id)
            .ok_or_else(|| ServiceError::ViolationNotFound(id.to_string()))?;

        if ledger.records[pos].notified {
            return Ok(MarkOutcome {
                record: ledger.records[pos].clone(),
                transitioned: false,
            });
        }

        if let Some(db) = &self.backend {
            db.mark_violation_notified(id, at)?;
        }

        let record = &mut ledger.records[pos];
        record.notified = true;
        record.notified_at = Some(at);
        Ok(MarkOutcome {
            record: record.clone(),
            transitioned: true,
        })
    }

    /// Snapshot of the ledger in insertion order
    pub fn list(&self) -> Vec<ViolationRecord> {
        self.ledger.read().records.clone()
    }

    /// Records detected at exactly `timestamp`
    pub fn find_by_timestamp(&self, timestamp: DateTime<Utc>) -> Vec<ViolationRecord> {
        self.ledger
            .read()
            .records
            .iter()
            .filter(|r| r.timestamp == timestamp)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ledger.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every record, returning how many were dropped
    pub fn clear(&self) -> ServiceResult<usize> {
        let mut ledger = self.ledger.write();
        if let Some(db) = &self.backend {
            db.clear_violations()?;
        }

        let removed = ledger.records.len();
        *ledger = Ledger::default();
        info!("Cleared {} violations", removed);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::violations::NewViolation;
    use chrono::{Duration, TimeZone};

    fn record(employee: &str, missing: &[&str]) -> ViolationRecord {
        ViolationRecord::new(
            ViolationId::new(),
            NewViolation {
                employee_id: Some(employee.into()),
                employee_name: None,
                missing_ppe: missing.iter().map(|s| s.to_string()).collect(),
                timestamp: Utc::now(),
                location: "Main Camera".into(),
                annotated_image: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_append_preserves_insertion_order() {
        let store = ViolationStore::in_memory();
        let ids: Vec<_> = (0..5)
            .map(|i| store.append(record(&format!("E{}", i), &["helmet"])).unwrap())
            .collect();

        let listed: Vec<_> = store.list().iter().map(|r| r.id).collect();
        assert_eq!(listed, ids);
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn test_duplicate_id_rejected_without_change() {
        let store = ViolationStore::in_memory();
        let a = record("E1", &["helmet"]);
        store.append(a.clone()).unwrap();

        let err = store.append(a.clone()).unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateViolation(id) if id == a.id));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_mark_notified_first_write_wins() {
        let store = ViolationStore::in_memory();
        let id = store.append(record("E1", &["helmet"])).unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 10, 18, 8, 0, 0).unwrap();
        let t2 = t1 + Duration::minutes(5);

        let first = store.mark_notified(&id, t1).unwrap();
        let second = store.mark_notified(&id, t2).unwrap();

        assert!(first.transitioned);
        assert!(!second.transitioned);
        assert_eq!(second.record.notified_at, Some(t1));
        assert_eq!(store.get(&id).unwrap().notified_at, Some(t1));
    }

    #[test]
    fn test_mark_unknown_id_is_not_found() {
        let store = ViolationStore::in_memory();
        store.append(record("E1", &["helmet"])).unwrap();
        let before = store.list();

        let err = store.mark_notified(&ViolationId::new(), Utc::now()).unwrap_err();
        assert!(matches!(err, ServiceError::ViolationNotFound(_)));
        assert_eq!(store.list(), before);
    }

    #[test]
    fn test_clear_then_append() {
        let store = ViolationStore::in_memory();
        let old = record("E1", &["helmet"]);
        store.append(old.clone()).unwrap();
        assert_eq!(store.clear().unwrap(), 1);
        assert!(store.list().is_empty());

        // a cleared id is free again
        store.append(old.clone()).unwrap();
        assert_eq!(store.list().len(), 1);
        assert!(store.get(&old.id).is_ok());
    }

    #[test]
    fn test_persisted_store_reloads_ledger() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = ViolationStore::with_database(db.clone()).unwrap();
        let a = store.append(record("E1", &["helmet"])).unwrap();
        store.append(record("E2", &["vest"])).unwrap();
        let at = Utc::now();
        store.mark_notified(&a, at).unwrap();

        let reopened = ViolationStore::with_database(db).unwrap();
        let records = reopened.list();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, a);
        assert!(records[0].notified);
        assert!(!records[1].notified);
    }

    #[test]
    fn test_find_by_timestamp() {
        let store = ViolationStore::in_memory();
        let a = record("E1", &["helmet"]);
        store.append(a.clone()).unwrap();
        assert_eq!(store.find_by_timestamp(a.timestamp).len(), 1);
        assert!(store.find_by_timestamp(a.timestamp + Duration::seconds(1)).is_empty());
    }

    #[test]
    fn test_storage_failure_leaves_ledger_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let db = Database::open(&crate::config::DatabaseConfig {
            enabled: true,
            path: path.clone(),
        })
        .unwrap();
        let store = ViolationStore::with_database(Arc::new(db)).unwrap();
        let kept = store.append(record("E1", &["helmet"])).unwrap();
        let before = store.list();

        // pull the table out from under the store
        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch("DROP TABLE violations")
            .unwrap();

        let err = store.append(record("E2", &["vest"])).unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)), "append: {:?}", err);
        assert_eq!(store.list(), before);

        let err = store.mark_notified(&kept, Utc::now()).unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)), "mark: {:?}", err);
        assert!(!store.get(&kept).unwrap().notified);
        assert!(store.get(&kept).unwrap().notified_at.is_none());

        let err = store.clear().unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)), "clear: {:?}", err);
        assert_eq!(store.list(), before);
    }
}
