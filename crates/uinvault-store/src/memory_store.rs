use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uinvault_domain::{AuditEntry, UinRecord, UinStatus};

use crate::error::StoreError;
use crate::pool_store::{PoolStore, Transition};

struct Inner {
    rows: HashMap<String, UinRecord>,
    audit: Vec<AuditEntry>,
    next_audit_id: i64,
}

/// In-memory `PoolStore` used by unit tests and local experimentation.
/// Claim ordering and transaction semantics are emulated with a single
/// mutex guarding both tables, which is sufficient to exercise the
/// lifecycle invariants without a database.
pub struct MemoryPoolStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryPoolStore {
    fn default() -> Self {
        MemoryPoolStore { inner: Mutex::new(Inner { rows: HashMap::new(), audit: Vec::new(), next_audit_id: 1 }) }
    }
}

impl MemoryPoolStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PoolStore for MemoryPoolStore {
    async fn insert_pool_row(&self, record: &UinRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let key = record.uin.as_str().to_string();
        if inner.rows.contains_key(&key) {
            return Err(StoreError::DuplicateUin(key));
        }
        inner.rows.insert(key, record.clone());
        Ok(())
    }

    async fn insert_with_audit(
        &self,
        record: &UinRecord,
        actor_system: &str,
        actor_ref: Option<&str>,
        details: serde_json::Value,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let key = record.uin.as_str().to_string();
        if inner.rows.contains_key(&key) {
            return Err(StoreError::DuplicateUin(key));
        }
        inner.rows.insert(key, record.clone());

        let id = inner.next_audit_id;
        inner.next_audit_id += 1;
        inner.audit.push(AuditEntry {
            id,
            uin: record.uin.clone(),
            event_type: uinvault_domain::EventType::Generated,
            old_status: None,
            new_status: Some(record.status),
            actor_system: actor_system.to_string(),
            actor_ref: actor_ref.map(str::to_string),
            details,
            created_at: record.issued_at,
        });
        Ok(())
    }

    async fn claim_one_available(
        &self,
        scope: Option<&str>,
        client_id: &str,
        actor_system: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UinRecord>, StoreError> {
        let mut inner = self.inner.lock().await;

        let candidate_key = inner
            .rows
            .values()
            .filter(|r| r.status == UinStatus::Available)
            .filter(|r| scope.map(|s| r.scope.as_str() == s).unwrap_or(true))
            .min_by_key(|r| r.issued_at)
            .map(|r| r.uin.as_str().to_string());

        let Some(key) = candidate_key else {
            return Ok(None);
        };

        let row = inner.rows.get_mut(&key).expect("key just selected from the map");
        let old_status = row.status;
        row.status = UinStatus::Preassigned;
        row.claimed_by = Some(client_id.to_string());
        row.claimed_at = Some(now);
        row.last_transition_at = now;
        let snapshot = row.clone();

        let id = inner.next_audit_id;
        inner.next_audit_id += 1;
        inner.audit.push(AuditEntry {
            id,
            uin: snapshot.uin.clone(),
            event_type: uinvault_domain::EventType::Preassigned,
            old_status: Some(old_status),
            new_status: Some(UinStatus::Preassigned),
            actor_system: actor_system.to_string(),
            actor_ref: Some(client_id.to_string()),
            details: serde_json::json!({}),
            created_at: now,
        });

        Ok(Some(snapshot))
    }

    async fn apply_transition(&self, uin: &str, transition: Transition) -> Result<UinRecord, StoreError> {
        let mut inner = self.inner.lock().await;
        let row = inner.rows.get_mut(uin).ok_or_else(|| StoreError::NotFound(uin.to_string()))?;
        let old_status = row.status;
        row.status = transition.new_status;
        row.claimed_by = transition.claimed_by.clone();
        row.claimed_at = transition.claimed_at;
        row.assigned_to_ref = transition.assigned_to_ref.clone();
        row.assigned_at = transition.assigned_at;
        row.last_transition_at = transition.now;
        let snapshot = row.clone();

        let id = inner.next_audit_id;
        inner.next_audit_id += 1;
        inner.audit.push(AuditEntry {
            id,
            uin: snapshot.uin.clone(),
            event_type: transition.event_type,
            old_status: Some(old_status),
            new_status: Some(transition.new_status),
            actor_system: transition.actor_system,
            actor_ref: transition.actor_ref,
            details: transition.details,
            created_at: transition.now,
        });

        Ok(snapshot)
    }

    async fn find_by_uin(&self, uin: &str) -> Result<Option<UinRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.rows.get(uin).cloned())
    }

    async fn list_audit(&self, uin: &str) -> Result<Vec<AuditEntry>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.audit.iter().filter(|e| e.uin.as_str() == uin).cloned().collect())
    }

    async fn list_stale_in_status(
        &self,
        status: UinStatus,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<UinRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .rows
            .values()
            .filter(|r| r.status == status)
            .filter(|r| r.claimed_at.map(|t| t < older_than).unwrap_or(false))
            .cloned()
            .collect())
    }

    async fn aggregate_by_status(&self, scope: Option<&str>) -> Result<HashMap<UinStatus, i64>, StoreError> {
        let inner = self.inner.lock().await;
        let mut counts = HashMap::new();
        for row in inner.rows.values() {
            if scope.map(|s| row.scope.as_str() == s).unwrap_or(true) {
                *counts.entry(row.status).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uinvault_domain::{Scope, Uin, UinMode};

    fn row(uin: &str, scope: &str, issued_at: DateTime<Utc>) -> UinRecord {
        UinRecord::new_available(
            Uin::new(uin).unwrap(),
            UinMode::Foundational,
            Scope::new(scope),
            "0".repeat(40),
            issued_at,
            None,
        )
    }

    #[tokio::test]
    async fn claim_picks_earliest_issued_available_row() {
        let store = MemoryPoolStore::new();
        let t0 = Utc::now();
        store.insert_pool_row(&row("A", "foundational", t0 + chrono::Duration::seconds(5))).await.unwrap();
        store.insert_pool_row(&row("B", "foundational", t0)).await.unwrap();

        let claimed = store.claim_one_available(None, "client-1", "svc", t0).await.unwrap().unwrap();
        assert_eq!(claimed.uin.as_str(), "B");
        assert_eq!(claimed.status, UinStatus::Preassigned);
    }

    #[tokio::test]
    async fn claim_on_empty_pool_returns_none_not_error() {
        let store = MemoryPoolStore::new();
        let claimed = store.claim_one_available(None, "client-1", "svc", Utc::now()).await.unwrap();
        assert!(claimed.is_none());
    }

    #[tokio::test]
    async fn insert_duplicate_uin_fails() {
        let store = MemoryPoolStore::new();
        let t0 = Utc::now();
        store.insert_pool_row(&row("A", "foundational", t0)).await.unwrap();
        let err = store.insert_pool_row(&row("A", "foundational", t0)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateUin(_)));
    }

    #[tokio::test]
    async fn transition_records_audit_entry() {
        let store = MemoryPoolStore::new();
        let t0 = Utc::now();
        store.insert_pool_row(&row("A", "foundational", t0)).await.unwrap();
        store.claim_one_available(None, "client-1", "svc", t0).await.unwrap();

        let transition = Transition {
            new_status: UinStatus::Assigned,
            claimed_by: Some("client-1".into()),
            claimed_at: Some(t0),
            assigned_to_ref: Some("CR-1".into()),
            assigned_at: Some(t0),
            event_type: uinvault_domain::EventType::Assigned,
            actor_system: "svc".into(),
            actor_ref: Some("CR-1".into()),
            details: serde_json::json!({}),
            now: t0,
        };
        let updated = store.apply_transition("A", transition).await.unwrap();
        assert_eq!(updated.status, UinStatus::Assigned);

        let audit = store.list_audit("A").await.unwrap();
        assert_eq!(audit.len(), 2);
        assert_eq!(audit[0].event_type, uinvault_domain::EventType::Preassigned);
        assert_eq!(audit[1].event_type, uinvault_domain::EventType::Assigned);
    }
}
