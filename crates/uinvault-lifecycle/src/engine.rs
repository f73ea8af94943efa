use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};
use uinvault_domain::{AuditEntry, EventType, UinRecord, UinStatus};
use uinvault_store::{PoolStore, Transition};

use crate::error::LifecycleError;

/// Orchestrates `PoolStore` operations under the state machine in the
/// transition table: every method here either writes exactly one
/// row-mutation + audit-entry pair, or performs a read with no side
/// effect. Legality of a transition is checked here, before the store is
/// ever asked to write anything.
pub struct LifecycleEngine {
    store: Arc<dyn PoolStore>,
}

impl LifecycleEngine {
    pub fn new(store: Arc<dyn PoolStore>) -> Self {
        LifecycleEngine { store }
    }

    pub async fn pre_generate(&self, record: UinRecord, actor_system: &str) -> Result<UinRecord, LifecycleError> {
        self.store
            .insert_with_audit(&record, actor_system, None, json!({}))
            .await
            .map_err(|e| match e {
                uinvault_store::StoreError::DuplicateUin(u) => LifecycleError::DuplicateUin(u),
                other => LifecycleError::Storage(other),
            })?;
        debug!(uin = record.uin.as_str(), "pre-generated uin");
        Ok(record)
    }

    pub async fn claim(
        &self,
        scope: Option<&str>,
        client_id: &str,
        actor_system: &str,
    ) -> Result<Option<UinRecord>, LifecycleError> {
        let claimed = self.store.claim_one_available(scope, client_id, actor_system, Utc::now()).await?;
        if let Some(r) = &claimed {
            info!(uin = r.uin.as_str(), client_id, "uin claimed");
        }
        Ok(claimed)
    }

    pub async fn assign(&self, uin: &str, assigned_to_ref: &str, actor: &str) -> Result<UinRecord, LifecycleError> {
        let current = self.require(uin).await?;
        if current.status != UinStatus::Preassigned {
            return Err(LifecycleError::IllegalTransition { from: current.status, to: UinStatus::Assigned });
        }
        let now = Utc::now();
        let transition = Transition {
            new_status: UinStatus::Assigned,
            claimed_by: current.claimed_by.clone(),
            claimed_at: current.claimed_at,
            assigned_to_ref: Some(assigned_to_ref.to_string()),
            assigned_at: Some(now),
            event_type: EventType::Assigned,
            actor_system: actor.to_string(),
            actor_ref: Some(assigned_to_ref.to_string()),
            details: json!({}),
            now,
        };
        Ok(self.store.apply_transition(uin, transition).await?)
    }

    pub async fn release(&self, uin: &str, actor: &str) -> Result<UinRecord, LifecycleError> {
        let current = self.require(uin).await?;
        if current.status != UinStatus::Preassigned {
            return Err(LifecycleError::IllegalTransition { from: current.status, to: UinStatus::Available });
        }
        let now = Utc::now();
        let transition = Transition {
            new_status: UinStatus::Available,
            claimed_by: None,
            claimed_at: None,
            assigned_to_ref: current.assigned_to_ref.clone(),
            assigned_at: current.assigned_at,
            event_type: EventType::Released,
            actor_system: actor.to_string(),
            actor_ref: None,
            details: json!({}),
            now,
        };
        Ok(self.store.apply_transition(uin, transition).await?)
    }

    pub async fn retire(&self, uin: &str, reason: &str, actor: &str) -> Result<UinRecord, LifecycleError> {
        self.terminate(uin, UinStatus::Retired, EventType::Retired, reason, actor).await
    }

    pub async fn revoke(&self, uin: &str, reason: &str, actor: &str) -> Result<UinRecord, LifecycleError> {
        self.terminate(uin, UinStatus::Revoked, EventType::Revoked, reason, actor).await
    }

    async fn terminate(
        &self,
        uin: &str,
        target: UinStatus,
        event_type: EventType,
        reason: &str,
        actor: &str,
    ) -> Result<UinRecord, LifecycleError> {
        let current = self.require(uin).await?;
        if !current.status.can_transition_to(target) {
            return Err(LifecycleError::IllegalTransition { from: current.status, to: target });
        }
        let now = Utc::now();
        let transition = Transition {
            new_status: target,
            claimed_by: current.claimed_by.clone(),
            claimed_at: current.claimed_at,
            assigned_to_ref: current.assigned_to_ref.clone(),
            assigned_at: current.assigned_at,
            event_type,
            actor_system: actor.to_string(),
            actor_ref: None,
            details: json!({ "reason": reason }),
            now,
        };
        Ok(self.store.apply_transition(uin, transition).await?)
    }

    /// Releases every `PREASSIGNED` row whose `claimed_at` predates
    /// `now() - threshold`, back to `AVAILABLE`, each with a `RELEASED`
    /// audit entry carrying the stale-cleanup reason.
    pub async fn cleanup_stale(&self, threshold: Duration, actor: &str) -> Result<Vec<UinRecord>, LifecycleError> {
        let older_than = Utc::now()
            - chrono::Duration::from_std(threshold).unwrap_or_else(|_| chrono::Duration::zero());
        let stale = self.store.list_stale_in_status(UinStatus::Preassigned, older_than).await?;
        let mut released = Vec::with_capacity(stale.len());
        for row in stale {
            let now = Utc::now();
            let transition = Transition {
                new_status: UinStatus::Available,
                claimed_by: None,
                claimed_at: None,
                assigned_to_ref: row.assigned_to_ref.clone(),
                assigned_at: row.assigned_at,
                event_type: EventType::Released,
                actor_system: actor.to_string(),
                actor_ref: None,
                details: json!({ "reason": "Stale preassignment cleanup" }),
                now,
            };
            released.push(self.store.apply_transition(row.uin.as_str(), transition).await?);
        }
        info!(count = released.len(), "stale preassignments released");
        Ok(released)
    }

    pub async fn lookup(&self, uin: &str) -> Result<Option<UinRecord>, LifecycleError> {
        Ok(self.store.find_by_uin(uin).await?)
    }

    pub async fn audit(&self, uin: &str) -> Result<Vec<AuditEntry>, LifecycleError> {
        Ok(self.store.list_audit(uin).await?)
    }

    pub async fn pool_stats(&self, scope: Option<&str>) -> Result<HashMap<UinStatus, i64>, LifecycleError> {
        Ok(self.store.aggregate_by_status(scope).await?)
    }

    async fn require(&self, uin: &str) -> Result<UinRecord, LifecycleError> {
        self.store.find_by_uin(uin).await?.ok_or_else(|| LifecycleError::NotFound(uin.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use uinvault_domain::{Scope, Uin, UinMode};
    use uinvault_store::MemoryPoolStore;

    fn available(uin: &str, scope: &str) -> UinRecord {
        UinRecord::new_available(
            Uin::new(uin).unwrap(),
            UinMode::Foundational,
            Scope::new(scope),
            "0".repeat(40),
            Utc::now(),
            None,
        )
    }

    fn engine() -> LifecycleEngine {
        LifecycleEngine::new(Arc::new(MemoryPoolStore::new()))
    }

    #[tokio::test]
    async fn civil_registration_happy_path() {
        let engine = engine();
        for i in 0..100 {
            engine.pre_generate(available(&format!("U{i:03}"), "foundational"), "pregen").await.unwrap();
        }

        let claimed = engine.claim(Some("foundational"), "CR", "pregen").await.unwrap().unwrap();
        assert_eq!(claimed.status, UinStatus::Preassigned);

        let assigned = engine.assign(claimed.uin.as_str(), "CR-2025-001234", "CR").await.unwrap();
        assert_eq!(assigned.status, UinStatus::Assigned);

        let looked_up = engine.lookup(claimed.uin.as_str()).await.unwrap().unwrap();
        assert_eq!(looked_up.status, UinStatus::Assigned);

        let audit = engine.audit(claimed.uin.as_str()).await.unwrap();
        let kinds: Vec<EventType> = audit.iter().map(|e| e.event_type).collect();
        assert_eq!(kinds, vec![EventType::Generated, EventType::Preassigned, EventType::Assigned]);
    }

    #[tokio::test]
    async fn concurrent_claims_hand_out_distinct_uins_and_no_more_than_available() {
        let engine = Arc::new(engine());
        for i in 0..10 {
            engine.pre_generate(available(&format!("C{i:03}"), "foundational"), "pregen").await.unwrap();
        }

        let mut handles = Vec::new();
        for i in 0..20 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.claim(None, &format!("worker-{i}"), "svc").await.unwrap()
            }));
        }
        let results = join_all(handles).await;
        let claimed: Vec<UinRecord> = results.into_iter().filter_map(|r| r.unwrap()).collect();

        assert_eq!(claimed.len(), 10);
        let mut seen = std::collections::HashSet::new();
        for r in &claimed {
            assert!(seen.insert(r.uin.as_str().to_string()));
        }
    }

    #[tokio::test]
    async fn assign_on_assigned_row_is_illegal_transition() {
        let engine = engine();
        engine.pre_generate(available("A1", "foundational"), "pregen").await.unwrap();
        engine.claim(None, "client-1", "svc").await.unwrap();
        engine.assign("A1", "ref-1", "svc").await.unwrap();

        let err = engine.assign("A1", "ref-2", "svc").await.unwrap_err();
        assert!(matches!(err, LifecycleError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn retire_allowed_directly_from_available() {
        let engine = engine();
        engine.pre_generate(available("A2", "foundational"), "pregen").await.unwrap();
        let retired = engine.retire("A2", "administrative", "ops").await.unwrap();
        assert_eq!(retired.status, UinStatus::Retired);
    }

    #[tokio::test]
    async fn claim_on_empty_pool_is_none_not_error() {
        let engine = engine();
        let result = engine.claim(None, "client-1", "svc").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn cleanup_stale_releases_old_preassignments_and_no_others() {
        let store = Arc::new(MemoryPoolStore::new());
        let engine = LifecycleEngine::new(store.clone());

        engine.pre_generate(available("S1", "foundational"), "pregen").await.unwrap();
        engine.pre_generate(available("S2", "foundational"), "pregen").await.unwrap();
        engine.pre_generate(available("S3", "foundational"), "pregen").await.unwrap();
        engine.claim(None, "c1", "svc").await.unwrap();
        engine.claim(None, "c2", "svc").await.unwrap();
        let fresh = engine.claim(None, "c3", "svc").await.unwrap().unwrap();

        // Backdate two of the three claims to simulate a 90-minute-old
        // preassignment; the third stays fresh and must survive cleanup.
        let old = Utc::now() - chrono::Duration::minutes(90);
        for uin in ["S1", "S2"] {
            let transition = Transition {
                new_status: UinStatus::Preassigned,
                claimed_by: Some("backdated".into()),
                claimed_at: Some(old),
                assigned_to_ref: None,
                assigned_at: None,
                event_type: EventType::StatusChanged,
                actor_system: "test-setup".into(),
                actor_ref: None,
                details: json!({}),
                now: old,
            };
            store.apply_transition(uin, transition).await.unwrap();
        }

        let released = engine.cleanup_stale(Duration::from_secs(60 * 60), "cleanup").await.unwrap();
        assert_eq!(released.len(), 2);
        for r in &released {
            assert_eq!(r.status, UinStatus::Available);
        }

        let untouched = engine.lookup(fresh.uin.as_str()).await.unwrap().unwrap();
        assert_eq!(untouched.status, UinStatus::Preassigned);
    }
}
