use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uinvault_domain::{AuditEntry, EventType, UinRecord, UinStatus};

use crate::error::StoreError;

/// The full set of fields written by a state-changing operation on a
/// `uin_pool` row, bundled with the audit entry it must commit alongside.
/// Every field here is the row's *final* value after the transition, not
/// a delta — callers always know the target state for the operation
/// they're performing.
#[derive(Debug, Clone)]
pub struct Transition {
    pub new_status: UinStatus,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub assigned_to_ref: Option<String>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub event_type: EventType,
    pub actor_system: String,
    pub actor_ref: Option<String>,
    pub details: Value,
    pub now: DateTime<Utc>,
}

/// Persistence surface over `uin_pool` and `uin_audit`. Every
/// state-changing method commits its row update and matching audit row
/// inside a single transaction; there is no way to perform one without
/// the other through this trait.
#[async_trait]
pub trait PoolStore: Send + Sync + 'static {
    /// Inserts a new row, normally at `AVAILABLE`. Fails with
    /// `DuplicateUin` if the uin already exists.
    async fn insert_pool_row(&self, record: &UinRecord) -> Result<(), StoreError>;

    /// Inserts a new row and its `GENERATED` audit entry in one
    /// transaction — the pre-generate/osia-generate path, which has no
    /// prior status to transition from.
    async fn insert_with_audit(
        &self,
        record: &UinRecord,
        actor_system: &str,
        actor_ref: Option<&str>,
        details: Value,
    ) -> Result<(), StoreError>;

    /// Locks and claims exactly one `AVAILABLE` row (optionally scoped),
    /// chosen by earliest `issued_at` among rows not already locked by a
    /// concurrent claim, moves it to `PREASSIGNED`, and writes the
    /// matching `PREASSIGNED` audit entry — all in one transaction.
    /// Returns `None` if the pool (within scope) has no available rows.
    async fn claim_one_available(
        &self,
        scope: Option<&str>,
        client_id: &str,
        actor_system: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UinRecord>, StoreError>;

    /// Applies `transition` to the row currently at `expected_status`,
    /// failing with `StoreError::NotFound` if the uin does not exist. The
    /// caller (Lifecycle Engine) is responsible for legality of the
    /// transition; this method performs the write unconditionally once
    /// the row is located, matching the precondition passed in.
    async fn apply_transition(&self, uin: &str, transition: Transition) -> Result<UinRecord, StoreError>;

    async fn find_by_uin(&self, uin: &str) -> Result<Option<UinRecord>, StoreError>;

    async fn list_audit(&self, uin: &str) -> Result<Vec<AuditEntry>, StoreError>;

    /// Rows in `status` whose `claimed_at` predates `older_than`.
    async fn list_stale_in_status(
        &self,
        status: UinStatus,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<UinRecord>, StoreError>;

    async fn aggregate_by_status(&self, scope: Option<&str>) -> Result<HashMap<UinStatus, i64>, StoreError>;
}
