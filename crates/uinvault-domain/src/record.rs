use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{Scope, Uin};
use crate::status::{EventType, UinMode, UinStatus};

/// Provenance of the randomness used to materialize a UIN, attached to
/// `UinRecord::meta` under the `"entropy"` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntropyProvenance {
    /// Human-readable description, e.g. "Utimaco Hardware TRNG".
    pub source: String,
    pub hardware: bool,
    /// FIPS 140-2/3 validation level, 0 (none) through 3.
    pub fips_level: u8,
    /// Short provider identifier, e.g. "utimaco" or "software-csprng".
    pub provider: String,
}

impl EntropyProvenance {
    pub fn software_fallback() -> Self {
        EntropyProvenance {
            source: "Software CSPRNG".into(),
            hardware: false,
            fips_level: 0,
            provider: "software-csprng".into(),
        }
    }
}

/// One row of the `uin_pool` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UinRecord {
    pub uin: Uin,
    pub mode: UinMode,
    pub scope: Scope,
    pub status: UinStatus,
    pub issued_at: DateTime<Utc>,
    pub not_before: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_transition_at: DateTime<Utc>,
    /// 40 hex char RIPEMD-160(SHA3-256(uin || salt)) integrity digest.
    pub hash_rmd160: String,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub assigned_to_ref: Option<String>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    /// Semi-structured bag of metadata; carries the entropy provenance
    /// record under `"entropy"` and any sector-token derivation metadata.
    #[serde(default)]
    pub meta: Value,
}

impl UinRecord {
    /// Construct a freshly pre-generated row at `Available`, as produced by
    /// the UIN generator and about to be inserted by the pool store.
    pub fn new_available(
        uin: Uin,
        mode: UinMode,
        scope: Scope,
        hash_rmd160: String,
        now: DateTime<Utc>,
        provenance: Option<EntropyProvenance>,
    ) -> Self {
        let meta = match provenance {
            Some(p) => serde_json::json!({ "entropy": p }),
            None => Value::Null,
        };
        UinRecord {
            uin,
            mode,
            scope,
            status: UinStatus::Available,
            issued_at: now,
            not_before: None,
            expires_at: None,
            last_transition_at: now,
            hash_rmd160,
            claimed_by: None,
            claimed_at: None,
            assigned_to_ref: None,
            assigned_at: None,
            transaction_id: None,
            attributes: HashMap::new(),
            meta,
        }
    }

    /// Invariant 3-5 of the data model, checked defensively wherever a row
    /// is read back from storage.
    pub fn respects_status_invariants(&self) -> bool {
        match self.status {
            UinStatus::Available => self.claimed_by.is_none() && self.assigned_to_ref.is_none(),
            UinStatus::Preassigned => {
                self.claimed_by.is_some()
                    && self.claimed_at.is_some()
                    && self.assigned_to_ref.is_none()
            }
            UinStatus::Assigned => self.assigned_to_ref.is_some(),
            UinStatus::Retired | UinStatus::Revoked => true,
        }
    }
}

/// One append-only row of the `uin_audit` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic sequence id, assigned by the store on insert (0 for rows
    /// not yet persisted).
    #[serde(default)]
    pub id: i64,
    pub uin: Uin,
    pub event_type: EventType,
    pub old_status: Option<UinStatus>,
    pub new_status: Option<UinStatus>,
    pub actor_system: String,
    pub actor_ref: Option<String>,
    #[serde(default)]
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        uin: Uin,
        event_type: EventType,
        old_status: Option<UinStatus>,
        new_status: Option<UinStatus>,
        actor_system: impl Into<String>,
        actor_ref: Option<String>,
        details: Value,
        now: DateTime<Utc>,
    ) -> Self {
        AuditEntry {
            id: 0,
            uin,
            event_type,
            old_status,
            new_status,
            actor_system: actor_system.into(),
            actor_ref,
            details,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uin(s: &str) -> Uin {
        Uin::new(s).unwrap()
    }

    #[test]
    fn available_row_has_no_claim_or_assignment() {
        let row = UinRecord::new_available(
            uin("FOUND0000000000001"),
            UinMode::Foundational,
            Scope::new("foundational"),
            "0".repeat(40),
            Utc::now(),
            None,
        );
        assert!(row.respects_status_invariants());
    }

    #[test]
    fn preassigned_without_claimed_at_violates_invariant() {
        let mut row = UinRecord::new_available(
            uin("FOUND0000000000002"),
            UinMode::Foundational,
            Scope::new("foundational"),
            "0".repeat(40),
            Utc::now(),
            None,
        );
        row.status = UinStatus::Preassigned;
        row.claimed_by = Some("client-a".into());
        assert!(!row.respects_status_invariants());
    }
}
