use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uinvault_domain::{AuditEntry, EventType, Scope, Uin, UinMode, UinRecord, UinStatus};

use crate::error::StoreError;
use crate::pool_store::{PoolStore, Transition};

// Idempotent DDL, run on every `connect()`. Matches the storage schema:
// row-level locking with skip-busy on claim, plus the indexes called out
// for `uin_pool`/`uin_audit` lookups.
const MIGRATIONS: &str = r#"
CREATE TABLE IF NOT EXISTS uin_pool (
    uin                 TEXT PRIMARY KEY,
    mode                TEXT NOT NULL,
    scope               TEXT NOT NULL,
    status              TEXT NOT NULL,
    issued_at           TIMESTAMPTZ NOT NULL,
    not_before          TIMESTAMPTZ,
    expires_at          TIMESTAMPTZ,
    last_transition_at  TIMESTAMPTZ NOT NULL,
    hash_rmd160         TEXT NOT NULL,
    claimed_by          TEXT,
    claimed_at          TIMESTAMPTZ,
    assigned_to_ref     TEXT,
    assigned_at         TIMESTAMPTZ,
    transaction_id      TEXT,
    attributes          JSONB NOT NULL DEFAULT '{}'::jsonb,
    meta                JSONB NOT NULL DEFAULT '{}'::jsonb
);
CREATE INDEX IF NOT EXISTS idx_uin_pool_status ON uin_pool (status);
CREATE INDEX IF NOT EXISTS idx_uin_pool_scope_status ON uin_pool (scope, status);
CREATE INDEX IF NOT EXISTS idx_uin_pool_claimed_by_status ON uin_pool (claimed_by, status);
CREATE INDEX IF NOT EXISTS idx_uin_pool_expires_at ON uin_pool (expires_at);
CREATE INDEX IF NOT EXISTS idx_uin_pool_hash_rmd160 ON uin_pool (hash_rmd160);
CREATE INDEX IF NOT EXISTS idx_uin_pool_transaction_id ON uin_pool (transaction_id);

CREATE TABLE IF NOT EXISTS uin_audit (
    id           BIGSERIAL PRIMARY KEY,
    uin          TEXT NOT NULL REFERENCES uin_pool (uin),
    event_type   TEXT NOT NULL,
    old_status   TEXT,
    new_status   TEXT,
    actor_system TEXT NOT NULL,
    actor_ref    TEXT,
    details      JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at   TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_uin_audit_uin ON uin_audit (uin);
CREATE INDEX IF NOT EXISTS idx_uin_audit_event_type ON uin_audit (event_type);
CREATE INDEX IF NOT EXISTS idx_uin_audit_created_at ON uin_audit (created_at);
CREATE INDEX IF NOT EXISTS idx_uin_audit_actor_system ON uin_audit (actor_system);
"#;

/// `PoolStore` backed by PostgreSQL. Claims use
/// `SELECT ... FOR UPDATE SKIP LOCKED` so concurrent workers never block
/// on each other for the same row; each state-changing method commits its
/// row update and audit insert inside one transaction.
#[derive(Clone)]
pub struct PostgresPoolStore {
    pool: PgPool,
}

/// Connection pool sizing, mirrored from configuration.
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    pub min_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout: std::time::Duration,
    pub idle_timeout: std::time::Duration,
}

impl PostgresPoolStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(url).await.map_err(|e| StoreError::Internal(format!("connect: {e}")))?;
        let store = PostgresPoolStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn connect_with(url: &str, options: PoolOptions) -> Result<Self, StoreError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .min_connections(options.min_connections)
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .idle_timeout(options.idle_timeout)
            .connect(url)
            .await
            .map_err(|e| StoreError::Internal(format!("connect: {e}")))?;
        let store = PostgresPoolStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        PostgresPoolStore { pool }
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(MIGRATIONS).execute(&self.pool).await.map_err(|e| StoreError::Internal(format!("migration: {e}")))?;
        Ok(())
    }
}

fn row_to_record(row: PgPoolRow) -> Result<UinRecord, StoreError> {
    Ok(UinRecord {
        uin: Uin::new(row.uin).map_err(|e| StoreError::Internal(e.to_string()))?,
        mode: parse_mode(&row.mode)?,
        scope: Scope::new(row.scope),
        status: parse_status(&row.status)?,
        issued_at: row.issued_at,
        not_before: row.not_before,
        expires_at: row.expires_at,
        last_transition_at: row.last_transition_at,
        hash_rmd160: row.hash_rmd160,
        claimed_by: row.claimed_by,
        claimed_at: row.claimed_at,
        assigned_to_ref: row.assigned_to_ref,
        assigned_at: row.assigned_at,
        transaction_id: row.transaction_id,
        attributes: serde_json::from_value(row.attributes).unwrap_or_default(),
        meta: row.meta,
    })
}

fn parse_mode(s: &str) -> Result<UinMode, StoreError> {
    match s {
        "foundational" => Ok(UinMode::Foundational),
        "random" => Ok(UinMode::Random),
        "structured" => Ok(UinMode::Structured),
        "sector_token" => Ok(UinMode::SectorToken),
        other => Err(StoreError::Internal(format!("unrecognized mode '{other}' in storage"))),
    }
}

fn mode_str(m: UinMode) -> &'static str {
    match m {
        UinMode::Foundational => "foundational",
        UinMode::Random => "random",
        UinMode::Structured => "structured",
        UinMode::SectorToken => "sector_token",
    }
}

fn parse_status(s: &str) -> Result<UinStatus, StoreError> {
    match s {
        "AVAILABLE" => Ok(UinStatus::Available),
        "PREASSIGNED" => Ok(UinStatus::Preassigned),
        "ASSIGNED" => Ok(UinStatus::Assigned),
        "RETIRED" => Ok(UinStatus::Retired),
        "REVOKED" => Ok(UinStatus::Revoked),
        other => Err(StoreError::Internal(format!("unrecognized status '{other}' in storage"))),
    }
}

fn event_type_str(e: EventType) -> &'static str {
    match e {
        EventType::Generated => "GENERATED",
        EventType::Preassigned => "PREASSIGNED",
        EventType::Assigned => "ASSIGNED",
        EventType::Released => "RELEASED",
        EventType::Retired => "RETIRED",
        EventType::Revoked => "REVOKED",
        EventType::StatusChanged => "STATUS_CHANGED",
    }
}

fn parse_event_type(s: &str) -> Result<EventType, StoreError> {
    match s {
        "GENERATED" => Ok(EventType::Generated),
        "PREASSIGNED" => Ok(EventType::Preassigned),
        "ASSIGNED" => Ok(EventType::Assigned),
        "RELEASED" => Ok(EventType::Released),
        "RETIRED" => Ok(EventType::Retired),
        "REVOKED" => Ok(EventType::Revoked),
        "STATUS_CHANGED" => Ok(EventType::StatusChanged),
        other => Err(StoreError::Internal(format!("unrecognized event_type '{other}' in storage"))),
    }
}

#[derive(sqlx::FromRow)]
struct PgAuditRow {
    id: i64,
    uin: String,
    event_type: String,
    old_status: Option<String>,
    new_status: Option<String>,
    actor_system: String,
    actor_ref: Option<String>,
    details: serde_json::Value,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct PgPoolRow {
    uin: String,
    mode: String,
    scope: String,
    status: String,
    issued_at: DateTime<Utc>,
    not_before: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    last_transition_at: DateTime<Utc>,
    hash_rmd160: String,
    claimed_by: Option<String>,
    claimed_at: Option<DateTime<Utc>>,
    assigned_to_ref: Option<String>,
    assigned_at: Option<DateTime<Utc>>,
    transaction_id: Option<String>,
    attributes: serde_json::Value,
    meta: serde_json::Value,
}

#[async_trait]
impl PoolStore for PostgresPoolStore {
    async fn insert_pool_row(&self, record: &UinRecord) -> Result<(), StoreError> {
        let attrs = serde_json::to_value(&record.attributes)?;
        let result = sqlx::query(
            "INSERT INTO uin_pool
                (uin, mode, scope, status, issued_at, not_before, expires_at, last_transition_at,
                 hash_rmd160, claimed_by, claimed_at, assigned_to_ref, assigned_at, transaction_id,
                 attributes, meta)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16)",
        )
        .bind(record.uin.as_str())
        .bind(mode_str(record.mode))
        .bind(record.scope.as_str())
        .bind(record.status.to_string())
        .bind(record.issued_at)
        .bind(record.not_before)
        .bind(record.expires_at)
        .bind(record.last_transition_at)
        .bind(&record.hash_rmd160)
        .bind(&record.claimed_by)
        .bind(record.claimed_at)
        .bind(&record.assigned_to_ref)
        .bind(record.assigned_at)
        .bind(&record.transaction_id)
        .bind(&attrs)
        .bind(&record.meta)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::DuplicateUin(record.uin.as_str().to_string()))
            }
            Err(e) => Err(StoreError::Internal(e.to_string())),
        }
    }

    async fn insert_with_audit(
        &self,
        record: &UinRecord,
        actor_system: &str,
        actor_ref: Option<&str>,
        details: serde_json::Value,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| StoreError::Internal(e.to_string()))?;
        let attrs = serde_json::to_value(&record.attributes)?;

        let result = sqlx::query(
            "INSERT INTO uin_pool
                (uin, mode, scope, status, issued_at, not_before, expires_at, last_transition_at,
                 hash_rmd160, claimed_by, claimed_at, assigned_to_ref, assigned_at, transaction_id,
                 attributes, meta)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16)",
        )
        .bind(record.uin.as_str())
        .bind(mode_str(record.mode))
        .bind(record.scope.as_str())
        .bind(record.status.to_string())
        .bind(record.issued_at)
        .bind(record.not_before)
        .bind(record.expires_at)
        .bind(record.last_transition_at)
        .bind(&record.hash_rmd160)
        .bind(&record.claimed_by)
        .bind(record.claimed_at)
        .bind(&record.assigned_to_ref)
        .bind(record.assigned_at)
        .bind(&record.transaction_id)
        .bind(&attrs)
        .bind(&record.meta)
        .execute(&mut *tx)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(StoreError::DuplicateUin(record.uin.as_str().to_string()))
            }
            Err(e) => return Err(StoreError::Internal(e.to_string())),
        }

        sqlx::query(
            "INSERT INTO uin_audit (uin, event_type, old_status, new_status, actor_system, actor_ref, details, created_at)
             VALUES ($1,'GENERATED',NULL,$2,$3,$4,$5,$6)",
        )
        .bind(record.uin.as_str())
        .bind(record.status.to_string())
        .bind(actor_system)
        .bind(actor_ref)
        .bind(&details)
        .bind(record.issued_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;

        tx.commit().await.map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn claim_one_available(
        &self,
        scope: Option<&str>,
        client_id: &str,
        actor_system: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UinRecord>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| StoreError::Internal(e.to_string()))?;

        let row: Option<PgPoolRow> = match scope {
            Some(s) => sqlx::query_as(
                "SELECT * FROM uin_pool WHERE status = 'AVAILABLE' AND scope = $1
                 ORDER BY issued_at ASC
                 FOR UPDATE SKIP LOCKED LIMIT 1",
            )
            .bind(s)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?,
            None => sqlx::query_as(
                "SELECT * FROM uin_pool WHERE status = 'AVAILABLE'
                 ORDER BY issued_at ASC
                 FOR UPDATE SKIP LOCKED LIMIT 1",
            )
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?,
        };

        let Some(row) = row else {
            tx.commit().await.map_err(|e| StoreError::Internal(e.to_string()))?;
            return Ok(None);
        };

        sqlx::query(
            "UPDATE uin_pool SET status = 'PREASSIGNED', claimed_by = $1, claimed_at = $2,
             last_transition_at = $2 WHERE uin = $3",
        )
        .bind(client_id)
        .bind(now)
        .bind(&row.uin)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;

        sqlx::query(
            "INSERT INTO uin_audit (uin, event_type, old_status, new_status, actor_system, actor_ref, details, created_at)
             VALUES ($1,'PREASSIGNED','AVAILABLE','PREASSIGNED',$2,$3,'{}'::jsonb,$4)",
        )
        .bind(&row.uin)
        .bind(actor_system)
        .bind(client_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;

        tx.commit().await.map_err(|e| StoreError::Internal(e.to_string()))?;

        let mut record = row_to_record(row)?;
        record.status = UinStatus::Preassigned;
        record.claimed_by = Some(client_id.to_string());
        record.claimed_at = Some(now);
        record.last_transition_at = now;
        Ok(Some(record))
    }

    async fn apply_transition(&self, uin: &str, transition: Transition) -> Result<UinRecord, StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| StoreError::Internal(e.to_string()))?;

        let existing: Option<PgPoolRow> = sqlx::query_as("SELECT * FROM uin_pool WHERE uin = $1 FOR UPDATE")
            .bind(uin)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let existing = existing.ok_or_else(|| StoreError::NotFound(uin.to_string()))?;
        let old_status = parse_status(&existing.status)?;

        sqlx::query(
            "UPDATE uin_pool SET status = $1, claimed_by = $2, claimed_at = $3,
             assigned_to_ref = $4, assigned_at = $5, last_transition_at = $6 WHERE uin = $7",
        )
        .bind(transition.new_status.to_string())
        .bind(&transition.claimed_by)
        .bind(transition.claimed_at)
        .bind(&transition.assigned_to_ref)
        .bind(transition.assigned_at)
        .bind(transition.now)
        .bind(uin)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;

        sqlx::query(
            "INSERT INTO uin_audit (uin, event_type, old_status, new_status, actor_system, actor_ref, details, created_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8)",
        )
        .bind(uin)
        .bind(event_type_str(transition.event_type))
        .bind(old_status.to_string())
        .bind(transition.new_status.to_string())
        .bind(&transition.actor_system)
        .bind(&transition.actor_ref)
        .bind(&transition.details)
        .bind(transition.now)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;

        tx.commit().await.map_err(|e| StoreError::Internal(e.to_string()))?;

        let mut record = row_to_record(existing)?;
        record.status = transition.new_status;
        record.claimed_by = transition.claimed_by;
        record.claimed_at = transition.claimed_at;
        record.assigned_to_ref = transition.assigned_to_ref;
        record.assigned_at = transition.assigned_at;
        record.last_transition_at = transition.now;
        Ok(record)
    }

    async fn find_by_uin(&self, uin: &str) -> Result<Option<UinRecord>, StoreError> {
        let row: Option<PgPoolRow> = sqlx::query_as("SELECT * FROM uin_pool WHERE uin = $1")
            .bind(uin)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        row.map(row_to_record).transpose()
    }

    async fn list_audit(&self, uin: &str) -> Result<Vec<AuditEntry>, StoreError> {
        let rows: Vec<PgAuditRow> = sqlx::query_as(
            "SELECT id, uin, event_type, old_status, new_status, actor_system, actor_ref, details, created_at
             FROM uin_audit WHERE uin = $1 ORDER BY id ASC",
        )
        .bind(uin)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;

        rows.into_iter()
            .map(|r| {
                Ok(AuditEntry {
                    id: r.id,
                    uin: Uin::new(r.uin).map_err(|e| StoreError::Internal(e.to_string()))?,
                    event_type: parse_event_type(&r.event_type)?,
                    old_status: r.old_status.map(|s| parse_status(&s)).transpose()?,
                    new_status: r.new_status.map(|s| parse_status(&s)).transpose()?,
                    actor_system: r.actor_system,
                    actor_ref: r.actor_ref,
                    details: r.details,
                    created_at: r.created_at,
                })
            })
            .collect()
    }

    async fn list_stale_in_status(
        &self,
        status: UinStatus,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<UinRecord>, StoreError> {
        let rows: Vec<PgPoolRow> = sqlx::query_as(
            "SELECT * FROM uin_pool WHERE status = $1 AND claimed_at IS NOT NULL AND claimed_at < $2",
        )
        .bind(status.to_string())
        .bind(older_than)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;
        rows.into_iter().map(row_to_record).collect()
    }

    async fn aggregate_by_status(&self, scope: Option<&str>) -> Result<HashMap<UinStatus, i64>, StoreError> {
        let rows: Vec<(String, i64)> = match scope {
            Some(s) => sqlx::query_as("SELECT status, COUNT(*) FROM uin_pool WHERE scope = $1 GROUP BY status")
                .bind(s)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StoreError::Internal(e.to_string()))?,
            None => sqlx::query_as("SELECT status, COUNT(*) FROM uin_pool GROUP BY status")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StoreError::Internal(e.to_string()))?,
        };
        let mut out = HashMap::new();
        for (status, count) in rows {
            out.insert(parse_status(&status)?, count);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use uinvault_domain::{EventType, Scope, UinMode};

    async fn test_pool() -> Option<PostgresPoolStore> {
        let url = env::var("TEST_DATABASE_URL").ok()?;
        Some(PostgresPoolStore::connect(&url).await.expect("connect to test database"))
    }

    #[tokio::test]
    async fn claim_then_assign_round_trips_through_postgres() {
        let Some(store) = test_pool().await else {
            eprintln!("skipping: TEST_DATABASE_URL not set");
            return;
        };

        let now = Utc::now();
        let uin = format!("PGTEST{}", now.timestamp_nanos_opt().unwrap_or(0));
        let record = UinRecord::new_available(
            Uin::new(uin.clone()).unwrap(),
            UinMode::Foundational,
            Scope::new("foundational"),
            "0".repeat(40),
            now,
            None,
        );
        store.insert_pool_row(&record).await.unwrap();

        let claimed = store.claim_one_available(None, "client-x", "svc", now).await.unwrap();
        assert!(claimed.is_some());

        let transition = Transition {
            new_status: UinStatus::Assigned,
            claimed_by: Some("client-x".into()),
            claimed_at: Some(now),
            assigned_to_ref: Some("ref-1".into()),
            assigned_at: Some(now),
            event_type: EventType::Assigned,
            actor_system: "svc".into(),
            actor_ref: Some("ref-1".into()),
            details: serde_json::json!({}),
            now,
        };
        let assigned = store.apply_transition(&uin, transition).await.unwrap();
        assert_eq!(assigned.status, UinStatus::Assigned);

        let audit = store.list_audit(&uin).await.unwrap();
        assert_eq!(audit.len(), 2);
    }
}
