use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, Secret};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uinvault_crypto::normalize_sector;

use crate::backend::{SecretBackend, SectorSecret};
use crate::error::SecretError;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct CacheEntry {
    values: HashMap<String, SectorSecret>,
    cached_at: Instant,
}

/// Front door for sector-secret reads. Wraps whichever backend won
/// selection at startup (remote preferred, local on auth/transport
/// failure) behind a TTL cache with explicit invalidation via `reload()`.
pub struct SecretStoreAdapter {
    backend: Arc<dyn SecretBackend>,
    ttl: Duration,
    cache: RwLock<Option<CacheEntry>>,
}

impl SecretStoreAdapter {
    /// Tries `remote` first if present; on any failure (auth or
    /// transport), degrades to `local` with a warning instead of failing
    /// startup.
    pub async fn init(
        remote: Option<Arc<dyn SecretBackend>>,
        local: Arc<dyn SecretBackend>,
        ttl: Duration,
    ) -> Self {
        let backend: Arc<dyn SecretBackend> = match remote {
            Some(r) => match r.get_sector_secrets().await {
                Ok(_) => {
                    info!(backend = r.name(), "secret backend selected");
                    r
                }
                Err(e) => {
                    warn!(error = %e, "remote secret manager unavailable at startup, falling back to local backend");
                    local
                }
            },
            None => local,
        };
        SecretStoreAdapter { backend, ttl, cache: RwLock::new(None) }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    async fn refresh(&self) -> Result<HashMap<String, SectorSecret>, SecretError> {
        let values = self.backend.get_sector_secrets().await?;
        let snapshot = clone_map(&values);
        *self.cache.write().await = Some(CacheEntry { values, cached_at: Instant::now() });
        Ok(snapshot)
    }

    pub async fn get_sector_secrets(&self) -> Result<HashMap<String, SectorSecret>, SecretError> {
        {
            let guard = self.cache.read().await;
            if let Some(entry) = guard.as_ref() {
                if entry.cached_at.elapsed() < self.ttl {
                    return Ok(clone_map(&entry.values));
                }
            }
        }
        self.refresh().await
    }

    pub async fn get(&self, sector: &str) -> Result<SectorSecret, SecretError> {
        let normalized = normalize_sector(sector);
        let all = self.get_sector_secrets().await?;
        all.into_iter()
            .find(|(k, _)| *k == normalized)
            .map(|(_, v)| v)
            .ok_or_else(|| SecretError::NotFound(sector.to_string()))
    }

    /// Invalidates the cache and forces a fresh read on the next access.
    pub async fn reload(&self) -> Result<(), SecretError> {
        self.backend.reload().await?;
        *self.cache.write().await = None;
        self.refresh().await?;
        Ok(())
    }
}

fn clone_map(values: &HashMap<String, SectorSecret>) -> HashMap<String, SectorSecret> {
    values.iter().map(|(k, v)| (k.clone(), Secret::new(v.expose_secret().clone()))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalSecretBackend;

    #[tokio::test]
    async fn serves_from_local_backend_when_no_remote_configured() {
        let mut raw = HashMap::new();
        raw.insert("health".to_string(), b"x".repeat(32));
        let local = Arc::new(LocalSecretBackend::new(raw));
        let adapter = SecretStoreAdapter::init(None, local, DEFAULT_TTL).await;
        assert_eq!(adapter.backend_name(), "local");
        let secret = adapter.get("health").await.unwrap();
        assert_eq!(secret.expose_secret().len(), 32);
    }

    #[tokio::test]
    async fn get_normalizes_sector_casing_and_whitespace() {
        let mut raw = HashMap::new();
        raw.insert("health".to_string(), b"x".repeat(32));
        let local = Arc::new(LocalSecretBackend::new(raw));
        let adapter = SecretStoreAdapter::init(None, local, DEFAULT_TTL).await;
        let secret = adapter.get(" Health ").await.unwrap();
        assert_eq!(secret.expose_secret().len(), 32);
    }

    #[tokio::test]
    async fn cache_serves_repeated_reads_without_missing_sectors() {
        let mut raw = HashMap::new();
        raw.insert("tax".to_string(), b"y".repeat(32));
        let local = Arc::new(LocalSecretBackend::new(raw));
        let adapter = SecretStoreAdapter::init(None, local, Duration::from_secs(60)).await;
        let a = adapter.get("tax").await.unwrap();
        let b = adapter.get("tax").await.unwrap();
        assert_eq!(a.expose_secret(), b.expose_secret());
    }
}
