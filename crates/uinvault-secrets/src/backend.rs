use std::collections::HashMap;

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use uinvault_crypto::normalize_sector;

use crate::error::SecretError;

pub type SectorSecret = Secret<Vec<u8>>;

/// Uniform surface over a sector-secret source, whether backed by a
/// remote secret manager or local configuration. Implementations never
/// log secret material; only sector names appear in error messages.
#[async_trait]
pub trait SecretBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get_sector_secrets(&self) -> Result<HashMap<String, SectorSecret>, SecretError>;

    async fn get(&self, sector: &str) -> Result<SectorSecret, SecretError> {
        let normalized = normalize_sector(sector);
        let all = self.get_sector_secrets().await?;
        all.get(&normalized)
            .map(|s| Secret::new(s.expose_secret().clone()))
            .ok_or_else(|| SecretError::NotFound(sector.to_string()))
    }

    async fn reload(&self) -> Result<(), SecretError>;
}
