use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use secrecy::Secret;
use uinvault_config::{SecretManagerAuth, ServiceConfig};
use uinvault_entropy::{EntropyRegistry, PRIORITY_ORDER};
use uinvault_lifecycle::LifecycleEngine;
use uinvault_secrets::{LocalSecretBackend, RemoteAuth, RemoteSecretBackend, SecretBackend, SecretStoreAdapter};
use uinvault_service::{GenerationDefaults, UinVaultService};
use uinvault_store::{MemoryPoolStore, PoolOptions, PoolStore, PostgresPoolStore};

/// Builds the fully wired façade from a loaded configuration: selects and
/// probes the entropy provider, assembles the secret backend (remote with
/// local fallback, or local-only), connects the pool store (Postgres if
/// `database_url` is set, otherwise an in-memory store for local runs),
/// and constructs the lifecycle engine on top.
pub async fn build_service(config: &ServiceConfig) -> Result<UinVaultService> {
    let entropy = Arc::new(build_entropy(config).await?);
    let secrets = Arc::new(build_secrets(config).await);
    let pool_store = build_pool_store(config).await?;
    let lifecycle = Arc::new(LifecycleEngine::new(pool_store));
    let defaults = GenerationDefaults {
        default_mode: config.default_mode,
        default_length: config.default_length,
        default_charset: config.default_charset.clone(),
        checksum_algorithm: config.checksum_algorithm,
    };
    Ok(UinVaultService::new(entropy, secrets, lifecycle, defaults))
}

async fn build_entropy(config: &ServiceConfig) -> Result<EntropyRegistry> {
    if !config.hsm.enabled {
        let mut registry = EntropyRegistry::new(vec![]);
        registry.init_auto().await;
        return Ok(registry);
    }

    let mut library_paths = HashMap::new();
    if let (Some(provider), Some(path)) = (&config.hsm.provider, &config.hsm.library_path) {
        let family_name = PRIORITY_ORDER
            .iter()
            .map(|f| f.name)
            .find(|name| *name == provider.as_str())
            .with_context(|| format!("unknown hsm_provider '{provider}'"))?;
        library_paths.insert(family_name, PathBuf::from(path));
    }
    let mut registry = EntropyRegistry::with_builtin_priority(library_paths);
    match &config.hsm.provider {
        Some(name) => registry
            .init_pinned(name)
            .await
            .with_context(|| format!("failed to initialize pinned entropy provider '{name}'"))?,
        None => registry.init_auto().await,
    }
    Ok(registry)
}

async fn build_secrets(config: &ServiceConfig) -> SecretStoreAdapter {
    let local = Arc::new(LocalSecretBackend::new(config.sector_secrets.clone()));
    let remote: Option<Arc<dyn SecretBackend>> = config.secret_manager.as_ref().map(|sm| {
        let auth = match &sm.auth {
            SecretManagerAuth::StaticToken(token) => RemoteAuth::StaticToken(Secret::new(token.clone())),
            SecretManagerAuth::RoleSecret { role_id, secret_id } => {
                RemoteAuth::RoleSecret { role_id: role_id.clone(), secret_id: Secret::new(secret_id.clone()) }
            }
        };
        Arc::new(RemoteSecretBackend::new(sm.address.clone(), sm.mount_path.clone(), sm.namespace.clone(), auth))
            as Arc<dyn SecretBackend>
    });
    SecretStoreAdapter::init(remote, local, uinvault_secrets::DEFAULT_TTL).await
}

async fn build_pool_store(config: &ServiceConfig) -> Result<Arc<dyn PoolStore>> {
    match &config.database_url {
        Some(url) => {
            let options = PoolOptions {
                min_connections: config.pool.min,
                max_connections: config.pool.max,
                acquire_timeout: Duration::from_millis(config.pool.acquire_timeout_ms),
                idle_timeout: Duration::from_millis(config.pool.idle_timeout_ms),
            };
            let store = PostgresPoolStore::connect_with(url, options)
                .await
                .context("failed to connect to the pool database")?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemoryPoolStore::new())),
    }
}
