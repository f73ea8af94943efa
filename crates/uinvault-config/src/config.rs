use std::collections::HashMap;

use uinvault_crypto::{ChecksumAlgorithm, Charset};
use uinvault_domain::UinMode;

#[derive(Debug, Clone)]
pub struct HsmConfig {
    pub enabled: bool,
    pub provider: Option<String>,
    pub library_path: Option<String>,
    pub slot: Option<u64>,
    pub pin: Option<String>,
    pub key_label: Option<String>,
}

/// Authentication for the remote secret manager. Mirrors
/// `uinvault_secrets::RemoteAuth`, but as plain strings — wrapping in
/// `secrecy::Secret` happens where the backend is actually constructed.
#[derive(Debug, Clone)]
pub enum SecretManagerAuth {
    StaticToken(String),
    RoleSecret { role_id: String, secret_id: String },
}

#[derive(Debug, Clone)]
pub struct SecretManagerConfig {
    pub address: String,
    pub auth: SecretManagerAuth,
    pub namespace: Option<String>,
    pub mount_path: String,
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub min: u32,
    pub max: u32,
    pub acquire_timeout_ms: u64,
    pub idle_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig { min: 1, max: 10, acquire_timeout_ms: 5_000, idle_timeout_ms: 600_000 }
    }
}

/// Fully parsed, ready-to-use service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub default_mode: UinMode,
    pub default_length: usize,
    pub default_charset: Charset,
    pub checksum_algorithm: Option<ChecksumAlgorithm>,
    pub supported_sectors: Vec<String>,
    pub hsm: HsmConfig,
    pub secret_manager: Option<SecretManagerConfig>,
    pub database_url: Option<String>,
    pub pool: PoolConfig,
    /// Fallback sector secrets, decoded from hex, used when no secret
    /// manager is configured.
    pub sector_secrets: HashMap<String, Vec<u8>>,
}
