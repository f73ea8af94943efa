use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Raw TOML representation of the service configuration file.
#[derive(Debug, Deserialize, Serialize)]
pub struct RawConfig {
    #[serde(default = "default_mode")]
    pub default_mode: String,
    #[serde(default = "default_length")]
    pub default_length: usize,
    #[serde(default = "default_charset")]
    pub default_charset: String,
    /// `"none"`, `"iso7064"`, `"iso7064mod97"`, or `"mod_n:<modulus>"`.
    #[serde(default = "default_checksum")]
    pub checksum_algorithm: String,
    #[serde(default)]
    pub supported_sectors: Vec<String>,

    #[serde(default)]
    pub hsm_enabled: bool,
    pub hsm_provider: Option<String>,
    pub hsm_library_path: Option<String>,
    pub hsm_slot: Option<u64>,
    pub hsm_pin: Option<String>,
    pub hsm_key_label: Option<String>,

    pub secret_manager_address: Option<String>,
    pub secret_manager_token: Option<String>,
    pub role_id: Option<String>,
    pub secret_id: Option<String>,
    pub namespace: Option<String>,
    pub mount_path: Option<String>,

    /// Postgres connection string for the pool store. Absent means run
    /// against an in-memory store (local development, tests).
    pub database_url: Option<String>,
    pub pool_min: Option<u32>,
    pub pool_max: Option<u32>,
    pub acquire_timeout_ms: Option<u64>,
    pub idle_timeout_ms: Option<u64>,

    /// Hex-encoded fallback sector secrets, used when no secret manager
    /// is configured.
    #[serde(default)]
    pub sector_secrets: HashMap<String, String>,
}

fn default_mode() -> String {
    "foundational".to_string()
}

fn default_length() -> usize {
    19
}

fn default_charset() -> String {
    "safe".to_string()
}

fn default_checksum() -> String {
    "iso7064".to_string()
}
