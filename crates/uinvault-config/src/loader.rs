use std::path::Path;

use tracing::debug;
use uinvault_crypto::{normalize_sector, ChecksumAlgorithm, Charset};
use uinvault_domain::UinMode;

use crate::config::{HsmConfig, PoolConfig, SecretManagerAuth, SecretManagerConfig, ServiceConfig};
use crate::error::ConfigError;
use crate::raw::RawConfig;

/// Reads and parses the service configuration file at `path`.
pub fn load_from_path(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let path_display = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io { path: path_display.clone(), source: e })?;
    let raw: RawConfig = toml::from_str(&content).map_err(|e| ConfigError::TomlParse { path: path_display.clone(), source: e })?;
    debug!(path = %path_display, "loaded service configuration");
    convert(raw, &path_display)
}

fn convert(raw: RawConfig, path: &str) -> Result<ServiceConfig, ConfigError> {
    let default_mode = parse_mode(&raw.default_mode, path)?;
    let default_charset = Charset::parse(&raw.default_charset)?;
    let checksum_algorithm = parse_checksum_algorithm(&raw.checksum_algorithm, path)?;

    let hsm = HsmConfig {
        enabled: raw.hsm_enabled,
        provider: raw.hsm_provider,
        library_path: raw.hsm_library_path,
        slot: raw.hsm_slot,
        pin: raw.hsm_pin,
        key_label: raw.hsm_key_label,
    };

    let secret_manager = match raw.secret_manager_address {
        Some(address) => {
            let auth = match (raw.secret_manager_token, raw.role_id, raw.secret_id) {
                (Some(token), _, _) => SecretManagerAuth::StaticToken(token),
                (None, Some(role_id), Some(secret_id)) => SecretManagerAuth::RoleSecret { role_id, secret_id },
                _ => {
                    return Err(ConfigError::Conversion {
                        path: path.to_string(),
                        message: "secret_manager_address set but neither secret_manager_token nor (role_id, secret_id) provided".into(),
                    })
                }
            };
            Some(SecretManagerConfig {
                address,
                auth,
                namespace: raw.namespace,
                mount_path: raw.mount_path.unwrap_or_else(|| "secret".to_string()),
            })
        }
        None => None,
    };

    let pool = PoolConfig {
        min: raw.pool_min.unwrap_or(1),
        max: raw.pool_max.unwrap_or(10),
        acquire_timeout_ms: raw.acquire_timeout_ms.unwrap_or(5_000),
        idle_timeout_ms: raw.idle_timeout_ms.unwrap_or(600_000),
    };

    let mut sector_secrets = std::collections::HashMap::with_capacity(raw.sector_secrets.len());
    for (sector, hex_value) in raw.sector_secrets {
        let bytes = hex::decode(&hex_value).map_err(|e| ConfigError::Conversion {
            path: path.to_string(),
            message: format!("sector_secrets.{sector} is not valid hex: {e}"),
        })?;
        sector_secrets.insert(normalize_sector(&sector), bytes);
    }

    Ok(ServiceConfig {
        default_mode,
        default_length: raw.default_length,
        default_charset,
        checksum_algorithm,
        supported_sectors: raw.supported_sectors,
        hsm,
        secret_manager,
        database_url: raw.database_url,
        pool,
        sector_secrets,
    })
}

fn parse_mode(s: &str, path: &str) -> Result<UinMode, ConfigError> {
    match s {
        "foundational" => Ok(UinMode::Foundational),
        "random" => Ok(UinMode::Random),
        "structured" => Ok(UinMode::Structured),
        "sector_token" => Ok(UinMode::SectorToken),
        other => Err(ConfigError::Conversion { path: path.to_string(), message: format!("unknown default_mode '{other}'") }),
    }
}

fn parse_checksum_algorithm(s: &str, path: &str) -> Result<Option<ChecksumAlgorithm>, ConfigError> {
    match s {
        "none" => Ok(None),
        "iso7064" => Ok(Some(ChecksumAlgorithm::Iso7064)),
        "iso7064mod97" => Ok(Some(ChecksumAlgorithm::Iso7064Mod97)),
        other => {
            if let Some(modulus) = other.strip_prefix("mod_n:") {
                let n: u32 = modulus.parse().map_err(|_| ConfigError::Conversion {
                    path: path.to_string(),
                    message: format!("invalid modulus in checksum_algorithm '{other}'"),
                })?;
                Ok(Some(ChecksumAlgorithm::ModN(n)))
            } else {
                Err(ConfigError::Conversion { path: path.to_string(), message: format!("unknown checksum_algorithm '{other}'") })
            }
        }
    }
}
