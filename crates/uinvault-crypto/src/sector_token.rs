use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use subtle::ConstantTimeEq;

use crate::charset::Charset;
use crate::error::CryptoError;

const DEFAULT_ALGORITHM: &str = "sha256";
const DEFAULT_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub struct SectorTokenRequest {
    pub foundational_uin: String,
    pub sector: String,
    pub token_length: usize,
    pub salt: String,
    pub version: u32,
    pub algorithm: String,
    pub charset: Charset,
}

impl SectorTokenRequest {
    pub fn new(foundational_uin: impl Into<String>, sector: impl Into<String>, token_length: usize) -> Self {
        SectorTokenRequest {
            foundational_uin: foundational_uin.into(),
            sector: sector.into(),
            token_length,
            salt: String::new(),
            version: DEFAULT_VERSION,
            algorithm: DEFAULT_ALGORITHM.to_string(),
            charset: Charset::Safe,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorTokenMetadata {
    pub salt: String,
    pub version: u32,
    pub algorithm: String,
    pub token_length: usize,
}

/// Normal form for sector names: trimmed, lowercased. Used both as the
/// HMAC message component here and as the lookup key into sector secret
/// storage, so a sector configured as `"Health"` and requested as
/// `" health "` resolve to the same secret.
pub fn normalize_sector(sector: &str) -> String {
    sector.trim().to_lowercase()
}

fn derivation_input(req: &SectorTokenRequest) -> String {
    format!(
        "v{}|{}|{}|{}",
        req.version,
        req.foundational_uin,
        normalize_sector(&req.sector),
        req.salt
    )
}

fn hmac_bytes(algorithm: &str, secret: &[u8], message: &str) -> Result<Vec<u8>, CryptoError> {
    match algorithm {
        "sha256" => {
            let mut mac = Hmac::<Sha256>::new_from_slice(secret)
                .map_err(|e| CryptoError::UnsupportedAlgorithm(e.to_string()))?;
            mac.update(message.as_bytes());
            Ok(mac.finalize().into_bytes().to_vec())
        }
        "sha512" => {
            let mut mac = Hmac::<Sha512>::new_from_slice(secret)
                .map_err(|e| CryptoError::UnsupportedAlgorithm(e.to_string()))?;
            mac.update(message.as_bytes());
            Ok(mac.finalize().into_bytes().to_vec())
        }
        other => Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
    }
}

/// Stretch `pool` by re-hashing with SHA-256 until it holds enough bytes
/// to cover `target_len` charset characters, then map byte → charset
/// index with `byte % |charset|`.
fn encode_to_charset(mut pool: Vec<u8>, charset: &[char], target_len: usize) -> String {
    let mut out = String::with_capacity(target_len);
    let mut cursor = 0;
    loop {
        while cursor < pool.len() && out.chars().count() < target_len {
            let b = pool[cursor];
            cursor += 1;
            out.push(charset[(b as usize) % charset.len()]);
        }
        if out.chars().count() >= target_len {
            break;
        }
        let mut hasher = Sha256::new();
        hasher.update(&pool);
        pool.extend_from_slice(&hasher.finalize());
    }
    out.chars().take(target_len).collect()
}

pub fn derive_sector_token(
    req: &SectorTokenRequest,
    secret: &[u8],
) -> Result<(String, SectorTokenMetadata), CryptoError> {
    if req.foundational_uin.is_empty() {
        return Err(CryptoError::MissingFoundationalUin);
    }
    if req.token_length == 0 {
        return Err(CryptoError::EmptyInput);
    }
    let input = derivation_input(req);
    let derived = hmac_bytes(&req.algorithm, secret, &input)?;
    let alphabet = req.charset.alphabet(false)?;
    let token = encode_to_charset(derived, &alphabet, req.token_length);
    let metadata = SectorTokenMetadata {
        salt: req.salt.clone(),
        version: req.version,
        algorithm: req.algorithm.clone(),
        token_length: req.token_length,
    };
    Ok((token, metadata))
}

/// Computes the deterministic-variant salt: `SHA-256(uin || ":" || sector)`
/// hex-encoded and truncated to `salt_len` characters. Weaker than a
/// random salt — callers must request this explicitly.
pub fn deterministic_salt(uin: &str, sector: &str, salt_len: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(uin.as_bytes());
    hasher.update(b":");
    hasher.update(normalize_sector(sector).as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest.chars().take(salt_len).collect()
}

pub fn derive_deterministic_sector_token(
    foundational_uin: &str,
    sector: &str,
    token_length: usize,
    salt_len: usize,
    secret: &[u8],
) -> Result<(String, SectorTokenMetadata), CryptoError> {
    let salt = deterministic_salt(foundational_uin, sector, salt_len);
    let mut req = SectorTokenRequest::new(foundational_uin, sector, token_length);
    req.salt = salt;
    derive_sector_token(&req, secret)
}

/// Recomputes the token from `metadata` and compares to `candidate` in
/// constant time for equal-length buffers. Any mismatch, including a
/// derivation error, surfaces as `false` rather than propagating.
pub fn verify_sector_token(
    candidate: &str,
    foundational_uin: &str,
    sector: &str,
    metadata: &SectorTokenMetadata,
    secret: &[u8],
) -> bool {
    let req = SectorTokenRequest {
        foundational_uin: foundational_uin.to_string(),
        sector: sector.to_string(),
        token_length: metadata.token_length,
        salt: metadata.salt.clone(),
        version: metadata.version,
        algorithm: metadata.algorithm.clone(),
        charset: Charset::Safe,
    };
    let Ok((recomputed, _)) = derive_sector_token(&req, secret) else {
        return false;
    };
    let a = recomputed.as_bytes();
    let b = candidate.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn different_sectors_yield_different_tokens() {
        let secret = b"sector-secret-at-least-32-bytes!";
        let health = SectorTokenRequest::new("UIN123", "health", 16);
        let tax = SectorTokenRequest::new("UIN123", "tax", 16);
        let (t_health, _) = derive_sector_token(&health, secret).unwrap();
        let (t_tax, _) = derive_sector_token(&tax, secret).unwrap();
        assert_ne!(t_health, t_tax);
    }

    #[test]
    fn verify_succeeds_for_matching_sector_and_fails_for_other() {
        let secret = b"sector-secret-at-least-32-bytes!";
        let req = SectorTokenRequest::new("UIN123", "health", 16);
        let (token, meta) = derive_sector_token(&req, secret).unwrap();
        assert!(verify_sector_token(&token, "UIN123", "health", &meta, secret));
        assert!(!verify_sector_token(&token, "UIN123", "tax", &meta, secret));
    }

    #[test]
    fn deterministic_variant_is_repeatable() {
        let secret = b"sector-secret-at-least-32-bytes!";
        let (t1, _) =
            derive_deterministic_sector_token("UIN123", "health", 16, 16, secret).unwrap();
        let (t2, _) =
            derive_deterministic_sector_token("UIN123", "health", 16, 16, secret).unwrap();
        assert_eq!(t1, t2);
    }

    #[test]
    fn missing_foundational_uin_is_rejected() {
        let req = SectorTokenRequest::new("", "health", 16);
        let err = derive_sector_token(&req, b"secret").unwrap_err();
        assert!(matches!(err, CryptoError::MissingFoundationalUin));
    }

    #[test]
    fn sector_name_is_normalized_before_derivation() {
        let secret = b"sector-secret-at-least-32-bytes!";
        let a = SectorTokenRequest::new("UIN123", "Health", 16);
        let b = SectorTokenRequest::new("UIN123", "  health  ", 16);
        let (ta, _) = derive_sector_token(&a, secret).unwrap();
        let (tb, _) = derive_sector_token(&b, secret).unwrap();
        assert_eq!(ta, tb);
    }
}
