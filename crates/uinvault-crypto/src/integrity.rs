use ripemd::Ripemd160;
use sha3::{Digest, Sha3_256};

/// `RIPEMD160(SHA3-256(uin || salt))`, hex-encoded lowercase, 40 characters.
pub fn hash_rmd160(uin: &str, salt: &str) -> String {
    let mut sha3 = Sha3_256::new();
    sha3.update(uin.as_bytes());
    sha3.update(salt.as_bytes());
    let sha3_digest = sha3.finalize();

    let mut rmd = Ripemd160::new();
    rmd.update(sha3_digest);
    hex::encode(rmd.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_forty_hex_characters() {
        let h = hash_rmd160("ABCDEFG1234", "");
        assert_eq!(h.len(), 40);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn is_deterministic() {
        assert_eq!(hash_rmd160("U1", "s"), hash_rmd160("U1", "s"));
    }

    #[test]
    fn differs_by_salt() {
        assert_ne!(hash_rmd160("U1", "a"), hash_rmd160("U1", "b"));
    }
}
