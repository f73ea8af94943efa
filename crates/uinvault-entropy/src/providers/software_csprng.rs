use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::EntropyError;
use crate::provider::{EntropyProvider, ProviderStatus};

/// Terminal fallback provider. Always present in the registry and always
/// selectable: if this fails, generation is fatal (`EntropyFailure`).
#[derive(Debug, Default)]
pub struct SoftwareCsprng {
    closed: AtomicBool,
}

impl SoftwareCsprng {
    pub fn new() -> Self {
        SoftwareCsprng { closed: AtomicBool::new(false) }
    }
}

#[async_trait]
impl EntropyProvider for SoftwareCsprng {
    fn name(&self) -> &'static str {
        "software-csprng"
    }

    fn has_trng(&self) -> bool {
        false
    }

    fn fips_level(&self) -> u8 {
        0
    }

    async fn initialize(&self) -> Result<(), EntropyError> {
        Ok(())
    }

    async fn random_bytes(&self, n: usize) -> Result<Vec<u8>, EntropyError> {
        let mut buf = vec![0u8; n];
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|e| EntropyError::SoftwareFailure(e.to_string()))?;
        Ok(buf)
    }

    fn status(&self) -> ProviderStatus {
        if self.closed.load(Ordering::Relaxed) {
            ProviderStatus::Closed
        } else {
            ProviderStatus::Ready
        }
    }

    async fn close(&self) -> Result<(), EntropyError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn produces_requested_length() {
        let p = SoftwareCsprng::new();
        let bytes = p.random_bytes(32).await.unwrap();
        assert_eq!(bytes.len(), 32);
    }

    #[tokio::test]
    async fn two_calls_are_not_identical() {
        let p = SoftwareCsprng::new();
        let a = p.random_bytes(32).await.unwrap();
        let b = p.random_bytes(32).await.unwrap();
        assert_ne!(a, b);
    }
}
