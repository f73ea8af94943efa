use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::warn;

use crate::error::EntropyError;
use crate::provider::{EntropyProvider, ProviderStatus};

/// Static facts about one of the built-in HSM families the entropy
/// registry knows the name of. `has_trng` gates eligibility: a family
/// without a genuine hardware TRNG (SoftHSM is a software PKCS#11
/// emulator) can never be auto-selected ahead of the terminal software
/// provider, even if its driver probes successfully.
pub struct HsmFamily {
    pub name: &'static str,
    pub fips_level: u8,
    pub has_trng: bool,
}

pub const UTIMACO: HsmFamily = HsmFamily { name: "utimaco", fips_level: 3, has_trng: true };
pub const THALES: HsmFamily = HsmFamily { name: "thales", fips_level: 3, has_trng: true };
pub const SAFENET: HsmFamily = HsmFamily { name: "safenet", fips_level: 3, has_trng: true };
pub const NCIPHER: HsmFamily = HsmFamily { name: "ncipher", fips_level: 3, has_trng: true };
pub const AWS_CLOUDHSM: HsmFamily =
    HsmFamily { name: "aws-cloudhsm", fips_level: 3, has_trng: true };
pub const AZURE_HSM: HsmFamily = HsmFamily { name: "azure-hsm", fips_level: 2, has_trng: true };
pub const YUBIHSM: HsmFamily = HsmFamily { name: "yubihsm", fips_level: 2, has_trng: true };
pub const SOFTHSM: HsmFamily = HsmFamily { name: "softhsm", fips_level: 0, has_trng: false };

/// The built-in priority list, highest first, excluding the terminal
/// software provider.
pub const PRIORITY_ORDER: &[HsmFamily] =
    &[UTIMACO, THALES, SAFENET, NCIPHER, AWS_CLOUDHSM, AZURE_HSM, YUBIHSM, SOFTHSM];

/// A configured candidate for one HSM family.
///
/// `library_path` is the PKCS#11 (or vendor SDK) library that would load
/// in a real deployment; reachability of that path stands in for "the
/// driver probes successfully". A family with no configured path is
/// treated as not installed and never qualifies.
pub struct HsmStubProvider {
    family: &'static HsmFamily,
    library_path: Option<PathBuf>,
    ready: AtomicBool,
    /// Test/ops hook: force the next `random_bytes` call to fail so the
    /// registry's one-shot fall-through can be exercised deterministically.
    force_failure: AtomicBool,
}

impl HsmStubProvider {
    pub fn new(family: &'static HsmFamily, library_path: Option<PathBuf>) -> Self {
        HsmStubProvider {
            family,
            library_path,
            ready: AtomicBool::new(false),
            force_failure: AtomicBool::new(false),
        }
    }

    pub fn set_force_failure(&self, fail: bool) {
        self.force_failure.store(fail, Ordering::Relaxed);
    }
}

#[async_trait]
impl EntropyProvider for HsmStubProvider {
    fn name(&self) -> &'static str {
        self.family.name
    }

    fn has_trng(&self) -> bool {
        self.family.has_trng
    }

    fn fips_level(&self) -> u8 {
        self.family.fips_level
    }

    async fn initialize(&self) -> Result<(), EntropyError> {
        match &self.library_path {
            Some(path) if path.exists() => {
                self.ready.store(true, Ordering::Relaxed);
                Ok(())
            }
            Some(path) => Err(EntropyError::ProbeFailed(
                self.family.name.to_string(),
                format!("library not found at {}", path.display()),
            )),
            None => Err(EntropyError::ProbeFailed(
                self.family.name.to_string(),
                "not configured".into(),
            )),
        }
    }

    async fn random_bytes(&self, n: usize) -> Result<Vec<u8>, EntropyError> {
        if self.force_failure.swap(false, Ordering::Relaxed) {
            warn!(provider = self.family.name, "simulated HSM runtime failure");
            return Err(EntropyError::GenerationFailed(
                self.family.name.to_string(),
                "device returned an error".into(),
            ));
        }
        if !self.ready.load(Ordering::Relaxed) {
            return Err(EntropyError::GenerationFailed(
                self.family.name.to_string(),
                "not initialized".into(),
            ));
        }
        // A real driver would call into the vendor SDK/PKCS#11 module here.
        let mut buf = vec![0u8; n];
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|e| EntropyError::GenerationFailed(self.family.name.to_string(), e.to_string()))?;
        Ok(buf)
    }

    fn status(&self) -> ProviderStatus {
        if self.ready.load(Ordering::Relaxed) {
            ProviderStatus::Ready
        } else {
            ProviderStatus::Unavailable
        }
    }

    async fn close(&self) -> Result<(), EntropyError> {
        self.ready.store(false, Ordering::Relaxed);
        Ok(())
    }
}
