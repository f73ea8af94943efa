use async_trait::async_trait;
use uinvault_domain::EntropyProvenance;

use crate::error::EntropyError;

/// Maximum bytes any single `random_bytes` call may request.
pub const MAX_REQUEST_LEN: usize = 4096;

/// Point-in-time health of a provider, surfaced by `status()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    /// Probed successfully and ready to serve `random_bytes`.
    Ready,
    /// Never probed, or the probe failed.
    Unavailable,
    /// `close()` has been called.
    Closed,
}

/// Capability set implemented by every entropy backend, hardware or
/// software. Concrete providers are tried in a fixed priority order by
/// [`crate::registry::EntropyRegistry`]; configuration selects between
/// `auto` and a pinned provider.
#[async_trait]
pub trait EntropyProvider: Send + Sync {
    /// Short identifier, e.g. "utimaco" or "software-csprng". Stable;
    /// used in provenance records and config.
    fn name(&self) -> &'static str;

    /// Whether this provider backs onto a true hardware RNG. Software
    /// providers report `false`.
    fn has_trng(&self) -> bool;

    /// FIPS 140-2/3 validation level, 0 (unvalidated) through 3.
    fn fips_level(&self) -> u8;

    /// Probe whether the underlying driver/library is reachable. Called
    /// once at registry initialization. A failure here is silent at the
    /// registry level — the candidate is simply skipped.
    async fn initialize(&self) -> Result<(), EntropyError>;

    /// Produce exactly `n` bytes of randomness. `n` is guaranteed `<=
    /// MAX_REQUEST_LEN` by the caller (the registry validates first).
    async fn random_bytes(&self, n: usize) -> Result<Vec<u8>, EntropyError>;

    fn status(&self) -> ProviderStatus;

    async fn close(&self) -> Result<(), EntropyError>;

    /// The provenance record attached to UINs generated with this
    /// provider's output.
    fn provenance(&self) -> EntropyProvenance {
        EntropyProvenance {
            source: self.name().to_string(),
            hardware: self.has_trng(),
            fips_level: self.fips_level(),
            provider: self.name().to_string(),
        }
    }
}
