use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use uinvault_domain::EntropyProvenance;

use crate::error::EntropyError;
use crate::provider::{EntropyProvider, ProviderStatus, MAX_REQUEST_LEN};
use crate::providers::{HsmStubProvider, SoftwareCsprng, PRIORITY_ORDER};

/// Dispatches `random_bytes` to the highest-priority provider that probed
/// successfully and has a genuine hardware TRNG, falling back one call at a
/// time to the terminal software provider on any runtime failure.
///
/// Built from an ordered candidate list (highest priority first) plus the
/// always-present terminal [`SoftwareCsprng`]. Safe for concurrent use:
/// selection happens once at `init()` and is read-only afterward.
pub struct EntropyRegistry {
    candidates: Vec<Arc<dyn EntropyProvider>>,
    software: Arc<SoftwareCsprng>,
    selected: Option<Arc<dyn EntropyProvider>>,
}

impl EntropyRegistry {
    /// Build a registry from an explicit candidate list, highest priority
    /// first. The terminal software provider is appended automatically and
    /// must not be included in `candidates`.
    pub fn new(candidates: Vec<Arc<dyn EntropyProvider>>) -> Self {
        EntropyRegistry { candidates, software: Arc::new(SoftwareCsprng::new()), selected: None }
    }

    /// Build the built-in priority list (`utimaco` .. `softhsm`) using
    /// `library_paths` to decide which families are configured. Families
    /// absent from the map are treated as not installed.
    pub fn with_builtin_priority(library_paths: HashMap<&'static str, PathBuf>) -> Self {
        let candidates = PRIORITY_ORDER
            .iter()
            .map(|family| {
                let path = library_paths.get(family.name).cloned();
                Arc::new(HsmStubProvider::new(family, path)) as Arc<dyn EntropyProvider>
            })
            .collect();
        EntropyRegistry::new(candidates)
    }

    /// Force selection of a pinned provider by name instead of the
    /// highest-priority reachable hardware candidate. Used when
    /// configuration sets `hsm_provider` explicitly rather than `auto`.
    pub async fn init_pinned(&mut self, name: &str) -> Result<(), EntropyError> {
        for c in &self.candidates {
            if c.name() == name {
                c.initialize().await?;
                self.selected = Some(c.clone());
                info!(provider = name, "entropy provider pinned by configuration");
                return Ok(());
            }
        }
        if name == self.software.name() {
            self.software.initialize().await?;
            self.selected = None;
            return Ok(());
        }
        Err(EntropyError::ProbeFailed(name.to_string(), "unknown provider".into()))
    }

    /// Probe every candidate in priority order; select the first that
    /// initializes successfully and reports a genuine hardware TRNG. Probe
    /// failures are silent per candidate. If nothing qualifies, the
    /// terminal software provider is selected.
    pub async fn init_auto(&mut self) {
        for c in &self.candidates {
            match c.initialize().await {
                Ok(()) if c.has_trng() => {
                    info!(provider = c.name(), fips_level = c.fips_level(), "entropy provider selected");
                    self.selected = Some(c.clone());
                    return;
                }
                Ok(()) => {
                    // Initialized but no TRNG (e.g. SoftHSM): not eligible.
                }
                Err(_) => {
                    // Silent per-candidate probe failure.
                }
            }
        }
        info!("no hardware entropy provider available; falling back to software CSPRNG");
        self.selected = None;
    }

    /// Name of the provider that will service the next call.
    pub fn active_provider_name(&self) -> &'static str {
        self.selected.as_ref().map(|p| p.name()).unwrap_or(self.software.name())
    }

    pub fn active_status(&self) -> ProviderStatus {
        self.selected.as_ref().map(|p| p.status()).unwrap_or(ProviderStatus::Ready)
    }

    /// Produce `n` bytes of randomness plus the provenance of whichever
    /// provider ultimately served the call. Never fails unless the
    /// software fallback itself fails (fatal `EntropyFailure` upstream).
    pub async fn random_bytes(&self, n: usize) -> Result<(Vec<u8>, EntropyProvenance), EntropyError> {
        if n == 0 || n > MAX_REQUEST_LEN {
            return Err(EntropyError::InvalidLength(n));
        }

        if let Some(provider) = &self.selected {
            match provider.random_bytes(n).await {
                Ok(bytes) => return Ok((bytes, provider.provenance())),
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "entropy provider failed, falling back to software CSPRNG");
                }
            }
        }

        let bytes = self.software.random_bytes(n).await?;
        Ok((bytes, self.software.provenance()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::hsm_stub::{HsmFamily, PRIORITY_ORDER};

    fn stub(family: &'static HsmFamily, reachable: bool) -> Arc<dyn EntropyProvider> {
        let path = if reachable { Some(PathBuf::from(".")) } else { None };
        Arc::new(HsmStubProvider::new(family, path))
    }

    #[tokio::test]
    async fn falls_back_to_software_when_no_hardware_reachable() {
        let mut reg = EntropyRegistry::new(
            PRIORITY_ORDER.iter().map(|f| stub(f, false)).collect(),
        );
        reg.init_auto().await;
        assert_eq!(reg.active_provider_name(), "software-csprng");
        let (bytes, prov) = reg.random_bytes(16).await.unwrap();
        assert_eq!(bytes.len(), 16);
        assert!(!prov.hardware);
    }

    #[tokio::test]
    async fn selects_highest_priority_reachable_hardware_provider() {
        let candidates: Vec<Arc<dyn EntropyProvider>> = PRIORITY_ORDER
            .iter()
            .map(|f| stub(f, f.name == "safenet" || f.name == "thales"))
            .collect();
        let mut reg = EntropyRegistry::new(candidates);
        reg.init_auto().await;
        // thales precedes safenet in PRIORITY_ORDER.
        assert_eq!(reg.active_provider_name(), "thales");
    }

    #[tokio::test]
    async fn softhsm_never_auto_selected_despite_reachability() {
        let candidates: Vec<Arc<dyn EntropyProvider>> =
            PRIORITY_ORDER.iter().map(|f| stub(f, f.name == "softhsm")).collect();
        let mut reg = EntropyRegistry::new(candidates);
        reg.init_auto().await;
        assert_eq!(reg.active_provider_name(), "software-csprng");
    }

    #[tokio::test]
    async fn runtime_failure_falls_through_for_that_call_only() {
        let hsm = Arc::new(HsmStubProvider::new(&PRIORITY_ORDER[0], Some(PathBuf::from("."))));
        let mut reg = EntropyRegistry::new(vec![hsm.clone() as Arc<dyn EntropyProvider>]);
        reg.init_auto().await;
        assert_eq!(reg.active_provider_name(), "utimaco");

        hsm.set_force_failure(true);

        let (bytes, prov) = reg.random_bytes(8).await.unwrap();
        assert_eq!(bytes.len(), 8);
        assert!(!prov.hardware); // this call was served by the software fallback
        assert_eq!(reg.active_provider_name(), "utimaco"); // selection itself is unchanged
    }
}
