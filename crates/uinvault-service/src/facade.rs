use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use secrecy::ExposeSecret;
use tracing::info;
use uinvault_crypto::{
    derive_deterministic_sector_token, derive_sector_token, generate_structured, generate_uniform,
    hash_rmd160, verify_checksum, verify_sector_token, ChecksumAlgorithm, Charset, GeneratorConfig,
    SectorTokenMetadata, SectorTokenRequest, StructuredConfig,
};
use uinvault_domain::{AuditEntry, EntropyProvenance, Scope, Uin, UinMode, UinRecord, UinStatus};
use uinvault_entropy::EntropyRegistry;
use uinvault_lifecycle::LifecycleEngine;
use uinvault_secrets::SecretStoreAdapter;

use crate::error::ServiceError;

const MAX_PRE_GENERATE: usize = 100_000;
const MAX_BATCH_GENERATE: usize = 1_000;

#[derive(Debug, Clone)]
pub struct StructuredOptions {
    pub template: String,
    pub literals: HashMap<char, String>,
    pub randoms: HashMap<char, (usize, Charset)>,
}

#[derive(Debug, Clone)]
pub struct SectorTokenOptions {
    pub foundational_uin: String,
    pub sector: String,
    pub token_length: usize,
    pub deterministic: bool,
    pub salt_len: usize,
}

/// Input to `generate`/`batchGenerate`/`preGenerate`; unset fields fall
/// back to the service's configured generation defaults.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub length: Option<usize>,
    pub charset: Option<Charset>,
    pub exclude_ambiguous: Option<bool>,
    pub checksum: Option<ChecksumAlgorithm>,
    pub structured: Option<StructuredOptions>,
    pub sector_token: Option<SectorTokenOptions>,
}

#[derive(Debug, Clone)]
pub struct GeneratedUinView {
    pub value: String,
    pub base: Option<String>,
    pub checksum: Option<String>,
    pub provenance: Option<EntropyProvenance>,
    pub sector_metadata: Option<SectorTokenMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub length: usize,
}

#[derive(Debug, Clone)]
pub struct PreGenerateFailure {
    pub attempt: usize,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct PreGenerateSummary {
    pub inserted: Vec<String>,
    pub failures: Vec<PreGenerateFailure>,
}

/// Generation defaults, normally sourced from configuration.
#[derive(Debug, Clone)]
pub struct GenerationDefaults {
    pub default_mode: UinMode,
    pub default_length: usize,
    pub default_charset: Charset,
    pub checksum_algorithm: Option<ChecksumAlgorithm>,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        GenerationDefaults {
            default_mode: UinMode::Foundational,
            default_length: 19,
            default_charset: Charset::Safe,
            checksum_algorithm: Some(ChecksumAlgorithm::Iso7064),
        }
    }
}

/// One method per user-visible operation. Validates inputs, orchestrates
/// the entropy/crypto/secret/store/lifecycle components, and shapes the
/// result; performs no I/O of its own. The same façade backs both the CLI
/// and the HTTP API.
pub struct UinVaultService {
    entropy: Arc<EntropyRegistry>,
    secrets: Arc<SecretStoreAdapter>,
    lifecycle: Arc<LifecycleEngine>,
    defaults: GenerationDefaults,
}

impl UinVaultService {
    pub fn new(
        entropy: Arc<EntropyRegistry>,
        secrets: Arc<SecretStoreAdapter>,
        lifecycle: Arc<LifecycleEngine>,
        defaults: GenerationDefaults,
    ) -> Self {
        UinVaultService { entropy, secrets, lifecycle, defaults }
    }

    /// Pure, ad-hoc generation in a given mode; performs no persistence.
    pub async fn generate(&self, mode: UinMode, options: &GenerateOptions) -> Result<GeneratedUinView, ServiceError> {
        match mode {
            UinMode::Foundational | UinMode::Random => {
                let length = options.length.unwrap_or(self.defaults.default_length);
                let charset = options.charset.clone().unwrap_or_else(|| self.defaults.default_charset.clone());
                let exclude_ambiguous = options.exclude_ambiguous.unwrap_or(true);
                let checksum = options.checksum.or(self.defaults.checksum_algorithm);
                let cfg = GeneratorConfig { charset, length, exclude_ambiguous, checksum };
                let g = generate_uniform(&cfg, &self.entropy).await?;
                Ok(GeneratedUinView {
                    value: g.value,
                    base: Some(g.base),
                    checksum: g.checksum,
                    provenance: Some(g.provenance),
                    sector_metadata: None,
                })
            }
            UinMode::Structured => {
                let s = options
                    .structured
                    .clone()
                    .ok_or_else(|| ServiceError::Validation("structured mode requires template options".into()))?;
                let cfg = StructuredConfig {
                    template: s.template,
                    literals: s.literals,
                    randoms: s.randoms,
                    exclude_ambiguous: options.exclude_ambiguous.unwrap_or(true),
                };
                let (value, provenance) = generate_structured(&cfg, &self.entropy).await?;
                Ok(GeneratedUinView { value, base: None, checksum: None, provenance, sector_metadata: None })
            }
            UinMode::SectorToken => {
                let s = options
                    .sector_token
                    .clone()
                    .ok_or_else(|| ServiceError::Validation("sector_token mode requires sector options".into()))?;
                let (token, metadata) = self.derive_token(&s).await?;
                Ok(GeneratedUinView { value: token, base: None, checksum: None, provenance: None, sector_metadata: Some(metadata) })
            }
        }
    }

    /// `validate(value, checksum)`: recomputes and compares the checksum,
    /// never raising — an invalid input simply reports `valid: false`.
    pub fn validate(&self, value: &str, checksum: ChecksumAlgorithm) -> ValidationResult {
        let valid = verify_checksum(value, checksum).unwrap_or(false);
        ValidationResult { valid, length: value.chars().count() }
    }

    /// Always `foundational` mode, length 19, ISO 7064 checksum,
    /// `exclude_ambiguous=true`; persists `AVAILABLE` with the supplied
    /// attributes/transaction_id and returns only the UIN string.
    pub async fn osia_generate(
        &self,
        transaction_id: &str,
        attributes: HashMap<String, String>,
    ) -> Result<String, ServiceError> {
        let cfg = GeneratorConfig {
            charset: Charset::Safe,
            length: 19,
            exclude_ambiguous: true,
            checksum: Some(ChecksumAlgorithm::Iso7064),
        };
        let g = generate_uniform(&cfg, &self.entropy).await?;
        let hash = hash_rmd160(&g.value, "");
        let uin = Uin::new(g.value.clone())?;
        let mut record =
            UinRecord::new_available(uin, UinMode::Foundational, Scope::new("foundational"), hash, Utc::now(), Some(g.provenance));
        record.transaction_id = Some(transaction_id.to_string());
        record.attributes = attributes;
        self.lifecycle.pre_generate(record, "osia_generate").await?;
        Ok(g.value)
    }

    /// Bounded `1 ≤ count ≤ 100_000`; per-row best-effort — a collision on
    /// one UIN does not abort the batch, it is reported in `failures`.
    pub async fn pre_generate(
        &self,
        count: usize,
        mode: UinMode,
        scope: &str,
        options: &GenerateOptions,
    ) -> Result<PreGenerateSummary, ServiceError> {
        if count == 0 || count > MAX_PRE_GENERATE {
            return Err(ServiceError::Validation(format!(
                "count must be between 1 and {MAX_PRE_GENERATE}, got {count}"
            )));
        }
        if mode == UinMode::SectorToken {
            return Err(ServiceError::Validation(
                "sector_token rows are derived on demand from a foundational uin, not pre-generated".into(),
            ));
        }

        let mut inserted = Vec::with_capacity(count);
        let mut failures = Vec::new();
        for attempt in 0..count {
            match self.generate_and_store(mode, scope, options).await {
                Ok(uin) => inserted.push(uin),
                Err(e) => failures.push(PreGenerateFailure { attempt, error: e.to_string() }),
            }
        }
        info!(requested = count, inserted = inserted.len(), failed = failures.len(), scope, "pre-generate batch complete");
        Ok(PreGenerateSummary { inserted, failures })
    }

    async fn generate_and_store(&self, mode: UinMode, scope: &str, options: &GenerateOptions) -> Result<String, ServiceError> {
        let generated = self.generate(mode, options).await?;
        let hash = hash_rmd160(&generated.value, "");
        let uin = Uin::new(generated.value.clone())?;
        let record = UinRecord::new_available(uin, mode, Scope::new(scope), hash, Utc::now(), generated.provenance);
        self.lifecycle.pre_generate(record, "pre_generate").await?;
        Ok(generated.value)
    }

    /// Pure, `1 ≤ count ≤ 1_000`; every generation failure aborts the call.
    pub async fn batch_generate(&self, count: usize, mode: UinMode, options: &GenerateOptions) -> Result<Vec<GeneratedUinView>, ServiceError> {
        if count == 0 || count > MAX_BATCH_GENERATE {
            return Err(ServiceError::Validation(format!(
                "count must be between 1 and {MAX_BATCH_GENERATE}, got {count}"
            )));
        }
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.generate(mode, options).await?);
        }
        Ok(out)
    }

    async fn derive_token(&self, opts: &SectorTokenOptions) -> Result<(String, SectorTokenMetadata), ServiceError> {
        let secret = self.secrets.get(&opts.sector).await?;
        let secret_bytes = secret.expose_secret();
        if opts.deterministic {
            Ok(derive_deterministic_sector_token(
                &opts.foundational_uin,
                &opts.sector,
                opts.token_length,
                opts.salt_len,
                secret_bytes,
            )?)
        } else {
            let req = SectorTokenRequest::new(opts.foundational_uin.clone(), opts.sector.clone(), opts.token_length);
            Ok(derive_sector_token(&req, secret_bytes)?)
        }
    }

    pub async fn derive_sector_token(&self, opts: &SectorTokenOptions) -> Result<(String, SectorTokenMetadata), ServiceError> {
        self.derive_token(opts).await
    }

    pub async fn verify_sector_token(
        &self,
        candidate: &str,
        foundational_uin: &str,
        sector: &str,
        metadata: &SectorTokenMetadata,
    ) -> Result<bool, ServiceError> {
        let secret = self.secrets.get(sector).await?;
        Ok(verify_sector_token(candidate, foundational_uin, sector, metadata, secret.expose_secret()))
    }

    pub async fn claim(&self, scope: Option<&str>, client_id: &str, actor: &str) -> Result<Option<UinRecord>, ServiceError> {
        Ok(self.lifecycle.claim(scope, client_id, actor).await?)
    }

    pub async fn assign(&self, uin: &str, assigned_to_ref: &str, actor: &str) -> Result<UinRecord, ServiceError> {
        Ok(self.lifecycle.assign(uin, assigned_to_ref, actor).await?)
    }

    pub async fn release(&self, uin: &str, actor: &str) -> Result<UinRecord, ServiceError> {
        Ok(self.lifecycle.release(uin, actor).await?)
    }

    pub async fn retire(&self, uin: &str, reason: &str, actor: &str) -> Result<UinRecord, ServiceError> {
        Ok(self.lifecycle.retire(uin, reason, actor).await?)
    }

    pub async fn revoke(&self, uin: &str, reason: &str, actor: &str) -> Result<UinRecord, ServiceError> {
        Ok(self.lifecycle.revoke(uin, reason, actor).await?)
    }

    pub async fn cleanup_stale(&self, threshold: Duration, actor: &str) -> Result<Vec<UinRecord>, ServiceError> {
        Ok(self.lifecycle.cleanup_stale(threshold, actor).await?)
    }

    pub async fn lookup(&self, uin: &str) -> Result<Option<UinRecord>, ServiceError> {
        Ok(self.lifecycle.lookup(uin).await?)
    }

    pub async fn audit(&self, uin: &str) -> Result<Vec<AuditEntry>, ServiceError> {
        Ok(self.lifecycle.audit(uin).await?)
    }

    pub async fn pool_stats(&self, scope: Option<&str>) -> Result<HashMap<UinStatus, i64>, ServiceError> {
        Ok(self.lifecycle.pool_stats(scope).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use uinvault_secrets::LocalSecretBackend;
    use uinvault_store::MemoryPoolStore;

    async fn service() -> UinVaultService {
        let entropy = Arc::new(EntropyRegistry::new(vec![]));
        let mut raw = HashMap::new();
        raw.insert("health".to_string(), b"h".repeat(32));
        raw.insert("tax".to_string(), b"t".repeat(32));
        let local = Arc::new(LocalSecretBackend::new(raw));
        let secrets = Arc::new(SecretStoreAdapter::init(None, local, Duration::from_secs(300)).await);
        let lifecycle = Arc::new(LifecycleEngine::new(Arc::new(MemoryPoolStore::new())));
        UinVaultService::new(entropy, secrets, lifecycle, GenerationDefaults::default())
    }

    #[tokio::test]
    async fn s1_foundational_generate_and_verify() {
        let svc = service().await;
        let opts = GenerateOptions {
            length: Some(19),
            charset: Some(Charset::Safe),
            exclude_ambiguous: Some(true),
            checksum: Some(ChecksumAlgorithm::Iso7064),
            structured: None,
            sector_token: None,
        };
        let g = svc.generate(UinMode::Foundational, &opts).await.unwrap();
        assert_eq!(g.value.chars().count(), 20);
        let result = svc.validate(&g.value, ChecksumAlgorithm::Iso7064);
        assert_eq!(result, ValidationResult { valid: true, length: 20 });
    }

    #[tokio::test]
    async fn s5_sector_unlinkability() {
        let svc = service().await;
        let health = SectorTokenOptions {
            foundational_uin: "U1".into(),
            sector: "health".into(),
            token_length: 16,
            deterministic: false,
            salt_len: 16,
        };
        let tax = SectorTokenOptions { sector: "tax".into(), ..health.clone() };
        let (t_health, meta) = svc.derive_sector_token(&health).await.unwrap();
        let (t_tax, _) = svc.derive_sector_token(&tax).await.unwrap();
        assert_ne!(t_health, t_tax);
        assert!(svc.verify_sector_token(&t_health, "U1", "health", &meta).await.unwrap());
        assert!(!svc.verify_sector_token(&t_health, "U1", "tax", &meta).await.unwrap());
    }

    #[tokio::test]
    async fn s6_iso7064_fixture_is_deterministic() {
        let svc = service().await;
        let r1 = svc.validate("ABC1230", ChecksumAlgorithm::Iso7064);
        let r2 = svc.validate("ABC1230", ChecksumAlgorithm::Iso7064);
        assert_eq!(r1, r2);
    }

    #[tokio::test]
    async fn pre_generate_rejects_out_of_range_counts() {
        let svc = service().await;
        let opts = GenerateOptions::default();
        assert!(matches!(
            svc.pre_generate(0, UinMode::Foundational, "foundational", &opts).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            svc.pre_generate(100_001, UinMode::Foundational, "foundational", &opts).await,
            Err(ServiceError::Validation(_))
        ));
        let summary = svc.pre_generate(1, UinMode::Foundational, "foundational", &opts).await.unwrap();
        assert_eq!(summary.inserted.len(), 1);
        assert!(summary.failures.is_empty());
    }

    #[tokio::test]
    async fn pre_generate_rejects_sector_token_mode() {
        let svc = service().await;
        let opts = GenerateOptions::default();
        let err = svc.pre_generate(1, UinMode::SectorToken, "health", &opts).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn batch_generate_rejects_out_of_range_counts() {
        let svc = service().await;
        let opts = GenerateOptions::default();
        assert!(matches!(
            svc.batch_generate(0, UinMode::Foundational, &opts).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            svc.batch_generate(1_001, UinMode::Foundational, &opts).await,
            Err(ServiceError::Validation(_))
        ));
        let batch = svc.batch_generate(5, UinMode::Foundational, &opts).await.unwrap();
        assert_eq!(batch.len(), 5);
    }

    #[tokio::test]
    async fn civil_registration_end_to_end_through_the_facade() {
        let svc = service().await;
        let opts = GenerateOptions::default();
        let summary = svc.pre_generate(100, UinMode::Foundational, "foundational", &opts).await.unwrap();
        assert_eq!(summary.inserted.len(), 100);

        let claimed = svc.claim(Some("foundational"), "CR", "pregen").await.unwrap().unwrap();
        assert_eq!(claimed.status, UinStatus::Preassigned);

        let assigned = svc.assign(claimed.uin.as_str(), "CR-2025-001234", "CR").await.unwrap();
        assert_eq!(assigned.status, UinStatus::Assigned);

        let audit = svc.audit(claimed.uin.as_str()).await.unwrap();
        assert_eq!(audit.len(), 3);
    }

    #[tokio::test]
    async fn assign_on_assigned_row_is_illegal_transition() {
        let svc = service().await;
        let opts = GenerateOptions::default();
        svc.pre_generate(1, UinMode::Foundational, "foundational", &opts).await.unwrap();
        let claimed = svc.claim(None, "c1", "svc").await.unwrap().unwrap();
        svc.assign(claimed.uin.as_str(), "ref-1", "svc").await.unwrap();
        let err = svc.assign(claimed.uin.as_str(), "ref-2", "svc").await.unwrap_err();
        assert!(matches!(err, ServiceError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn checksum_on_empty_string_is_invalid_not_a_panic() {
        let svc = service().await;
        let result = svc.validate("", ChecksumAlgorithm::Iso7064);
        assert!(!result.valid);
    }

    #[tokio::test]
    async fn osia_generate_persists_and_returns_only_the_uin() {
        let svc = service().await;
        let mut attrs = HashMap::new();
        attrs.insert("given_name".to_string(), "Alex".to_string());
        let uin = svc.osia_generate("txn-001", attrs).await.unwrap();
        assert_eq!(uin.chars().count(), 20);
        let row = svc.lookup(&uin).await.unwrap().unwrap();
        assert_eq!(row.status, UinStatus::Available);
        assert_eq!(row.transaction_id.as_deref(), Some("txn-001"));
    }
}
