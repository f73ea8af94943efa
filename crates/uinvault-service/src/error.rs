use thiserror::Error;
use uinvault_domain::{DomainError, UinStatus};
use uinvault_entropy::EntropyError;
use uinvault_secrets::SecretError;
use uinvault_store::StoreError;

/// The error taxonomy a caller of the façade (CLI or HTTP handler) needs
/// to match on, independent of which lower component raised it.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("uin '{0}' not found")]
    NotFound(String),

    #[error("illegal transition from {from} to {to}")]
    IllegalTransition { from: UinStatus, to: UinStatus },

    #[error("uin '{0}' already exists")]
    DuplicateUin(String),

    #[error("no secret configured for sector '{0}'")]
    SecretMissing(String),

    #[error("entropy subsystem failure: {0}")]
    EntropyFailure(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<DomainError> for ServiceError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::InvalidUin(m) | DomainError::InvalidScope(m) => ServiceError::Validation(m),
            DomainError::IllegalTransition { from, to } => {
                ServiceError::Validation(format!("illegal transition from {from} to {to}"))
            }
        }
    }
}

impl From<EntropyError> for ServiceError {
    fn from(e: EntropyError) -> Self {
        match e {
            EntropyError::InvalidLength(n) => ServiceError::Validation(format!("requested length {n} out of range")),
            EntropyError::ProbeFailed(name, msg) => {
                ServiceError::Configuration(format!("provider '{name}' failed to initialize: {msg}"))
            }
            EntropyError::GenerationFailed(_, _) | EntropyError::SoftwareFailure(_) | EntropyError::NoProviderAvailable => {
                ServiceError::EntropyFailure(e.to_string())
            }
        }
    }
}

impl From<uinvault_crypto::CryptoError> for ServiceError {
    fn from(e: uinvault_crypto::CryptoError) -> Self {
        use uinvault_crypto::CryptoError::*;
        match e {
            SecretMissing(sector) => ServiceError::SecretMissing(sector),
            Entropy(inner) => ServiceError::from(inner),
            EmptyInput
            | InvalidModulus(_)
            | NonAlphanumericInput(_)
            | ChecksumTooShort
            | TemplateMismatch(_)
            | MissingFoundationalUin
            | InvalidCharset(_)
            | UnsupportedAlgorithm(_) => ServiceError::Validation(e.to_string()),
        }
    }
}

impl From<SecretError> for ServiceError {
    fn from(e: SecretError) -> Self {
        match e {
            SecretError::NotFound(sector) => ServiceError::SecretMissing(sector),
            SecretError::AuthFailed(m) => ServiceError::Configuration(m),
            SecretError::Transport(m) => ServiceError::Storage(m),
            SecretError::Configuration(m) => ServiceError::Configuration(m),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(uin) => ServiceError::NotFound(uin),
            StoreError::DuplicateUin(uin) => ServiceError::DuplicateUin(uin),
            StoreError::Serialization(_) | StoreError::Internal(_) => ServiceError::Storage(e.to_string()),
        }
    }
}

impl From<uinvault_lifecycle::LifecycleError> for ServiceError {
    fn from(e: uinvault_lifecycle::LifecycleError) -> Self {
        use uinvault_lifecycle::LifecycleError::*;
        match e {
            NotFound(uin) => ServiceError::NotFound(uin),
            IllegalTransition { from, to } => ServiceError::IllegalTransition { from, to },
            DuplicateUin(uin) => ServiceError::DuplicateUin(uin),
            Storage(inner) => ServiceError::from(inner),
        }
    }
}
