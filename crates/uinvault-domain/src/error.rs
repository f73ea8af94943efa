use thiserror::Error;

/// Validation errors raised by the domain types themselves, independent of
/// any storage or crypto backend. Higher layers fold this into their own
/// error taxonomy (see `uinvault_service::ServiceError`).
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid uin: {0}")]
    InvalidUin(String),

    #[error("invalid scope: {0}")]
    InvalidScope(String),

    #[error("illegal transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },
}
