use thiserror::Error;
use uinvault_domain::UinStatus;
use uinvault_store::StoreError;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("uin '{0}' not found")]
    NotFound(String),

    #[error("illegal transition from {from} to {to}")]
    IllegalTransition { from: UinStatus, to: UinStatus },

    #[error("uin '{0}' already exists")]
    DuplicateUin(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}
