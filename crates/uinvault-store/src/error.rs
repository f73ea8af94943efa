use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("uin not found: {0}")]
    NotFound(String),

    #[error("uin already exists: {0}")]
    DuplicateUin(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal store error: {0}")]
    Internal(String),
}
