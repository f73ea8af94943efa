use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("no secret configured for sector '{0}'")]
    NotFound(String),

    #[error("remote secret manager authentication failed: {0}")]
    AuthFailed(String),

    #[error("remote secret manager request failed: {0}")]
    Transport(String),

    #[error("secret backend misconfigured: {0}")]
    Configuration(String),
}
