use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("input must not be empty")]
    EmptyInput,

    #[error("modulus {0} out of range (must be 2..=36)")]
    InvalidModulus(u32),

    #[error("non-alphanumeric character '{0}' in checksum input")]
    NonAlphanumericInput(char),

    #[error("value too short to contain a checksum")]
    ChecksumTooShort,

    #[error("template/value mismatch: {0}")]
    TemplateMismatch(String),

    #[error("sector_token mode requires a foundational_uin")]
    MissingFoundationalUin,

    #[error("no secret configured for sector '{0}'")]
    SecretMissing(String),

    #[error("invalid charset: {0}")]
    InvalidCharset(String),

    #[error("unsupported HMAC algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error(transparent)]
    Entropy(#[from] uinvault_entropy::EntropyError),
}
