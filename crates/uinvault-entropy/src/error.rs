use thiserror::Error;

#[derive(Debug, Error)]
pub enum EntropyError {
    #[error("requested length {0} exceeds the 4096 byte cap")]
    InvalidLength(usize),

    /// A candidate provider failed to initialize during startup probing.
    /// Probe failures are silent at the registry level; this variant exists
    /// so a provider's own `initialize()` has something to return.
    #[error("provider '{0}' failed to initialize: {1}")]
    ProbeFailed(String, String),

    /// The selected provider failed to produce bytes for a single call.
    /// The registry recovers from this by falling through to the software
    /// provider; it is never returned to a caller of `random_bytes`.
    #[error("provider '{0}' generation failed: {1}")]
    GenerationFailed(String, String),

    /// The terminal software CSPRNG failed. This is fatal: there is no
    /// further fallback.
    #[error("software csprng failed: {0}")]
    SoftwareFailure(String),

    #[error("no entropy provider is registered")]
    NoProviderAvailable,
}
