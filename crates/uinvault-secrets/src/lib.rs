pub mod adapter;
pub mod backend;
pub mod error;
pub mod local;
pub mod remote;

pub use adapter::{SecretStoreAdapter, DEFAULT_TTL};
pub use backend::{SecretBackend, SectorSecret};
pub use error::SecretError;
pub use local::LocalSecretBackend;
pub use remote::{RemoteAuth, RemoteSecretBackend};
