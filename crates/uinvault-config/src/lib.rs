mod raw;
pub mod config;
pub mod error;
pub mod loader;

pub use config::{HsmConfig, PoolConfig, SecretManagerAuth, SecretManagerConfig, ServiceConfig};
pub use error::ConfigError;
pub use loader::load_from_path;
