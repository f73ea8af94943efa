pub mod error;
pub mod memory_store;
pub mod pool_store;
pub mod postgres_store;

pub use error::StoreError;
pub use memory_store::MemoryPoolStore;
pub use pool_store::{PoolStore, Transition};
pub use postgres_store::{PoolOptions, PostgresPoolStore};
