pub mod charset;
pub mod checksum;
pub mod error;
pub mod generator;
pub mod integrity;
pub mod sector_token;

pub use charset::Charset;
pub use checksum::{append_checksum, verify_checksum, ChecksumAlgorithm, ChecksumResult};
pub use error::CryptoError;
pub use generator::{generate_structured, generate_uniform, GeneratedUin, GeneratorConfig, StructuredConfig};
pub use integrity::hash_rmd160;
pub use sector_token::{
    derive_deterministic_sector_token, derive_sector_token, deterministic_salt, normalize_sector,
    verify_sector_token, SectorTokenMetadata, SectorTokenRequest,
};
