pub mod error;
pub mod facade;

pub use error::ServiceError;
pub use facade::{
    GenerateOptions, GeneratedUinView, GenerationDefaults, PreGenerateFailure, PreGenerateSummary,
    SectorTokenOptions, StructuredOptions, UinVaultService, ValidationResult,
};
