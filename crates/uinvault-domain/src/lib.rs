pub mod error;
pub mod ids;
pub mod record;
pub mod status;

pub use error::DomainError;
pub use ids::{Scope, Uin, UIN_MAX_LEN};
pub use record::{AuditEntry, EntropyProvenance, UinRecord};
pub use status::{EventType, UinMode, UinStatus};
