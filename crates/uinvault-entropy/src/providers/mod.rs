pub mod hsm_stub;
pub mod software_csprng;

pub use hsm_stub::{HsmFamily, HsmStubProvider, PRIORITY_ORDER};
pub use software_csprng::SoftwareCsprng;
