use std::sync::Arc;

use uinvault_service::UinVaultService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<UinVaultService>,
}
