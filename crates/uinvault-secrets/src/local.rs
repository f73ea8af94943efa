use std::collections::HashMap;

use async_trait::async_trait;
use secrecy::Secret;

use crate::backend::{SecretBackend, SectorSecret};
use crate::error::SecretError;

/// Backend populated from explicit configuration (`sector_secrets` map).
/// `reload()` is a no-op: the map is fixed at construction.
pub struct LocalSecretBackend {
    secrets: HashMap<String, SectorSecret>,
}

impl LocalSecretBackend {
    pub fn new(raw: HashMap<String, Vec<u8>>) -> Self {
        let secrets = raw.into_iter().map(|(k, v)| (k, Secret::new(v))).collect();
        LocalSecretBackend { secrets }
    }
}

#[async_trait]
impl SecretBackend for LocalSecretBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn get_sector_secrets(&self) -> Result<HashMap<String, SectorSecret>, SecretError> {
        use secrecy::ExposeSecret;
        Ok(self
            .secrets
            .iter()
            .map(|(k, v)| (k.clone(), Secret::new(v.expose_secret().clone())))
            .collect())
    }

    async fn reload(&self) -> Result<(), SecretError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[tokio::test]
    async fn returns_configured_secret() {
        let mut raw = HashMap::new();
        raw.insert("health".to_string(), b"x".repeat(32));
        let backend = LocalSecretBackend::new(raw);
        let secret = backend.get("health").await.unwrap();
        assert_eq!(secret.expose_secret().len(), 32);
    }

    #[tokio::test]
    async fn missing_sector_errors() {
        let backend = LocalSecretBackend::new(HashMap::new());
        let err = match backend.get("tax").await {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(err, SecretError::NotFound(_)));
    }
}
