use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::warn;

use crate::backend::{SecretBackend, SectorSecret};
use crate::error::SecretError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub enum RemoteAuth {
    StaticToken(Secret<String>),
    RoleSecret { role_id: String, secret_id: Secret<String> },
}

/// HTTP-backed KV secret manager client (Vault-shaped: `auth/approle/login`
/// plus a KV v2 `data` endpoint). Authenticates lazily and caches the
/// resulting token until `reload()` forces re-authentication.
pub struct RemoteSecretBackend {
    client: reqwest::Client,
    address: String,
    mount_path: String,
    namespace: Option<String>,
    auth: RemoteAuth,
    token: RwLock<Option<String>>,
}

impl RemoteSecretBackend {
    pub fn new(address: String, mount_path: String, namespace: Option<String>, auth: RemoteAuth) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("reqwest client builder never fails with defaults");
        RemoteSecretBackend { client, address, mount_path, namespace, auth, token: RwLock::new(None) }
    }

    async fn authenticate(&self) -> Result<String, SecretError> {
        match &self.auth {
            RemoteAuth::StaticToken(t) => Ok(t.expose_secret().clone()),
            RemoteAuth::RoleSecret { role_id, secret_id } => {
                let url = format!("{}/v1/auth/approle/login", self.address);
                let resp = self
                    .client
                    .post(&url)
                    .json(&serde_json::json!({ "role_id": role_id, "secret_id": secret_id.expose_secret() }))
                    .send()
                    .await
                    .map_err(|e| SecretError::Transport(e.to_string()))?;
                if !resp.status().is_success() {
                    return Err(SecretError::AuthFailed(format!("login returned status {}", resp.status())));
                }
                let body: Value = resp.json().await.map_err(|e| SecretError::Transport(e.to_string()))?;
                body["auth"]["client_token"]
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| SecretError::AuthFailed("response missing auth.client_token".into()))
            }
        }
    }

    async fn token(&self) -> Result<String, SecretError> {
        if let Some(t) = self.token.read().await.as_ref() {
            return Ok(t.clone());
        }
        let t = self.authenticate().await?;
        *self.token.write().await = Some(t.clone());
        Ok(t)
    }
}

#[async_trait]
impl SecretBackend for RemoteSecretBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn get_sector_secrets(&self) -> Result<HashMap<String, SectorSecret>, SecretError> {
        let token = self.token().await?;
        let mut url = format!("{}/v1/{}/data/sector_secrets", self.address, self.mount_path);
        if let Some(ns) = &self.namespace {
            url.push_str(&format!("?namespace={ns}"));
        }
        let resp = self
            .client
            .get(&url)
            .header("X-Vault-Token", token)
            .send()
            .await
            .map_err(|e| SecretError::Transport(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED
            || resp.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(SecretError::AuthFailed(format!("read returned status {}", resp.status())));
        }
        if !resp.status().is_success() {
            return Err(SecretError::Transport(format!("read returned status {}", resp.status())));
        }

        let body: Value = resp.json().await.map_err(|e| SecretError::Transport(e.to_string()))?;
        let data = body
            .pointer("/data/data")
            .and_then(Value::as_object)
            .ok_or_else(|| SecretError::Transport("response missing data.data object".into()))?;

        let mut out = HashMap::with_capacity(data.len());
        for (sector, value) in data {
            let Some(s) = value.as_str() else {
                warn!(sector, "secret manager returned non-string value, skipping");
                continue;
            };
            out.insert(sector.clone(), Secret::new(s.as_bytes().to_vec()));
        }
        Ok(out)
    }

    async fn reload(&self) -> Result<(), SecretError> {
        *self.token.write().await = None;
        self.token().await?;
        Ok(())
    }
}
