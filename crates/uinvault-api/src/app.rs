use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use uinvault_service::UinVaultService;

use crate::handlers;
use crate::state::AppState;

pub fn build_app(service: Arc<UinVaultService>) -> Router {
    let state = AppState { service };

    Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/generate", post(handlers::post_generate))
        .route("/validate", post(handlers::post_validate))
        .route("/osia/generate", post(handlers::post_osia_generate))
        .route("/pregenerate", post(handlers::post_pre_generate))
        .route("/batchgenerate", post(handlers::post_batch_generate))
        .route("/claim", post(handlers::post_claim))
        .route("/uins/:uin/assign", post(handlers::post_assign))
        .route("/uins/:uin/release", post(handlers::post_release))
        .route("/uins/:uin/retire", post(handlers::post_retire))
        .route("/uins/:uin/revoke", post(handlers::post_revoke))
        .route("/cleanup-stale", post(handlers::post_cleanup_stale))
        .route("/uins/:uin", get(handlers::get_lookup))
        .route("/uins/:uin/audit", get(handlers::get_audit))
        .route("/pool/stats", get(handlers::get_pool_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::collections::HashMap;
    use std::time::Duration;
    use tower::util::ServiceExt;
    use uinvault_entropy::EntropyRegistry;
    use uinvault_lifecycle::LifecycleEngine;
    use uinvault_secrets::{LocalSecretBackend, SecretStoreAdapter};
    use uinvault_service::{GenerationDefaults, UinVaultService};
    use uinvault_store::MemoryPoolStore;

    async fn test_app() -> Router {
        let entropy = Arc::new(EntropyRegistry::new(vec![]));
        let mut raw = HashMap::new();
        raw.insert("health".to_string(), b"h".repeat(32));
        let local = Arc::new(LocalSecretBackend::new(raw));
        let secrets = Arc::new(SecretStoreAdapter::init(None, local, Duration::from_secs(300)).await);
        let lifecycle = Arc::new(LifecycleEngine::new(Arc::new(MemoryPoolStore::new())));
        let service = Arc::new(UinVaultService::new(entropy, secrets, lifecycle, GenerationDefaults::default()));
        build_app(service)
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_returns_200() {
        let app = test_app().await;
        let resp = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_returns_200_with_empty_pool() {
        let app = test_app().await;
        let resp = app.oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn generate_foundational_returns_200() {
        let app = test_app().await;
        let body = serde_json::json!({ "mode": "foundational" });
        let resp = app.oneshot(json_request("POST", "/generate", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn generate_unknown_mode_returns_400() {
        let app = test_app().await;
        let body = serde_json::json!({ "mode": "bogus" });
        let resp = app.oneshot(json_request("POST", "/generate", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn lookup_unknown_uin_returns_404() {
        let app = test_app().await;
        let resp = app
            .oneshot(Request::builder().uri("/uins/NOPE").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn pregenerate_then_claim_and_assign_end_to_end() {
        let app = test_app().await;
        let pregen_body = serde_json::json!({ "count": 3, "mode": "foundational", "scope": "foundational" });
        let resp = app.clone().oneshot(json_request("POST", "/pregenerate", pregen_body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let claim_body = serde_json::json!({ "scope": "foundational", "client_id": "CR", "actor": "CR" });
        let resp = app.clone().oneshot(json_request("POST", "/claim", claim_body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let uin = value["claimed"]["uin"].as_str().unwrap().to_string();

        let assign_body = serde_json::json!({ "assigned_to_ref": "CR-2025-000001", "actor": "CR" });
        let resp = app
            .oneshot(json_request("POST", &format!("/uins/{uin}/assign"), assign_body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
