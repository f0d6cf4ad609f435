//! Axum-based HTTP channel: serves the JSON API under `/api/`.
//!
//! `run()` drives the axum event loop; the [`CancellationToken`] is wired to
//! axum's graceful shutdown.
//!
//! ## URL layout
//!
//! ```text
//! GET    /api/health
//! GET    /api/topics
//! POST   /api/chat
//! POST   /api/chat/reset
//! GET    /api/knowledge/search?q=
//! POST   /api/bmi
//! GET    /api/calories
//! POST   /api/calories
//! DELETE /api/calories/{id}
//! GET    /favicon.ico              → 204
//! ```

mod api;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{delete, get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::AppError;

use super::state::CommsState;

// ── Shared request state ──────────────────────────────────────────────────────

/// Axum router state injected into every handler via [`axum::extract::State`].
///
/// Cheap to clone: all fields are reference-counted.
#[derive(Clone)]
pub(crate) struct AxumState {
    /// Channel identifier used in log spans.
    pub channel_id: Arc<str>,
    pub comms: Arc<CommsState>,
}

// ── AxumChannel ───────────────────────────────────────────────────────────────

/// Body limit for `/api/chat` unless configured otherwise.
pub const DEFAULT_CHAT_BODY_LIMIT: usize = 20 * 1024 * 1024;

pub struct AxumChannel {
    channel_id: String,
    bind_addr: String,
    chat_body_limit: usize,
    state: Arc<CommsState>,
}

impl AxumChannel {
    pub fn new(
        channel_id: impl Into<String>,
        bind_addr: impl Into<String>,
        state: Arc<CommsState>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            bind_addr: bind_addr.into(),
            chat_body_limit: DEFAULT_CHAT_BODY_LIMIT,
            state,
        }
    }

    /// Cap the `/api/chat` request body at `bytes`. Larger requests get 413.
    pub fn with_chat_body_limit(mut self, bytes: usize) -> Self {
        self.chat_body_limit = bytes;
        self
    }

    /// Serve until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), AppError> {
        let axum_state = AxumState {
            channel_id: Arc::from(self.channel_id.as_str()),
            comms: self.state,
        };

        let router = build_router(axum_state, self.chat_body_limit);

        let listener = TcpListener::bind(&self.bind_addr)
            .await
            .map_err(|e| AppError::Comms(format!("axum bind failed on {}: {e}", self.bind_addr)))?;

        info!(
            channel_id = %self.channel_id,
            bind_addr = %self.bind_addr,
            chat_body_limit = self.chat_body_limit,
            "axum channel listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| AppError::Comms(format!("axum server error: {e}")))?;

        info!(channel_id = %self.channel_id, "axum channel shut down");
        Ok(())
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Other routes keep axum's default 2 MB limit; only chat carries images.
fn build_router(state: AxumState, chat_body_limit: usize) -> Router {
    Router::new()
        .route("/api/health",            get(api::health))
        .route("/api/topics",            get(api::topics))
        .route("/api/chat",              post(api::chat).layer(DefaultBodyLimit::max(chat_body_limit)))
        .route("/api/chat/reset",        post(api::chat_reset))
        .route("/api/knowledge/search",  get(api::knowledge_search))
        .route("/api/bmi",               post(api::bmi))
        .route("/api/calories",          get(api::calories_list).post(api::calories_add))
        .route("/api/calories/{id}",     delete(api::calories_remove))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::knowledge::{KnowledgeEntry, KnowledgeLookup};
    use crate::llm::LlmProvider;
    use crate::llm::providers::dummy::DummyProvider;
    use crate::router::FALLBACK_REPLY;

    fn app_with(provider: DummyProvider) -> Router {
        app_with_limit(provider, DEFAULT_CHAT_BODY_LIMIT)
    }

    fn app_with_limit(provider: DummyProvider, chat_body_limit: usize) -> Router {
        let knowledge = Arc::new(KnowledgeLookup::from_entries(vec![KnowledgeEntry {
            keywords: vec!["fever".into()],
            response: "Rest and drink fluids.".into(),
        }]));
        let comms = Arc::new(CommsState::new(
            "vilux-test",
            knowledge,
            LlmProvider::Dummy(provider),
            "sys",
            Duration::ZERO,
        ));
        build_router(AxumState { channel_id: Arc::from("test"), comms }, chat_body_limit)
    }

    fn app() -> Router {
        app_with(DummyProvider::new())
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), 1 << 20).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    /// Like `send`, but the response body is returned as text; error bodies
    /// produced by axum's extractors are plain text.
    async fn send_raw(app: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, String) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), 1 << 20).await.unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn health_reports_provider_and_kb() {
        let (status, body) = send(&app(), "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["provider"], "dummy");
        assert_eq!(body["provider_ready"], true);
        assert_eq!(body["knowledge_entries"], 1);
    }

    #[tokio::test]
    async fn topics_listed() {
        let (status, body) = send(&app(), "GET", "/api/topics", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["topics"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn chat_local_then_model() {
        let app = app();
        let (status, body) = send(&app, "POST", "/api/chat", Some(json!({ "message": "I have a fever" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reply"], "Rest and drink fluids.");
        assert_eq!(body["source"], "local");
        assert_eq!(body["conversation_id"], "default");

        let (_, body) = send(&app, "POST", "/api/chat", Some(json!({ "message": "tell me more" }))).await;
        assert_eq!(body["reply"], "[echo #1] tell me more");
        assert_eq!(body["source"], "model");
    }

    #[tokio::test]
    async fn chat_with_image_always_delegates() {
        let body = json!({
            "message": "fever rash?",
            "image": { "data": "iVBORw==", "mime_type": "image/png" }
        });
        let (status, body) = send(&app(), "POST", "/api/chat", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "model");
        assert_eq!(body["reply"], "[echo #1] fever rash? [image image/png]");
    }

    #[tokio::test]
    async fn chat_rejects_empty_turn() {
        let (status, body) = send(&app(), "POST", "/api/chat", Some(json!({ "message": "   " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "empty_message");
    }

    #[tokio::test]
    async fn chat_rejects_bad_image() {
        let bad_b64 = json!({ "message": "x", "image": { "data": "***", "mime_type": "image/png" } });
        let (status, body) = send(&app(), "POST", "/api/chat", Some(bad_b64)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_image");

        let not_image = json!({ "message": "x", "image": { "data": "iVBORw==", "mime_type": "text/plain" } });
        let (status, _) = send(&app(), "POST", "/api/chat", Some(not_image)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    /// Base64 of a JPEG-looking blob of `len` bytes.
    fn jpeg_b64(len: usize) -> String {
        use base64::Engine;
        let mut data = vec![0u8; len];
        data[..3].copy_from_slice(&[0xff, 0xd8, 0xff]);
        base64::engine::general_purpose::STANDARD.encode(&data)
    }

    #[tokio::test]
    async fn chat_accepts_photo_larger_than_axum_default_limit() {
        let body = json!({
            "message": "what is this?",
            "image": { "data": jpeg_b64(3 * 1024 * 1024), "mime_type": "image/jpeg" }
        });
        let (status, body) = send(&app(), "POST", "/api/chat", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "model");
        assert_eq!(body["reply"], "[echo #1] what is this? [image image/jpeg]");
    }

    #[tokio::test]
    async fn chat_body_over_configured_limit_is_rejected() {
        let app = app_with_limit(DummyProvider::new(), 64 * 1024);
        let body = json!({
            "message": "what is this?",
            "image": { "data": jpeg_b64(128 * 1024), "mime_type": "image/jpeg" }
        });
        let (status, _) = send_raw(&app, "POST", "/api/chat", body).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn chat_failure_returns_fallback_with_ok_status() {
        let app = app_with(DummyProvider::failing());
        let (status, body) = send(&app, "POST", "/api/chat", Some(json!({ "message": "random question" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reply"], FALLBACK_REPLY);
        assert_eq!(body["source"], "fallback");
    }

    #[tokio::test]
    async fn reset_starts_fresh_session() {
        let provider = DummyProvider::new();
        let app = app_with(provider.clone());
        let chat = json!({ "conversation_id": "c1", "message": "hello" });
        send(&app, "POST", "/api/chat", Some(chat.clone())).await;
        let (status, body) = send(&app, "POST", "/api/chat/reset", Some(json!({ "conversation_id": "c1" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reset"], true);
        let (_, body) = send(&app, "POST", "/api/chat", Some(chat)).await;
        assert_eq!(body["reply"], "[echo #1] hello");
        assert_eq!(provider.sessions_started(), 2);
    }

    #[tokio::test]
    async fn knowledge_search_endpoint() {
        let app = app();
        let (_, body) = send(&app, "GET", "/api/knowledge/search?q=high%20fever", None).await;
        assert_eq!(body["response"], "Rest and drink fluids.");
        let (_, body) = send(&app, "GET", "/api/knowledge/search?q=feverish", None).await;
        assert!(body["response"].is_null());
    }

    #[tokio::test]
    async fn bmi_endpoint() {
        let app = app();
        let (status, body) = send(&app, "POST", "/api/bmi", Some(json!({ "height_cm": 175, "weight_kg": 70 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["bmi"], 22.9);
        assert_eq!(body["category"], "Normal weight");

        let (status, _) = send(&app, "POST", "/api/bmi", Some(json!({ "height_cm": 0, "weight_kg": 70 }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn calorie_log_crud() {
        let app = app();
        let (status, item) = send(&app, "POST", "/api/calories", Some(json!({ "name": "Apple", "calories": 95 }))).await;
        assert_eq!(status, StatusCode::CREATED);
        send(&app, "POST", "/api/calories", Some(json!({ "name": "Salad", "calories": 150 }))).await;

        // Three sample items are present from the start.
        let (_, list) = send(&app, "GET", "/api/calories", None).await;
        assert_eq!(list["total"], 410 + 245);
        assert_eq!(list["items"].as_array().unwrap().len(), 5);
        assert_eq!(item["id"], 4);

        let id = item["id"].as_u64().unwrap();
        let (status, _) = send(&app, "DELETE", &format!("/api/calories/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "DELETE", &format!("/api/calories/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, "POST", "/api/calories", Some(json!({ "name": "", "calories": 10 }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
