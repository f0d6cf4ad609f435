//! Axum handlers for `/api/*` routes.
//!
//! Each handler receives [`AxumState`] via [`axum::extract::State`] and
//! returns an axum [`Response`]. Client mistakes get a JSON error body with a
//! stable `error` code; a failed model call is not a client mistake and still
//! answers 200 with the fallback reply.

use std::time::Duration;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::comms::DEFAULT_CONVERSATION;
use crate::router::ImageAttachment;
use crate::widgets::{bmi::calculate as calculate_bmi, topics::{HEALTH_TOPICS, greeting}};

use super::AxumState;

/// Upper bound on one chat turn, including the wait for the conversation lock.
const CHAT_TIMEOUT: Duration = Duration::from_secs(120);

// ── Request types ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct ImagePayload {
    data: String,
    mime_type: String,
}

#[derive(Deserialize)]
pub(super) struct ChatRequest {
    conversation_id: Option<String>,
    #[serde(default)]
    message: String,
    image: Option<ImagePayload>,
    topic: Option<String>,
}

#[derive(Deserialize, Default)]
pub(super) struct ResetRequest {
    #[serde(default)]
    conversation_id: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct SearchQuery {
    #[serde(default)]
    q: String,
}

#[derive(Deserialize)]
pub(super) struct BmiRequest {
    height_cm: f64,
    weight_kg: f64,
}

#[derive(Deserialize)]
pub(super) struct FoodRequest {
    name: String,
    calories: u32,
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Build a JSON error response body.
fn json_error(code: &str, msg: impl std::fmt::Display) -> Json<serde_json::Value> {
    Json(json!({ "error": code, "message": format!("{msg}") }))
}

fn resolve_conversation_id(raw: Option<String>) -> String {
    raw.map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| DEFAULT_CONVERSATION.to_string())
}

fn decode_image(payload: ImagePayload) -> Result<ImageAttachment, String> {
    let mime_type = payload.mime_type.trim().to_ascii_lowercase();
    if !mime_type.starts_with("image/") {
        return Err(format!("unsupported mime type '{mime_type}'"));
    }
    let data = STANDARD
        .decode(payload.data.trim())
        .map_err(|e| format!("image data is not valid base64: {e}"))?;
    if data.is_empty() {
        return Err("image data is empty".to_string());
    }
    Ok(ImageAttachment { data, mime_type })
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// GET /api/health
pub(super) async fn health(State(state): State<AxumState>) -> Response {
    let comms = &state.comms;
    let knowledge_entries = comms.knowledge().load().await;
    Json(json!({
        "status": "ok",
        "app": comms.app_name(),
        "provider": comms.provider().name(),
        "provider_ready": comms.provider().is_ready(),
        "knowledge_entries": knowledge_entries,
    }))
    .into_response()
}

/// GET /api/topics
pub(super) async fn topics() -> Response {
    let list: Vec<_> = HEALTH_TOPICS
        .iter()
        .map(|&name| json!({ "name": name, "greeting": greeting(Some(name)) }))
        .collect();
    Json(json!({ "topics": list, "default_greeting": greeting(None) })).into_response()
}

/// POST /api/chat
pub(super) async fn chat(State(state): State<AxumState>, Json(req): Json<ChatRequest>) -> Response {
    let ChatRequest { conversation_id: raw_id, message, image, topic } = req;

    if message.trim().is_empty() && image.is_none() {
        return (StatusCode::BAD_REQUEST, json_error("empty_message", "message or image required"))
            .into_response();
    }

    let image = match image.map(decode_image).transpose() {
        Ok(image) => image,
        Err(msg) => {
            warn!(channel_id = %state.channel_id, "rejected chat image: {msg}");
            return (StatusCode::BAD_REQUEST, json_error("invalid_image", msg)).into_response();
        }
    };

    let conversation_id = resolve_conversation_id(raw_id);
    debug!(
        channel_id = %state.channel_id,
        %conversation_id,
        topic = topic.as_deref().unwrap_or("-"),
        has_image = image.is_some(),
        "chat turn"
    );

    let router = state.comms.conversation(&conversation_id).await;
    match tokio::time::timeout(CHAT_TIMEOUT, router.respond_detailed(&message, image)).await {
        Ok(reply) => Json(json!({
            "conversation_id": conversation_id,
            "reply": reply.text,
            "source": reply.source,
        }))
        .into_response(),
        Err(_) => {
            warn!(channel_id = %state.channel_id, %conversation_id, "chat request timed out");
            (StatusCode::GATEWAY_TIMEOUT, json_error("timeout", "chat request timed out")).into_response()
        }
    }
}

/// POST /api/chat/reset: body optional.
pub(super) async fn chat_reset(State(state): State<AxumState>, body: Option<Json<ResetRequest>>) -> Response {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let conversation_id = resolve_conversation_id(req.conversation_id);
    state.comms.reset_conversation(&conversation_id).await;
    Json(json!({ "conversation_id": conversation_id, "reset": true })).into_response()
}

/// GET /api/knowledge/search?q=
pub(super) async fn knowledge_search(
    State(state): State<AxumState>,
    Query(query): Query<SearchQuery>,
) -> Response {
    let response = state.comms.knowledge().search(&query.q).await;
    Json(json!({ "response": response })).into_response()
}

/// POST /api/bmi
pub(super) async fn bmi(Json(req): Json<BmiRequest>) -> Response {
    match calculate_bmi(req.height_cm, req.weight_kg) {
        Some(reading) => Json(json!({
            "bmi": reading.rounded(),
            "category": reading.category.label(),
        }))
        .into_response(),
        None => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json_error("invalid_measurement", "height_cm and weight_kg must be positive numbers"),
        )
            .into_response(),
    }
}

/// GET /api/calories
pub(super) async fn calories_list(State(state): State<AxumState>) -> Response {
    let log = state.comms.calories().lock().await;
    Json(json!({ "items": log.items(), "total": log.total() })).into_response()
}

/// POST /api/calories
pub(super) async fn calories_add(State(state): State<AxumState>, Json(req): Json<FoodRequest>) -> Response {
    let mut log = state.comms.calories().lock().await;
    match log.add(&req.name, req.calories) {
        Some(item) => (StatusCode::CREATED, Json(json!(item))).into_response(),
        None => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json_error("invalid_food_item", "name must be non-empty and calories positive"),
        )
            .into_response(),
    }
}

/// DELETE /api/calories/{id}
pub(super) async fn calories_remove(State(state): State<AxumState>, Path(id): Path<u64>) -> Response {
    if state.comms.calories().lock().await.remove(id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        (StatusCode::NOT_FOUND, json_error("not_found", format!("no food item with id {id}"))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_conversation_id_uses_default() {
        assert_eq!(resolve_conversation_id(None), DEFAULT_CONVERSATION);
        assert_eq!(resolve_conversation_id(Some("  ".into())), DEFAULT_CONVERSATION);
        assert_eq!(resolve_conversation_id(Some(" c7 ".into())), "c7");
    }

    #[test]
    fn decode_image_validates_payload() {
        let ok = decode_image(ImagePayload { data: "iVBORw==".into(), mime_type: "Image/PNG".into() }).unwrap();
        assert_eq!(ok.data, vec![0x89, b'P', b'N', b'G']);
        assert_eq!(ok.mime_type, "image/png");

        assert!(decode_image(ImagePayload { data: "".into(), mime_type: "image/png".into() }).is_err());
        assert!(decode_image(ImagePayload { data: "iVBORw==".into(), mime_type: "application/pdf".into() }).is_err());
    }
}
