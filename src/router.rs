//! Per-conversation response routing.
//!
//! Each user turn is answered either locally from the knowledge base or by
//! the remote chat model:
//!
//! ```text
//! no image && knowledge hit  ──► Local     (session untouched)
//! otherwise                  ──► Delegated (lazy session, image first)
//! delegated failure          ──► Fallback  (fixed apology, no retry)
//! ```
//!
//! A local answer is not recorded in the remote session; the model never
//! sees those exchanges.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::knowledge::KnowledgeLookup;
use crate::llm::{ChatSession, LlmProvider, MessagePart};

/// Reply returned whenever the delegated call fails.
pub const FALLBACK_REPLY: &str =
    "Sorry, I encountered an error while trying to respond. Please try again.";

/// Raw image supplied with a user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// Which path produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    Local,
    Model,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedReply {
    pub text: String,
    pub source: ReplySource,
}

impl RoutedReply {
    fn fallback() -> Self {
        Self { text: FALLBACK_REPLY.to_string(), source: ReplySource::Fallback }
    }
}

/// Routes the turns of one conversation.
///
/// Calls on the same router are serialized; separate routers share only the
/// knowledge base and the provider handle.
pub struct ResponseRouter {
    knowledge: Arc<KnowledgeLookup>,
    provider: LlmProvider,
    system_instruction: Arc<str>,
    local_reply_delay: Duration,
    session: Mutex<Option<ChatSession>>,
}

impl ResponseRouter {
    pub fn new(
        knowledge: Arc<KnowledgeLookup>,
        provider: LlmProvider,
        system_instruction: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            knowledge,
            provider,
            system_instruction: system_instruction.into(),
            local_reply_delay: Duration::ZERO,
            session: Mutex::new(None),
        }
    }

    /// Pause before returning local answers.
    pub fn with_local_reply_delay(mut self, delay: Duration) -> Self {
        self.local_reply_delay = delay;
        self
    }

    /// Answer one user turn. Never fails; see [`FALLBACK_REPLY`].
    pub async fn respond(&self, message: &str, image: Option<ImageAttachment>) -> String {
        self.respond_detailed(message, image).await.text
    }

    /// Like [`respond`](Self::respond), also reporting which path answered.
    pub async fn respond_detailed(&self, message: &str, image: Option<ImageAttachment>) -> RoutedReply {
        let mut guard = self.session.lock().await;

        if image.is_none() {
            if let Some(answer) = self.knowledge.search(message).await {
                info!(source = "local", "reply from knowledge base");
                if !self.local_reply_delay.is_zero() {
                    tokio::time::sleep(self.local_reply_delay).await;
                }
                return RoutedReply { text: answer, source: ReplySource::Local };
            }
        }

        if guard.is_none() {
            match self.provider.start_chat(&self.system_instruction) {
                Ok(session) => {
                    info!(provider = self.provider.name(), "conversation session created");
                    *guard = Some(session);
                }
                Err(e) => {
                    error!(provider = self.provider.name(), "cannot open conversation session: {e}");
                    return RoutedReply::fallback();
                }
            }
        }
        let Some(session) = guard.as_mut() else {
            return RoutedReply::fallback();
        };

        let parts = build_parts(message, image);
        debug!(parts = parts.len(), turns = session.turns(), "delegating to model");

        match session.send_message(parts).await {
            Ok(text) => {
                info!(source = "model", turns = session.turns(), "reply from model");
                RoutedReply { text, source: ReplySource::Model }
            }
            Err(e) => {
                error!(provider = self.provider.name(), "model call failed: {e}");
                RoutedReply::fallback()
            }
        }
    }

    /// Forget the conversation. The next delegated turn opens a new session.
    pub async fn reset(&self) {
        if self.session.lock().await.take().is_some() {
            info!("conversation session discarded");
        }
    }

    /// Whether a remote session is currently open.
    pub async fn has_session(&self) -> bool {
        self.session.lock().await.is_some()
    }
}

/// Image part first, then the text. An empty caption is left out when an
/// image carries the turn.
fn build_parts(message: &str, image: Option<ImageAttachment>) -> Vec<MessagePart> {
    let mut parts = Vec::with_capacity(2);
    let has_image = image.is_some();
    if let Some(img) = image {
        parts.push(MessagePart::InlineData {
            mime_type: img.mime_type,
            data: STANDARD.encode(&img.data),
        });
    }
    if !has_image || !message.trim().is_empty() {
        parts.push(MessagePart::text(message));
    }
    parts
}
