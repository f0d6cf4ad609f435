//! LLM provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations, and
//! `ChatSession` is the matching enum over their stateful conversations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities: clone them freely.
//! Sessions are owned by exactly one caller; `send_message` takes `&mut self`.

pub mod prompt;
pub mod providers;

use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("{0} environment variable not set")]
    MissingCredential(&'static str),
    #[error("provider request failed: {0}")]
    Request(String),
    #[error("provider returned no text")]
    EmptyReply,
}

// ── Message parts ─────────────────────────────────────────────────────────────

/// One part of a user turn sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePart {
    Text(String),
    /// Binary attachment; `data` is base64 (standard alphabet, padded).
    InlineData { mime_type: String, data: String },
}

impl MessagePart {
    pub fn text(s: impl Into<String>) -> Self {
        MessagePart::Text(s.into())
    }
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
/// Adding a backend = new module + new variant + new match arms.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Dummy(providers::dummy::DummyProvider),
    #[cfg(feature = "provider-gemini")]
    Gemini(providers::gemini::GeminiProvider),
}

impl LlmProvider {
    /// Open a new conversation primed with `system_instruction`.
    ///
    /// Fails fast (no network) when the provider lacks a credential.
    pub fn start_chat(&self, system_instruction: &str) -> Result<ChatSession, ProviderError> {
        match self {
            LlmProvider::Dummy(p) => Ok(ChatSession::Dummy(p.start_chat(system_instruction))),
            #[cfg(feature = "provider-gemini")]
            LlmProvider::Gemini(p) => p.start_chat(system_instruction).map(ChatSession::Gemini),
        }
    }

    /// Whether `start_chat` can succeed without a configuration change.
    pub fn is_ready(&self) -> bool {
        match self {
            LlmProvider::Dummy(_) => true,
            #[cfg(feature = "provider-gemini")]
            LlmProvider::Gemini(p) => p.has_credential(),
        }
    }

    /// Short provider name for logs and status output.
    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::Dummy(_) => "dummy",
            #[cfg(feature = "provider-gemini")]
            LlmProvider::Gemini(_) => "gemini",
        }
    }
}

// ── Session enum ──────────────────────────────────────────────────────────────

/// A live conversation with accumulated turn history.
#[derive(Debug)]
pub enum ChatSession {
    Dummy(providers::dummy::DummySession),
    #[cfg(feature = "provider-gemini")]
    Gemini(providers::gemini::GeminiSession),
}

impl ChatSession {
    /// Send one user turn and return the model's text reply.
    ///
    /// The turn is added to the session history only when the call succeeds.
    pub async fn send_message(&mut self, parts: Vec<MessagePart>) -> Result<String, ProviderError> {
        match self {
            ChatSession::Dummy(s) => s.send_message(parts).await,
            #[cfg(feature = "provider-gemini")]
            ChatSession::Gemini(s) => s.send_message(parts).await,
        }
    }

    /// Number of completed turns held in this session.
    pub fn turns(&self) -> usize {
        match self {
            ChatSession::Dummy(s) => s.turns(),
            #[cfg(feature = "provider-gemini")]
            ChatSession::Gemini(s) => s.turns(),
        }
    }
}
