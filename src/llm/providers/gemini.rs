//! Google Gemini chat provider (`models/{model}:generateContent`).
//!
//! The REST endpoint is stateless, so a [`GeminiSession`] keeps the turn
//! history client-side and replays it on every request, the same way the
//! official SDK's chat object does. All Gemini wire types are private to this
//! module.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::llm::{MessagePart, ProviderError};

const API_KEY_VAR: &str = "API_KEY";

// ── Public provider ───────────────────────────────────────────────────────────

/// Constructed once at startup, then cheaply cloned because
/// `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    api_base_url: String,
    model: String,
    temperature: f32,
    api_key: Option<String>,
}

impl GeminiProvider {
    pub fn new(
        api_base_url: String,
        model: String,
        temperature: f32,
        timeout_seconds: u64,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, api_base_url, model, temperature, api_key })
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// Open a session. Errors immediately when no API key is configured.
    pub fn start_chat(&self, system_instruction: &str) -> Result<GeminiSession, ProviderError> {
        if self.api_key.is_none() {
            return Err(ProviderError::MissingCredential(API_KEY_VAR));
        }
        debug!(model = %self.model, "gemini chat session created");
        Ok(GeminiSession {
            provider: self.clone(),
            system_instruction: system_instruction.to_string(),
            history: Vec::new(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base_url.trim_end_matches('/'),
            self.model
        )
    }

    async fn generate(&self, request: &GenerateContentRequest) -> Result<GenerateContentResponse, ProviderError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingCredential(API_KEY_VAR))?;

        debug!(
            model = %self.model,
            turns = request.contents.len(),
            "sending gemini request"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(request)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full gemini request payload");
        }

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(model = %self.model, error = %e, timeout = e.is_timeout(), "gemini HTTP request failed (transport)");
                ProviderError::Request(e.to_string())
            })?;

        let response = check_status(response).await?;

        response.json::<GenerateContentResponse>().await.map_err(|e| {
            error!(error = %e, "failed to deserialize gemini response");
            ProviderError::Request(format!("failed to parse response body: {e}"))
        })
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct GeminiSession {
    provider: GeminiProvider,
    system_instruction: String,
    history: Vec<Content>,
}

impl GeminiSession {
    /// Send one user turn with the full history; append both sides on success.
    pub async fn send_message(&mut self, parts: Vec<MessagePart>) -> Result<String, ProviderError> {
        let user_turn = Content {
            role: Some("user".to_string()),
            parts: parts.into_iter().map(Part::from).collect(),
        };

        let mut contents = self.history.clone();
        contents.push(user_turn.clone());

        let request = GenerateContentRequest {
            contents,
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part::Text { text: self.system_instruction.clone() }],
            }),
            generation_config: Some(GenerationConfig {
                temperature: Some(self.provider.temperature),
            }),
        };

        let response = self.provider.generate(&request).await?;
        let text = response.text()?;

        self.history.push(user_turn);
        self.history.push(Content {
            role: Some("model".to_string()),
            parts: vec![Part::Text { text: text.clone() }],
        });
        Ok(text)
    }

    /// Completed user/model exchanges.
    pub fn turns(&self) -> usize {
        self.history.len() / 2
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
    /// Anything else the API may return (function calls, thoughts, ...).
    Other(serde_json::Value),
}

impl From<MessagePart> for Part {
    fn from(part: MessagePart) -> Self {
        match part {
            MessagePart::Text(text) => Part::Text { text },
            MessagePart::InlineData { mime_type, data } => Part::InlineData {
                inline_data: Blob { mime_type, data },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, like the SDK's `response.text`.
    fn text(self) -> Result<String, ProviderError> {
        if let Some(usage) = &self.usage_metadata {
            debug!(
                input_tokens = usage.prompt_token_count,
                output_tokens = usage.candidates_token_count,
                "gemini usage"
            );
        }

        let Some(candidate) = self.candidates.into_iter().next() else {
            let reason = self
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(ProviderError::Request(format!("prompt rejected: {reason}")));
        };

        let text: String = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text),
                _ => None,
            })
            .collect();

        if text.trim().is_empty() {
            debug!(finish_reason = ?candidate.finish_reason, "gemini candidate carried no text");
            return Err(ProviderError::EmptyReply);
        }
        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

// Error envelope used by Google APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Consume the response and return it if successful, or a structured error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(env) => {
            let tag = env.error.status.map(|s| format!(" [{s}]")).unwrap_or_default();
            format!("HTTP {status}{tag}: {}", env.error.message)
        }
        Err(_) => format!("HTTP {status}: {body}"),
    };

    error!(%status, %message, "gemini request returned HTTP error");
    Err(ProviderError::Request(message))
}
