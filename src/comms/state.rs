//! Shared state for the comms layer: capability boundary for channels.
//!
//! Channels receive an `Arc<CommsState>` and are restricted to the typed
//! methods below. Each conversation id maps to its own [`ResponseRouter`],
//! so turns of one conversation are serialized while separate conversations
//! run in parallel over the same knowledge base.
//!
//! Conversation ids are client-chosen, so the table is bounded: a reset
//! removes the conversation, and opening one past the cap evicts the least
//! recently used.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::knowledge::KnowledgeLookup;
use crate::llm::LlmProvider;
use crate::router::ResponseRouter;
use crate::widgets::calories::CalorieLog;

/// Conversation used when a request names none.
pub const DEFAULT_CONVERSATION: &str = "default";

/// Open conversations kept before the least recently used one is dropped.
pub const MAX_CONVERSATIONS: usize = 1024;

struct Conversation {
    router: Arc<ResponseRouter>,
    last_used: Instant,
}

pub struct CommsState {
    app_name: String,
    knowledge: Arc<KnowledgeLookup>,
    provider: LlmProvider,
    system_instruction: Arc<str>,
    local_reply_delay: Duration,
    conversations: Mutex<HashMap<String, Conversation>>,
    max_conversations: usize,
    calories: Mutex<CalorieLog>,
}

impl CommsState {
    pub fn new(
        app_name: impl Into<String>,
        knowledge: Arc<KnowledgeLookup>,
        provider: LlmProvider,
        system_instruction: impl Into<Arc<str>>,
        local_reply_delay: Duration,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            knowledge,
            provider,
            system_instruction: system_instruction.into(),
            local_reply_delay,
            conversations: Mutex::new(HashMap::new()),
            max_conversations: MAX_CONVERSATIONS,
            calories: Mutex::new(CalorieLog::with_sample_items()),
        }
    }

    /// Keep at most `max` conversations open (at least one).
    pub fn with_max_conversations(mut self, max: usize) -> Self {
        self.max_conversations = max.max(1);
        self
    }

    /// Router for `conversation_id`, created on first use.
    pub async fn conversation(&self, conversation_id: &str) -> Arc<ResponseRouter> {
        let mut conversations = self.conversations.lock().await;
        let now = Instant::now();

        if let Some(entry) = conversations.get_mut(conversation_id) {
            entry.last_used = now;
            return entry.router.clone();
        }

        while conversations.len() >= self.max_conversations {
            let Some(oldest) = conversations
                .iter()
                .min_by_key(|(_, c)| c.last_used)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            conversations.remove(&oldest);
            info!(conversation_id = %oldest, "idle conversation evicted");
        }

        debug!(%conversation_id, "conversation opened");
        let router = Arc::new(
            ResponseRouter::new(
                self.knowledge.clone(),
                self.provider.clone(),
                self.system_instruction.clone(),
            )
            .with_local_reply_delay(self.local_reply_delay),
        );
        conversations.insert(
            conversation_id.to_string(),
            Conversation { router: router.clone(), last_used: now },
        );
        router
    }

    /// Discard `conversation_id` and its remote session. The next turn with
    /// that id starts a new conversation.
    pub async fn reset_conversation(&self, conversation_id: &str) {
        let removed = self.conversations.lock().await.remove(conversation_id);
        if let Some(conversation) = removed {
            conversation.router.reset().await;
            debug!(%conversation_id, "conversation discarded");
        }
    }

    /// Number of open conversations.
    pub async fn conversation_count(&self) -> usize {
        self.conversations.lock().await.len()
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn knowledge(&self) -> &KnowledgeLookup {
        &self.knowledge
    }

    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    pub fn calories(&self) -> &Mutex<CalorieLog> {
        &self.calories
    }
}
