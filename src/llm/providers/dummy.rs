//! Dummy LLM provider: echoes input back prefixed with `[echo #N]`, where
//! `N` is the turn number within the session.
//!
//! Used for running without an API key and for exercising session lifecycle
//! in tests: the shared counters show how many sessions were opened and how
//! many messages actually reached the provider.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::llm::{MessagePart, ProviderError};

#[derive(Debug, Clone, Default)]
pub struct DummyProvider {
    sessions_started: Arc<AtomicUsize>,
    messages_sent: Arc<AtomicUsize>,
    fail: bool,
}

impl DummyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose sessions reject every message.
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn start_chat(&self, _system_instruction: &str) -> DummySession {
        self.sessions_started.fetch_add(1, Ordering::SeqCst);
        DummySession {
            history: Vec::new(),
            messages_sent: self.messages_sent.clone(),
            fail: self.fail,
        }
    }

    /// Sessions opened across all clones of this provider.
    pub fn sessions_started(&self) -> usize {
        self.sessions_started.load(Ordering::SeqCst)
    }

    /// Messages delivered to any session of this provider, failed ones included.
    pub fn messages_sent(&self) -> usize {
        self.messages_sent.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct DummySession {
    history: Vec<String>,
    messages_sent: Arc<AtomicUsize>,
    fail: bool,
}

impl DummySession {
    pub async fn send_message(&mut self, parts: Vec<MessagePart>) -> Result<String, ProviderError> {
        self.messages_sent.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::Request("dummy provider set to fail".into()));
        }

        let mut text = Vec::new();
        let mut images = Vec::new();
        for part in parts {
            match part {
                MessagePart::Text(t) => text.push(t),
                MessagePart::InlineData { mime_type, .. } => images.push(mime_type),
            }
        }

        let turn = self.history.len() + 1;
        let mut reply = format!("[echo #{turn}]");
        if !text.is_empty() {
            reply.push(' ');
            reply.push_str(&text.join(" "));
        }
        for mime in &images {
            reply.push_str(&format!(" [image {mime}]"));
        }
        self.history.push(reply.clone());
        Ok(reply)
    }

    pub fn turns(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn numbers_turns_within_a_session() {
        let p = DummyProvider::new();
        let mut s = p.start_chat("sys");
        assert_eq!(s.send_message(vec![MessagePart::text("hello")]).await.unwrap(), "[echo #1] hello");
        assert_eq!(s.send_message(vec![MessagePart::text("again")]).await.unwrap(), "[echo #2] again");
        assert_eq!(p.messages_sent(), 2);
    }

    #[tokio::test]
    async fn new_session_starts_from_one() {
        let p = DummyProvider::new();
        let mut a = p.start_chat("sys");
        a.send_message(vec![MessagePart::text("x")]).await.unwrap();
        let mut b = p.start_chat("sys");
        assert_eq!(b.send_message(vec![MessagePart::text("y")]).await.unwrap(), "[echo #1] y");
        assert_eq!(p.sessions_started(), 2);
    }

    #[tokio::test]
    async fn mentions_inline_images() {
        let p = DummyProvider::new();
        let mut s = p.start_chat("sys");
        let reply = s
            .send_message(vec![
                MessagePart::InlineData { mime_type: "image/png".into(), data: "AAAA".into() },
                MessagePart::text("what is this"),
            ])
            .await
            .unwrap();
        assert_eq!(reply, "[echo #1] what is this [image image/png]");
    }

    #[tokio::test]
    async fn failing_provider_does_not_record_turns() {
        let p = DummyProvider::failing();
        let mut s = p.start_chat("sys");
        assert!(s.send_message(vec![MessagePart::text("x")]).await.is_err());
        assert_eq!(s.turns(), 0);
        assert_eq!(p.messages_sent(), 1);
    }
}
