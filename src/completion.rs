//!
//! Completion provider seam
//! ------------------------
//! The generation proxy forwards a chat message list to an LLM chat-completions API and
//! asks for JSON-object output. `openai` is the production client; tests substitute fakes.

use anyhow::Result;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod openai;

pub use openai::OpenAiClient;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self { role: "user".into(), content: content.into() }
    }
}

/// Content fragments in arrival order. An `Err` item ends the stream.
pub type CompletionStream = BoxStream<'static, Result<String>>;

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn model(&self) -> &str;

    /// Full completion content once the provider has finished.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Content fragments as the provider delivers them.
    async fn stream(&self, messages: &[ChatMessage]) -> Result<CompletionStream>;
}

/// Interpret the `prompt` query parameter.
///
/// JSON holding a list of `{role, content}` messages (or one such object) is used as-is.
/// Anything else, including JSON of another shape, becomes a single user message with the raw text.
pub fn messages_from_prompt(prompt: &str) -> Vec<ChatMessage> {
    match serde_json::from_str::<Value>(prompt) {
        Ok(Value::Array(items)) if !items.is_empty() => {
            let parsed: Result<Vec<ChatMessage>, _> = items.into_iter().map(serde_json::from_value).collect();
            match parsed {
                Ok(messages) => messages,
                Err(_) => vec![ChatMessage::user(prompt)],
            }
        }
        Ok(obj @ Value::Object(_)) => match serde_json::from_value::<ChatMessage>(obj) {
            Ok(m) => vec![m],
            Err(_) => vec![ChatMessage::user(prompt)],
        },
        _ => vec![ChatMessage::user(prompt)],
    }
}
