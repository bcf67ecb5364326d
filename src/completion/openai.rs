//! OpenAI-compatible chat-completions client (plain and SSE-streamed).

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{ChatMessage, CompletionProvider, CompletionStream};

#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    fn request(&self, messages: &[ChatMessage], stream: bool) -> reqwest::RequestBuilder {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "response_format": {"type": "json_object"},
        });
        if stream {
            body["stream"] = Value::Bool(true);
        }
        self.client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
    }
}

fn error_message(body: &Value) -> Option<String> {
    let err = body.get("error")?;
    err.get("message").and_then(|m| m.as_str()).map(|s| s.to_string())
        .or_else(|| err.as_str().map(|s| s.to_string()))
}

/// `choices[0].message.content` of a non-streamed completion.
fn completion_content(body: &Value) -> Result<String> {
    if let Some(msg) = error_message(body) {
        return Err(anyhow!(msg));
    }
    body.pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("completion response carried no message content"))
}

/// Content fragment of one streamed chunk; `None` for role-only or empty deltas.
fn chunk_content(data: &str) -> Result<Option<String>> {
    let v: Value = serde_json::from_str(data).context("malformed stream chunk")?;
    if let Some(msg) = error_message(&v) {
        return Err(anyhow!(msg));
    }
    Ok(v.pointer("/choices/0/delta/content")
        .and_then(|c| c.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string()))
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let resp = self.request(messages, false).send().await.context("completion request failed")?;
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            let msg = error_message(&body).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(anyhow!("completion provider error: {}", msg));
        }
        completion_content(&body)
    }

    async fn stream(&self, messages: &[ChatMessage]) -> Result<CompletionStream> {
        let mut es = EventSource::new(self.request(messages, true))
            .map_err(|e| anyhow!("cannot open completion stream: {:?}", e))?;
        let model = self.model.clone();
        let s = async_stream::stream! {
            while let Some(event) = es.next().await {
                match event {
                    Ok(Event::Open) => debug!(target: "chat", model = %model, "completion stream opened"),
                    Ok(Event::Message(msg)) => {
                        if msg.data.trim() == "[DONE]" {
                            break;
                        }
                        match chunk_content(&msg.data) {
                            Ok(Some(text)) => yield Ok(text),
                            Ok(None) => {}
                            Err(e) => { yield Err(e); break; }
                        }
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => break,
                    Err(reqwest_eventsource::Error::InvalidStatusCode(status, resp)) => {
                        let body: Value = resp.json().await.unwrap_or(Value::Null);
                        let msg = error_message(&body).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
                        warn!(target: "chat", "completion stream rejected: {}", msg);
                        yield Err(anyhow!("completion provider error: {}", msg));
                        break;
                    }
                    Err(e) => {
                        warn!(target: "chat", "completion stream failed: {}", e);
                        yield Err(anyhow!("completion stream failed: {}", e));
                        break;
                    }
                }
            }
            es.close();
        };
        Ok(Box::pin(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_message_content() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": "{\"cards\":[]}"}}]});
        assert_eq!(completion_content(&body).unwrap(), "{\"cards\":[]}");
        assert!(completion_content(&json!({"choices": []})).is_err());
    }

    #[test]
    fn provider_errors_surface_their_message() {
        let body = json!({"error": {"message": "Rate limit reached", "type": "requests"}});
        assert_eq!(completion_content(&body).unwrap_err().to_string(), "Rate limit reached");
    }

    #[test]
    fn stream_chunks_yield_delta_content() {
        let c = r#"{"choices":[{"index":0,"delta":{"content":"{\"q"}}]}"#;
        assert_eq!(chunk_content(c).unwrap().as_deref(), Some("{\"q"));
        let role_only = r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        assert_eq!(chunk_content(role_only).unwrap(), None);
        assert!(chunk_content("not json").is_err());
    }
}
