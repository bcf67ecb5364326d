//! Generation proxy: `/chat` (single JSON response) and `/chat/stream` (SSE).

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::AppState;
use crate::completion::{messages_from_prompt, ChatMessage, CompletionProvider};
use crate::error::{AppError, AppResult};
use crate::prompt::{apply_to_messages, GenerationOptions, BLOOM_LEVELS};

#[derive(Debug, Default, Deserialize)]
pub struct ChatQuery {
    #[serde(default)]
    pub prompt: Option<String>,
    /// JSON-encoded `GenerationOptions`.
    #[serde(default)]
    pub options: Option<String>,
}

pub fn build_messages(q: &ChatQuery) -> AppResult<Vec<ChatMessage>> {
    let prompt = q.prompt.as_deref().filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::validation("missing_prompt", "Missing prompt parameter"))?;
    let mut messages = messages_from_prompt(prompt);
    if let Some(raw) = q.options.as_deref().filter(|o| !o.trim().is_empty()) {
        let opts = GenerationOptions::from_query(raw)?;
        apply_to_messages(&mut messages, &opts);
    }
    Ok(messages)
}

pub async fn chat(State(state): State<AppState>, Query(q): Query<ChatQuery>) -> AppResult<Json<Value>> {
    let messages = build_messages(&q)?;
    let provider = state.completion_provider()?;
    info!(target: "chat", model = provider.model(), messages = messages.len(), "completion requested");
    let content = provider.complete(&messages).await.map_err(AppError::from_provider)?;
    Ok(Json(json!({"response": content})))
}

fn error_event(err: &anyhow::Error) -> Event {
    warn!(target: "chat", "stream error: {:#}", err);
    Event::default().data(json!({"error": format!("{:#}", err)}).to_string())
}

/// `{content}` frames as fragments arrive, an `{error}` frame on failure, then `[DONE]`.
fn sse_frames(provider: Arc<dyn CompletionProvider>, messages: Vec<ChatMessage>) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        match provider.stream(&messages).await {
            Ok(mut fragments) => {
                while let Some(item) = fragments.next().await {
                    match item {
                        Ok(text) => yield Ok(Event::default().data(json!({"content": text}).to_string())),
                        Err(e) => {
                            yield Ok(error_event(&e));
                            break;
                        }
                    }
                }
            }
            Err(e) => yield Ok(error_event(&e)),
        }
        yield Ok(Event::default().data("[DONE]"));
    }
}

pub async fn chat_stream(
    State(state): State<AppState>,
    Query(q): Query<ChatQuery>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let messages = build_messages(&q)?;
    let provider = state.completion_provider()?;
    info!(target: "chat", model = provider.model(), messages = messages.len(), "completion stream requested");
    Ok(Sse::new(sse_frames(provider, messages)).keep_alive(KeepAlive::default()))
}

pub async fn generation_options() -> Json<Value> {
    Json(json!({
        "defaults": GenerationOptions::default(),
        "bloom_levels": BLOOM_LEVELS,
    }))
}
