//! Supabase PostgREST backend.
//!
//! Save is a sequence of independent inserts (set row, then one row per question).
//! A failure part-way leaves the already-inserted rows in place; nothing is rolled back.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    FlashcardRow, NewStudySet, QuestionDrafts, QuizQuestionRow, Scope, StudySetRow, StudySetStore,
    FLASHCARD_QUESTIONS, QUIZ_QUESTIONS, STUDY_SETS,
};

#[derive(Clone)]
pub struct RestStore {
    client: reqwest::Client,
    base: String,
    api_key: String,
    /// When true the api key is a service-role key and is also sent as the bearer,
    /// bypassing row-level security. Otherwise the caller's own token is forwarded.
    service_role: bool,
}

impl RestStore {
    pub fn new(client: reqwest::Client, supabase_url: &str, api_key: &str, service_role: bool) -> Self {
        Self {
            client,
            base: format!("{}/rest/v1", supabase_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            service_role,
        }
    }

    fn request(&self, method: Method, table: &str, scope: Scope<'_>) -> RequestBuilder {
        let bearer = if self.service_role { self.api_key.as_str() } else { scope.access_token };
        self.client
            .request(method, format!("{}/{}", self.base, table))
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    async fn send<T: DeserializeOwned>(req: RequestBuilder, what: &str) -> Result<T> {
        let resp = req.send().await.with_context(|| format!("{} request failed", what))?;
        let status = resp.status();
        if !status.is_success() {
            let body: Value = resp.json().await.unwrap_or(Value::Null);
            let msg = body.get("message").and_then(|v| v.as_str()).unwrap_or("no message");
            warn!(target: "store", "{} failed: HTTP {}: {}", what, status.as_u16(), msg);
            return Err(anyhow!("{}: HTTP {}: {}", what, status.as_u16(), msg));
        }
        resp.json::<T>().await.with_context(|| format!("{}: malformed response", what))
    }

    async fn insert_row(&self, scope: Scope<'_>, table: &str, row: Value) -> Result<Vec<Value>> {
        let req = self.request(Method::POST, table, scope)
            .header("Prefer", "return=representation")
            .json(&row);
        Self::send(req, &format!("insert {}", table)).await
    }
}

#[async_trait]
impl StudySetStore for RestStore {
    fn backend_name(&self) -> &'static str { "supabase" }

    async fn save_set(&self, scope: Scope<'_>, set: &NewStudySet, questions: &QuestionDrafts) -> Result<Uuid> {
        let inserted = self.insert_row(scope, STUDY_SETS, json!({
            "user_id": scope.user_id,
            "title": set.title,
            "description": set.description,
            "type": questions.kind().as_str(),
            "quantity": set.quantity,
        })).await?;
        let id: Uuid = inserted.first()
            .and_then(|r| r.get("id"))
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| anyhow!("insert {}: no id returned", STUDY_SETS))?;

        match questions {
            QuestionDrafts::Flashcards(items) => {
                for (i, q) in items.iter().enumerate() {
                    self.insert_row(scope, FLASHCARD_QUESTIONS, json!({
                        "study_set_id": id,
                        "question": q.question,
                        "answer": q.answer,
                        "position": i,
                    })).await?;
                }
            }
            QuestionDrafts::Quiz(items) => {
                for (i, q) in items.iter().enumerate() {
                    self.insert_row(scope, QUIZ_QUESTIONS, json!({
                        "study_set_id": id,
                        "question": q.question,
                        "correct_answer": q.correct_answer,
                        "wrong_answers": q.wrong_answers,
                        "position": i,
                    })).await?;
                }
            }
        }
        debug!(target: "store", set_id = %id, questions = questions.len(), "study set inserted");
        Ok(id)
    }

    async fn find_set(&self, scope: Scope<'_>, title: &str) -> Result<Option<StudySetRow>> {
        let req = self.request(Method::GET, STUDY_SETS, scope).query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{}", scope.user_id)),
            ("title", format!("eq.{}", title)),
            ("order", "created_at.asc".to_string()),
            ("limit", "1".to_string()),
        ]);
        let rows: Vec<StudySetRow> = Self::send(req, "select study_sets").await?;
        Ok(rows.into_iter().next())
    }

    async fn list_sets(&self, scope: Scope<'_>) -> Result<Vec<StudySetRow>> {
        let req = self.request(Method::GET, STUDY_SETS, scope).query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{}", scope.user_id)),
            ("order", "created_at.desc".to_string()),
        ]);
        Self::send(req, "list study_sets").await
    }

    async fn has_flashcards(&self, scope: Scope<'_>, set_id: Uuid) -> Result<bool> {
        let req = self.request(Method::GET, FLASHCARD_QUESTIONS, scope).query(&[
            ("select", "id".to_string()),
            ("study_set_id", format!("eq.{}", set_id)),
            ("limit", "1".to_string()),
        ]);
        let rows: Vec<Value> = Self::send(req, "probe flashcard_questions").await?;
        Ok(!rows.is_empty())
    }

    async fn flashcards(&self, scope: Scope<'_>, set_id: Uuid) -> Result<Vec<FlashcardRow>> {
        let req = self.request(Method::GET, FLASHCARD_QUESTIONS, scope).query(&[
            ("select", "*".to_string()),
            ("study_set_id", format!("eq.{}", set_id)),
            ("order", "position.asc".to_string()),
        ]);
        Self::send(req, "select flashcard_questions").await
    }

    async fn quiz_questions(&self, scope: Scope<'_>, set_id: Uuid) -> Result<Vec<QuizQuestionRow>> {
        let req = self.request(Method::GET, QUIZ_QUESTIONS, scope).query(&[
            ("select", "*".to_string()),
            ("study_set_id", format!("eq.{}", set_id)),
            ("order", "position.asc".to_string()),
        ]);
        Self::send(req, "select quiz_questions").await
    }

    async fn delete_sets(&self, scope: Scope<'_>, title: &str) -> Result<u64> {
        let req = self.request(Method::DELETE, STUDY_SETS, scope)
            .header("Prefer", "return=representation")
            .query(&[
                ("user_id", format!("eq.{}", scope.user_id)),
                ("title", format!("eq.{}", title)),
            ]);
        let removed: Vec<Value> = Self::send(req, "delete study_sets").await?;
        Ok(removed.len() as u64)
    }
}
