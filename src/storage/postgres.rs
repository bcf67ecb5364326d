//! Direct Postgres backend over `tokio-postgres`.
//!
//! Reads and deletes share one long-lived client; tokio-postgres pipelines concurrent
//! queries over it, and it is replaced once its connection closes. Each save opens its
//! own connection and runs inside one transaction, so a failed question insert leaves
//! no orphaned set row.
//! Reference DDL lives in `sql/schema.sql`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::{Client, Config, NoTls, Row};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{
    FlashcardRow, NewStudySet, QuestionDrafts, QuizQuestionRow, Scope, StudySetRow, StudySetStore,
};

const SET_COLUMNS: &str = r#"id, user_id, title, description, "type", quantity, created_at"#;

pub struct PgStore {
    cfg: Config,
    shared: Mutex<Option<Arc<Client>>>,
    opened: AtomicUsize,
}

impl PgStore {
    pub fn new(dsn: &str) -> Result<Self> {
        let cfg: Config = dsn.parse().context("invalid postgres url")?;
        Ok(Self { cfg, shared: Mutex::new(None), opened: AtomicUsize::new(0) })
    }

    /// Connections established since construction.
    pub fn connections_opened(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }

    async fn shared_client(&self) -> Result<Arc<Client>> {
        let mut slot = self.shared.lock().await;
        if let Some(client) = slot.as_ref().filter(|c| !c.is_closed()) {
            return Ok(client.clone());
        }
        let client = Arc::new(self.connect().await?);
        *slot = Some(client.clone());
        Ok(client)
    }

    async fn connect(&self) -> Result<Client> {
        let (client, conn) = self.cfg.connect(NoTls).await.context("postgres connect failed")?;
        let n = self.opened.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(target: "store", connections = n, "postgres connection opened");
        // drive the connection in background
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::warn!(target: "store", "postgres connection error: {}", e);
            }
        });
        Ok(client)
    }
}

fn owner_id(scope: Scope<'_>) -> Result<Uuid> {
    Uuid::parse_str(scope.user_id).with_context(|| format!("user id is not a uuid: {}", scope.user_id))
}

fn set_from_row(row: &Row) -> StudySetRow {
    StudySetRow {
        id: row.get("id"),
        user_id: row.get::<_, Uuid>("user_id").to_string(),
        title: row.get("title"),
        description: row.get::<_, Option<String>>("description").unwrap_or_default(),
        kind_tag: row.get("type"),
        quantity: row.get("quantity"),
        created_at: row.get::<_, DateTime<Utc>>("created_at"),
    }
}

#[async_trait]
impl StudySetStore for PgStore {
    fn backend_name(&self) -> &'static str { "postgres" }

    async fn save_set(&self, scope: Scope<'_>, set: &NewStudySet, questions: &QuestionDrafts) -> Result<Uuid> {
        let owner = owner_id(scope)?;
        let mut client = self.connect().await?;
        let tx = client.transaction().await.context("begin transaction")?;
        let row = tx
            .query_one(
                r#"INSERT INTO study_sets (user_id, title, description, "type", quantity)
                   VALUES ($1, $2, $3, $4, $5) RETURNING id"#,
                &[&owner, &set.title, &set.description, &questions.kind().as_str(), &set.quantity],
            )
            .await
            .context("insert study_sets")?;
        let id: Uuid = row.get(0);

        match questions {
            QuestionDrafts::Flashcards(items) => {
                let stmt = tx
                    .prepare("INSERT INTO flashcard_questions (study_set_id, question, answer, position) VALUES ($1, $2, $3, $4)")
                    .await?;
                for (i, q) in items.iter().enumerate() {
                    let pos = i as i32;
                    tx.execute(&stmt, &[&id, &q.question, &q.answer, &pos]).await.context("insert flashcard_questions")?;
                }
            }
            QuestionDrafts::Quiz(items) => {
                let stmt = tx
                    .prepare("INSERT INTO quiz_questions (study_set_id, question, correct_answer, wrong_answers, position) VALUES ($1, $2, $3, $4, $5)")
                    .await?;
                for (i, q) in items.iter().enumerate() {
                    let pos = i as i32;
                    tx.execute(&stmt, &[&id, &q.question, &q.correct_answer, &q.wrong_answers, &pos])
                        .await
                        .context("insert quiz_questions")?;
                }
            }
        }
        tx.commit().await.context("commit study set")?;
        debug!(target: "store", set_id = %id, questions = questions.len(), "study set committed");
        Ok(id)
    }

    async fn find_set(&self, scope: Scope<'_>, title: &str) -> Result<Option<StudySetRow>> {
        let owner = owner_id(scope)?;
        let client = self.shared_client().await?;
        let sql = format!("SELECT {} FROM study_sets WHERE user_id = $1 AND title = $2 ORDER BY created_at ASC LIMIT 1", SET_COLUMNS);
        let row = client.query_opt(sql.as_str(), &[&owner, &title]).await.context("select study_sets")?;
        Ok(row.as_ref().map(set_from_row))
    }

    async fn list_sets(&self, scope: Scope<'_>) -> Result<Vec<StudySetRow>> {
        let owner = owner_id(scope)?;
        let client = self.shared_client().await?;
        let sql = format!("SELECT {} FROM study_sets WHERE user_id = $1 ORDER BY created_at DESC", SET_COLUMNS);
        let rows = client.query(sql.as_str(), &[&owner]).await.context("list study_sets")?;
        Ok(rows.iter().map(set_from_row).collect())
    }

    async fn has_flashcards(&self, _scope: Scope<'_>, set_id: Uuid) -> Result<bool> {
        let client = self.shared_client().await?;
        let row = client
            .query_one("SELECT EXISTS (SELECT 1 FROM flashcard_questions WHERE study_set_id = $1)", &[&set_id])
            .await
            .context("probe flashcard_questions")?;
        Ok(row.get(0))
    }

    async fn flashcards(&self, _scope: Scope<'_>, set_id: Uuid) -> Result<Vec<FlashcardRow>> {
        let client = self.shared_client().await?;
        let rows = client
            .query(
                "SELECT id, study_set_id, question, answer, position FROM flashcard_questions WHERE study_set_id = $1 ORDER BY position ASC",
                &[&set_id],
            )
            .await
            .context("select flashcard_questions")?;
        Ok(rows.iter().map(|r| FlashcardRow {
            id: r.get("id"),
            study_set_id: r.get("study_set_id"),
            question: r.get("question"),
            answer: r.get("answer"),
            position: r.get("position"),
        }).collect())
    }

    async fn quiz_questions(&self, _scope: Scope<'_>, set_id: Uuid) -> Result<Vec<QuizQuestionRow>> {
        let client = self.shared_client().await?;
        let rows = client
            .query(
                "SELECT id, study_set_id, question, correct_answer, wrong_answers, position FROM quiz_questions WHERE study_set_id = $1 ORDER BY position ASC",
                &[&set_id],
            )
            .await
            .context("select quiz_questions")?;
        Ok(rows.iter().map(|r| QuizQuestionRow {
            id: r.get("id"),
            study_set_id: r.get("study_set_id"),
            question: r.get("question"),
            correct_answer: r.get("correct_answer"),
            wrong_answers: r.get::<_, Option<Vec<String>>>("wrong_answers").unwrap_or_default(),
            position: r.get("position"),
        }).collect())
    }

    async fn delete_sets(&self, scope: Scope<'_>, title: &str) -> Result<u64> {
        let owner = owner_id(scope)?;
        let client = self.shared_client().await?;
        let n = client
            .execute("DELETE FROM study_sets WHERE user_id = $1 AND title = $2", &[&owner, &title])
            .await
            .context("delete study_sets")?;
        Ok(n)
    }
}
