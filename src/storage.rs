//!
//! studyhall storage module
//! ------------------------
//! Relational persistence for study sets and their child questions, behind the
//! `StudySetStore` trait. Three backends:
//! - `rest`: Supabase PostgREST over HTTP (sequential inserts, no rollback).
//! - `postgres`: direct `tokio-postgres` connection with a transactional save.
//! - `memory`: in-process tables for local development and tests.
//!
//! Tables: `study_sets`, `flashcard_questions`, `quiz_questions`. Child rows reference
//! `study_sets.id` with cascade delete; the memory backend emulates the cascade.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod memory;
pub mod postgres;
pub mod rest;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use rest::RestStore;

pub const STUDY_SETS: &str = "study_sets";
pub const FLASHCARD_QUESTIONS: &str = "flashcard_questions";
pub const QUIZ_QUESTIONS: &str = "quiz_questions";

/// Caller identity every store call is scoped to. The access token is only used by
/// backends that enforce row-level security in the database.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub user_id: &'a str,
    pub access_token: &'a str,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetKind {
    #[default]
    Flashcards,
    Quiz,
}

impl SetKind {
    /// Canonical tag written to `study_sets.type` and returned to clients.
    pub fn as_str(&self) -> &'static str {
        match self {
            SetKind::Flashcards => "flashcards",
            SetKind::Quiz => "quiz",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySetRow {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    /// Stored tag. Not trusted on read: it has drifted from the actual child rows.
    #[serde(rename = "type", default)]
    pub kind_tag: Option<String>,
    #[serde(default)]
    pub quantity: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashcardRow {
    pub id: Uuid,
    pub study_set_id: Uuid,
    pub question: String,
    pub answer: String,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestionRow {
    pub id: Uuid,
    pub study_set_id: Uuid,
    pub question: String,
    pub correct_answer: String,
    #[serde(default)]
    pub wrong_answers: Vec<String>,
    pub position: i32,
}

/// Set metadata for a save. The kind is taken from the accompanying `QuestionDrafts`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStudySet {
    pub title: String,
    pub description: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashcardDraft {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizDraft {
    pub question: String,
    pub correct_answer: String,
    pub wrong_answers: Vec<String>,
}

/// Validated child questions in submission order; list index becomes `position`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionDrafts {
    Flashcards(Vec<FlashcardDraft>),
    Quiz(Vec<QuizDraft>),
}

impl QuestionDrafts {
    pub fn kind(&self) -> SetKind {
        match self {
            QuestionDrafts::Flashcards(_) => SetKind::Flashcards,
            QuestionDrafts::Quiz(_) => SetKind::Quiz,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            QuestionDrafts::Flashcards(v) => v.len(),
            QuestionDrafts::Quiz(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
pub trait StudySetStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Insert the set row, then its questions. Returns the generated set id.
    async fn save_set(&self, scope: Scope<'_>, set: &NewStudySet, questions: &QuestionDrafts) -> Result<Uuid>;

    /// First (oldest) set owned by the caller with this exact title.
    async fn find_set(&self, scope: Scope<'_>, title: &str) -> Result<Option<StudySetRow>>;

    /// All sets owned by the caller, newest first.
    async fn list_sets(&self, scope: Scope<'_>) -> Result<Vec<StudySetRow>>;

    async fn has_flashcards(&self, scope: Scope<'_>, set_id: Uuid) -> Result<bool>;

    /// Ordered by position ascending.
    async fn flashcards(&self, scope: Scope<'_>, set_id: Uuid) -> Result<Vec<FlashcardRow>>;

    /// Ordered by position ascending.
    async fn quiz_questions(&self, scope: Scope<'_>, set_id: Uuid) -> Result<Vec<QuizQuestionRow>>;

    /// Delete every set owned by the caller with this title. Returns the number of set rows removed.
    async fn delete_sets(&self, scope: Scope<'_>, title: &str) -> Result<u64>;
}

fn null_as_empty<'de, D>(d: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}
