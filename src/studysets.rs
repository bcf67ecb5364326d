//! Study set service: payload validation, identifier normalization, type detection and
//! the mapping between stored rows and the JSON shapes the client expects.
//!
//! Handlers in `server::sets` are thin wrappers around these functions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::storage::{
    FlashcardDraft, NewStudySet, QuestionDrafts, QuizDraft, Scope, SetKind, StudySetRow, StudySetStore,
};

/// Incoming save body. Everything is optional at the serde level so that a missing
/// title surfaces as a validation error rather than a deserialization failure.
#[derive(Debug, Default, Deserialize)]
pub struct SavePayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub quantity: Option<Value>,
    #[serde(default)]
    pub questions: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SavedSet {
    pub message: String,
    pub id: Uuid,
    /// `title + ".json"`, kept for clients written against the old file-per-set storage.
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum QuestionView {
    Flashcard { question: String, answer: String },
    Quiz { question: String, correct_answer: String, incorrect_answers: Vec<String> },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StudySetView {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: SetKind,
    pub title: String,
    pub description: String,
    pub quantity: i32,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StudySetSummary {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: SetKind,
}

/// Map a client-supplied type tag onto one of the two canonical kinds.
/// Absent or unrecognized tags fall back to flashcards.
pub fn normalize_kind(tag: Option<&str>) -> SetKind {
    match tag.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
        Some("quiz") | Some("quizzes") => SetKind::Quiz,
        _ => SetKind::Flashcards,
    }
}

/// Strip one legacy `.json` suffix. The router has already percent-decoded `identifier`.
pub fn normalize_identifier(identifier: &str) -> String {
    identifier.strip_suffix(".json").unwrap_or(identifier).to_string()
}

pub fn legacy_filename(title: &str) -> String {
    format!("{}.json", title)
}

fn text_field(entry: &Value, key: &str) -> Option<String> {
    match entry.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text_list(entry: &Value, keys: &[&str]) -> Option<Vec<String>> {
    let arr = keys.iter().find_map(|k| entry.get(*k).and_then(|v| v.as_array()))?;
    Some(arr.iter().filter_map(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }).collect())
}

fn invalid_entry(index: usize, need: &str) -> AppError {
    AppError::validation("invalid_question".to_string(), format!("Question {} is missing required field(s): {}", index, need))
}

/// Validate every question entry for the given kind before anything is written.
pub fn parse_questions(kind: SetKind, entries: &[Value]) -> AppResult<QuestionDrafts> {
    match kind {
        SetKind::Flashcards => {
            let mut out = Vec::with_capacity(entries.len());
            for (i, e) in entries.iter().enumerate() {
                let (Some(question), Some(answer)) = (text_field(e, "question"), text_field(e, "answer")) else {
                    return Err(invalid_entry(i, "question, answer"));
                };
                out.push(FlashcardDraft { question, answer });
            }
            Ok(QuestionDrafts::Flashcards(out))
        }
        SetKind::Quiz => {
            let mut out = Vec::with_capacity(entries.len());
            for (i, e) in entries.iter().enumerate() {
                let (Some(question), Some(correct_answer), Some(wrong_answers)) = (
                    text_field(e, "question"),
                    text_field(e, "correct_answer"),
                    // legacy clients send `incorrect_answers`
                    text_list(e, &["wrong_answers", "incorrect_answers"]),
                ) else {
                    return Err(invalid_entry(i, "question, correct_answer, wrong_answers"));
                };
                out.push(QuizDraft { question, correct_answer, wrong_answers });
            }
            Ok(QuestionDrafts::Quiz(out))
        }
    }
}

fn parse_quantity(raw: Option<&Value>, default: usize) -> AppResult<i32> {
    let bad = || AppError::validation("invalid_quantity", "quantity must be a non-negative integer");
    let n: i64 = match raw {
        None | Some(Value::Null) => return i32::try_from(default).map_err(|_| bad()),
        Some(Value::Number(n)) => n.as_i64().ok_or_else(bad)?,
        Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| bad())?,
        Some(_) => return Err(bad()),
    };
    if n < 0 { return Err(bad()); }
    i32::try_from(n).map_err(|_| bad())
}

/// Validate a save payload into the set row and its question drafts.
pub fn prepare_save(payload: &SavePayload) -> AppResult<(NewStudySet, QuestionDrafts)> {
    let title = payload.title.as_deref().map(str::trim).unwrap_or("");
    if title.is_empty() {
        return Err(AppError::validation("missing_title", "Invalid JSON data or missing title"));
    }
    let kind = normalize_kind(payload.kind.as_deref());
    let entries: &[Value] = payload.questions.as_deref().unwrap_or(&[]);
    let questions = parse_questions(kind, entries)?;
    let quantity = parse_quantity(payload.quantity.as_ref(), questions.len())?;
    let set = NewStudySet {
        title: title.to_string(),
        description: payload.description.clone().unwrap_or_default(),
        quantity,
    };
    Ok((set, questions))
}

pub async fn save(store: &dyn StudySetStore, scope: Scope<'_>, payload: &SavePayload) -> AppResult<SavedSet> {
    let (set, questions) = prepare_save(payload)?;
    let id = store.save_set(scope, &set, &questions).await.map_err(AppError::from_store)?;
    info!(target: "studysets", user = scope.user_id, set_id = %id, kind = questions.kind().as_str(), questions = questions.len(), "study set saved");
    Ok(SavedSet {
        message: "Study set saved successfully".to_string(),
        id,
        filename: legacy_filename(&set.title),
    })
}

/// Actual content type, decided by which child table has rows.
///
/// The stored `type` tag has drifted from the real content in existing data, so it is
/// not consulted. Flashcard rows present means flashcards; anything else reads as quiz.
pub async fn detect_kind(store: &dyn StudySetStore, scope: Scope<'_>, set_id: Uuid) -> AppResult<SetKind> {
    let has_cards = store.has_flashcards(scope, set_id).await.map_err(AppError::from_store)?;
    Ok(if has_cards { SetKind::Flashcards } else { SetKind::Quiz })
}

fn log_tag_drift(row: &StudySetRow, actual: SetKind) {
    if normalize_kind(row.kind_tag.as_deref()) != actual {
        debug!(target: "studysets", set_id = %row.id, stored = ?row.kind_tag, actual = actual.as_str(), "stored type tag disagrees with content");
    }
}

fn not_found() -> AppError {
    AppError::not_found("not_found", "Study set not found")
}

fn identifier_title(identifier: &str) -> AppResult<String> {
    let title = normalize_identifier(identifier);
    if title.is_empty() {
        return Err(AppError::validation("missing_identifier", "Missing study set identifier"));
    }
    Ok(title)
}

pub async fn open(store: &dyn StudySetStore, scope: Scope<'_>, identifier: &str) -> AppResult<StudySetView> {
    let title = identifier_title(identifier)?;
    let row = store.find_set(scope, &title).await.map_err(AppError::from_store)?.ok_or_else(not_found)?;
    let kind = detect_kind(store, scope, row.id).await?;
    log_tag_drift(&row, kind);

    let questions: Vec<QuestionView> = match kind {
        SetKind::Flashcards => store.flashcards(scope, row.id).await.map_err(AppError::from_store)?
            .into_iter()
            .map(|q| QuestionView::Flashcard { question: q.question, answer: q.answer })
            .collect(),
        SetKind::Quiz => store.quiz_questions(scope, row.id).await.map_err(AppError::from_store)?
            .into_iter()
            .map(|q| QuestionView::Quiz { question: q.question, correct_answer: q.correct_answer, incorrect_answers: q.wrong_answers })
            .collect(),
    };
    let quantity = row.quantity.unwrap_or(questions.len() as i32);
    Ok(StudySetView { id: row.id, kind, title: row.title, description: row.description, quantity, questions })
}

pub async fn list(store: &dyn StudySetStore, scope: Scope<'_>) -> AppResult<Vec<StudySetSummary>> {
    let rows = store.list_sets(scope).await.map_err(AppError::from_store)?;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let kind = detect_kind(store, scope, row.id).await?;
        log_tag_drift(&row, kind);
        out.push(StudySetSummary { title: row.title, description: row.description, kind });
    }
    Ok(out)
}

/// Returns the normalized title that was deleted.
pub async fn delete(store: &dyn StudySetStore, scope: Scope<'_>, identifier: &str) -> AppResult<String> {
    let title = identifier_title(identifier)?;
    let removed = store.delete_sets(scope, &title).await.map_err(AppError::from_store)?;
    if removed == 0 {
        return Err(not_found());
    }
    info!(target: "studysets", user = scope.user_id, title = %title, removed, "study set deleted");
    Ok(title)
}
