//! In-process store. Rows live in plain vectors behind one lock; deleting a set
//! removes its children the way the database's `ON DELETE CASCADE` does.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{
    FlashcardRow, NewStudySet, QuestionDrafts, QuizQuestionRow, Scope, StudySetRow, StudySetStore,
};

#[derive(Debug, Default)]
struct Tables {
    sets: Vec<StudySetRow>,
    flashcards: Vec<FlashcardRow>,
    quiz: Vec<QuizQuestionRow>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// (flashcard rows, quiz rows) currently referencing `set_id`.
    pub fn child_counts(&self, set_id: Uuid) -> (usize, usize) {
        let t = self.tables.read();
        (
            t.flashcards.iter().filter(|r| r.study_set_id == set_id).count(),
            t.quiz.iter().filter(|r| r.study_set_id == set_id).count(),
        )
    }

    /// Overwrite the stored type tag, leaving child rows untouched.
    pub fn retag(&self, set_id: Uuid, tag: Option<&str>) -> bool {
        let mut t = self.tables.write();
        match t.sets.iter_mut().find(|s| s.id == set_id) {
            Some(s) => { s.kind_tag = tag.map(|x| x.to_string()); true }
            None => false,
        }
    }

    pub fn set_count(&self) -> usize {
        self.tables.read().sets.len()
    }
}

#[async_trait]
impl StudySetStore for MemoryStore {
    fn backend_name(&self) -> &'static str { "memory" }

    async fn save_set(&self, scope: Scope<'_>, set: &NewStudySet, questions: &QuestionDrafts) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let mut t = self.tables.write();
        t.sets.push(StudySetRow {
            id,
            user_id: scope.user_id.to_string(),
            title: set.title.clone(),
            description: set.description.clone(),
            kind_tag: Some(questions.kind().as_str().to_string()),
            quantity: Some(set.quantity),
            created_at: Utc::now(),
        });
        match questions {
            QuestionDrafts::Flashcards(items) => {
                for (i, q) in items.iter().enumerate() {
                    t.flashcards.push(FlashcardRow {
                        id: Uuid::new_v4(),
                        study_set_id: id,
                        question: q.question.clone(),
                        answer: q.answer.clone(),
                        position: i as i32,
                    });
                }
            }
            QuestionDrafts::Quiz(items) => {
                for (i, q) in items.iter().enumerate() {
                    t.quiz.push(QuizQuestionRow {
                        id: Uuid::new_v4(),
                        study_set_id: id,
                        question: q.question.clone(),
                        correct_answer: q.correct_answer.clone(),
                        wrong_answers: q.wrong_answers.clone(),
                        position: i as i32,
                    });
                }
            }
        }
        Ok(id)
    }

    async fn find_set(&self, scope: Scope<'_>, title: &str) -> Result<Option<StudySetRow>> {
        let t = self.tables.read();
        Ok(t.sets.iter().find(|s| s.user_id == scope.user_id && s.title == title).cloned())
    }

    async fn list_sets(&self, scope: Scope<'_>) -> Result<Vec<StudySetRow>> {
        let t = self.tables.read();
        // Reverse insertion order first so equal timestamps still come out newest first
        let mut out: Vec<StudySetRow> = t.sets.iter().rev().filter(|s| s.user_id == scope.user_id).cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn has_flashcards(&self, _scope: Scope<'_>, set_id: Uuid) -> Result<bool> {
        Ok(self.tables.read().flashcards.iter().any(|r| r.study_set_id == set_id))
    }

    async fn flashcards(&self, _scope: Scope<'_>, set_id: Uuid) -> Result<Vec<FlashcardRow>> {
        let t = self.tables.read();
        let mut out: Vec<FlashcardRow> = t.flashcards.iter().filter(|r| r.study_set_id == set_id).cloned().collect();
        out.sort_by_key(|r| r.position);
        Ok(out)
    }

    async fn quiz_questions(&self, _scope: Scope<'_>, set_id: Uuid) -> Result<Vec<QuizQuestionRow>> {
        let t = self.tables.read();
        let mut out: Vec<QuizQuestionRow> = t.quiz.iter().filter(|r| r.study_set_id == set_id).cloned().collect();
        out.sort_by_key(|r| r.position);
        Ok(out)
    }

    async fn delete_sets(&self, scope: Scope<'_>, title: &str) -> Result<u64> {
        let mut t = self.tables.write();
        let doomed: Vec<Uuid> = t.sets.iter()
            .filter(|s| s.user_id == scope.user_id && s.title == title)
            .map(|s| s.id)
            .collect();
        if doomed.is_empty() { return Ok(0); }
        t.sets.retain(|s| !doomed.contains(&s.id));
        t.flashcards.retain(|r| !doomed.contains(&r.study_set_id));
        t.quiz.retain(|r| !doomed.contains(&r.study_set_id));
        Ok(doomed.len() as u64)
    }
}
