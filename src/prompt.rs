//! Generation options: difficulty, Bloom's taxonomy level and related knobs that are
//! rendered into explicit constraints appended to the user's generation prompt.

use serde::{Deserialize, Serialize};

use crate::completion::ChatMessage;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BloomLevel {
    Remember,
    Understand,
    Apply,
    Analyze,
    Evaluate,
    Create,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LearningMode {
    FactRecall,
    Conceptual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReasoningDepth {
    SingleStep,
    MultiStep,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationOptions {
    pub bloom_level: BloomLevel,
    pub learning_mode: LearningMode,
    pub exam_prep_mode: bool,
    pub reasoning_depth: ReasoningDepth,
    /// 1 (very easy) ..= 5 (very hard)
    pub difficulty_level: u8,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            bloom_level: BloomLevel::Understand,
            learning_mode: LearningMode::Conceptual,
            exam_prep_mode: false,
            reasoning_depth: ReasoningDepth::SingleStep,
            difficulty_level: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BloomLevelInfo {
    pub value: BloomLevel,
    pub label: &'static str,
    pub description: &'static str,
}

pub const BLOOM_LEVELS: [BloomLevelInfo; 6] = [
    BloomLevelInfo { value: BloomLevel::Remember, label: "Remember", description: "Recall facts and basic concepts" },
    BloomLevelInfo { value: BloomLevel::Understand, label: "Understand", description: "Explain ideas or concepts" },
    BloomLevelInfo { value: BloomLevel::Apply, label: "Apply", description: "Use information in new situations" },
    BloomLevelInfo { value: BloomLevel::Analyze, label: "Analyze", description: "Draw connections among ideas" },
    BloomLevelInfo { value: BloomLevel::Evaluate, label: "Evaluate", description: "Justify decisions or courses of action" },
    BloomLevelInfo { value: BloomLevel::Create, label: "Create", description: "Produce new or original work" },
];

fn difficulty_text(level: u8) -> &'static str {
    match level {
        1 => "VERY EASY - Basic recall and simple concepts. Questions should be straightforward and accessible to beginners. Avoid complexity.",
        2 => "EASY - Fundamental understanding with minimal challenge. Questions should be clear and direct with obvious answers.",
        3 => "MODERATE - Standard difficulty requiring solid understanding. Questions should be balanced between accessibility and challenge.",
        4 => "HARD - Advanced material requiring deeper analysis. Questions should challenge students and require careful thought.",
        _ => "VERY HARD - Expert-level complexity with intricate concepts. Questions should be highly challenging and require mastery of the subject.",
    }
}

fn bloom_text(level: BloomLevel) -> &'static str {
    match level {
        BloomLevel::Remember => "Focus on RECALL and RECOGNITION of facts, terms, basic concepts. Questions should test memorization (e.g., \"What is...\", \"Define...\", \"List...\").",
        BloomLevel::Understand => "Focus on COMPREHENSION and EXPLANATION. Questions should test understanding of meaning (e.g., \"Explain why...\", \"Describe how...\", \"Summarize...\").",
        BloomLevel::Apply => "Focus on APPLICATION of knowledge to new situations. Questions should require using concepts to solve problems (e.g., \"Calculate...\", \"Demonstrate...\", \"Apply the formula...\").",
        BloomLevel::Analyze => "Focus on ANALYSIS and breaking down information. Questions should require identifying relationships, patterns, causes (e.g., \"Compare...\", \"Analyze the relationship...\", \"What is the effect of...\").",
        BloomLevel::Evaluate => "Focus on EVALUATION and critical judgment. Questions should require making justified decisions (e.g., \"Critique...\", \"Which approach is best and why...\", \"Evaluate the effectiveness...\").",
        BloomLevel::Create => "Focus on CREATION and synthesis of new ideas. Questions should require designing, constructing, planning (e.g., \"Design a solution...\", \"Propose a new...\", \"Create a plan...\").",
    }
}

impl GenerationOptions {
    /// Parse the `options` query parameter (camelCase JSON; missing fields take defaults).
    pub fn from_query(raw: &str) -> AppResult<Self> {
        let opts: GenerationOptions = serde_json::from_str(raw)
            .map_err(|e| AppError::validation("invalid_options".to_string(), format!("Invalid generation options: {}", e)))?;
        if !(1..=5).contains(&opts.difficulty_level) {
            return Err(AppError::validation("invalid_options", "difficultyLevel must be between 1 and 5"));
        }
        Ok(opts)
    }

    pub fn constraints(&self) -> Vec<String> {
        let mut c = vec![
            format!("DIFFICULTY LEVEL ({}/5): {}", self.difficulty_level, difficulty_text(self.difficulty_level)),
            format!("BLOOM'S TAXONOMY LEVEL: {}", bloom_text(self.bloom_level)),
        ];
        c.push(match self.learning_mode {
            LearningMode::FactRecall => "LEARNING MODE: Fact Recall - Questions should test direct recall of specific information, dates, names, definitions, formulas. Keep answers precise and factual.".to_string(),
            LearningMode::Conceptual => "LEARNING MODE: Conceptual Understanding - Questions should test deeper understanding of WHY and HOW concepts work, their relationships, and underlying principles. Answers should explain reasoning and connections.".to_string(),
        });
        if self.exam_prep_mode {
            c.push("EXAM PREP MODE: Make questions MORE RIGOROUS and EXAM-STYLE. Use formal question formats, include multi-part questions where appropriate, and create PLAUSIBLE DISTRACTORS that represent common misconceptions. Questions should be challenging and test thorough understanding.".to_string());
        }
        c.push(match self.reasoning_depth {
            ReasoningDepth::SingleStep => "REASONING DEPTH: Single-step reasoning - Each question should require ONE logical step or concept to answer. Keep questions focused and direct.".to_string(),
            ReasoningDepth::MultiStep => "REASONING DEPTH: Multi-step reasoning - Questions should require MULTIPLE logical steps, combining concepts, or chaining inferences. Include problems that need to synthesize information from different areas.".to_string(),
        });
        c
    }
}

pub fn build_prompt_with_options(base: &str, options: &GenerationOptions) -> String {
    let numbered: Vec<String> = options.constraints().iter().enumerate().map(|(i, c)| format!("{}. {}", i + 1, c)).collect();
    format!(
        "{}\n\nIMPORTANT GENERATION CONSTRAINTS:\n{}\n\nThese constraints MUST materially affect the difficulty, style, and cognitive level of ALL generated questions.",
        base,
        numbered.join("\n\n")
    )
}

/// Rewrite the last user message with the constraints appended, or add one if there is none.
pub fn apply_to_messages(messages: &mut Vec<ChatMessage>, options: &GenerationOptions) {
    match messages.iter_mut().rev().find(|m| m.role == "user") {
        Some(m) => m.content = build_prompt_with_options(&m.content, options),
        None => messages.push(ChatMessage::user(build_prompt_with_options("", options).trim_start())),
    }
}
