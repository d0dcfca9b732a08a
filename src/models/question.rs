// src/models/question.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Question kind. Every kind is graded as single-correct-choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    #[default]
    Mcq,
    TrueFalse,
    Descriptive,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Mcq => "mcq",
            QuestionType::TrueFalse => "truefalse",
            QuestionType::Descriptive => "descriptive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mcq" => Some(QuestionType::Mcq),
            "truefalse" => Some(QuestionType::TrueFalse),
            "descriptive" => Some(QuestionType::Descriptive),
            _ => None,
        }
    }
}

/// One selectable option. `id` is a short token, unique within the question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOption {
    pub id: String,
    pub text: String,
    pub is_correct: bool,
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,
    pub test_id: i64,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub options: Vec<AnswerOption>,
    pub marks: f64,
    pub negative_marks: f64,
    pub display_order: i32,
}

impl Question {
    /// The authoritative correct option: the first one flagged correct.
    pub fn correct_option(&self) -> Option<&AnswerOption> {
        self.options.iter().find(|o| o.is_correct)
    }
}

/// Option as sent to a candidate. Has no correctness field at all.
#[derive(Debug, Clone, Serialize)]
pub struct PublicOption {
    pub id: String,
    pub text: String,
}

/// DTO for sending a question to a candidate (excludes the answer key).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: i64,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub text: String,
    pub options: Vec<PublicOption>,
    pub marks: f64,
    pub negative_marks: f64,
    pub display_order: i32,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            question_type: q.question_type,
            text: q.text,
            options: q
                .options
                .into_iter()
                .map(|o| PublicOption { id: o.id, text: o.text })
                .collect(),
            marks: q.marks,
            negative_marks: q.negative_marks,
            display_order: q.display_order,
        }
    }
}

/// Insert shape for a question row.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub text: String,
    pub question_type: QuestionType,
    pub options: Vec<AnswerOption>,
    pub marks: f64,
    pub negative_marks: f64,
    pub display_order: i32,
}

/// Option as authored. A missing id is assigned from its position.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionInput {
    pub id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// DTO for creating a question.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInput {
    #[validate(length(min = 1, max = 2000))]
    pub text: String,
    #[serde(rename = "type", default)]
    pub question_type: QuestionType,
    #[validate(custom(function = validate_options))]
    pub options: Vec<OptionInput>,
    #[validate(range(exclusive_min = 0.0, max = 1000.0))]
    pub marks: Option<f64>,
    #[validate(range(min = 0.0, max = 1000.0))]
    pub negative_marks: Option<f64>,
    pub order: Option<i32>,
}

impl QuestionInput {
    /// Applies defaults (marks 1, negative marks 0) and assigns option ids.
    /// `fallback_order` is used when no explicit order was given.
    pub fn into_new(self, fallback_order: i32) -> NewQuestion {
        NewQuestion {
            text: self.text,
            question_type: self.question_type,
            options: assign_option_ids(self.options),
            marks: self.marks.unwrap_or(1.0),
            negative_marks: self.negative_marks.unwrap_or(0.0),
            display_order: self.order.unwrap_or(fallback_order),
        }
    }
}

/// DTO for bulk insertion.
#[derive(Debug, Deserialize)]
pub struct BulkQuestionsRequest {
    pub questions: Vec<QuestionInput>,
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub question_type: Option<QuestionType>,
    #[validate(custom(function = validate_options))]
    pub options: Option<Vec<OptionInput>>,
    #[validate(range(exclusive_min = 0.0, max = 1000.0))]
    pub marks: Option<f64>,
    #[validate(range(min = 0.0, max = 1000.0))]
    pub negative_marks: Option<f64>,
    pub order: Option<i32>,
}

/// Fills missing option ids with `A`, `B`, `C`… by position.
pub fn assign_option_ids(options: Vec<OptionInput>) -> Vec<AnswerOption> {
    options
        .into_iter()
        .enumerate()
        .map(|(idx, opt)| AnswerOption {
            id: opt
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| position_label(idx)),
            text: opt.text,
            is_correct: opt.is_correct,
        })
        .collect()
}

fn position_label(idx: usize) -> String {
    if idx < 26 {
        char::from(b'A' + idx as u8).to_string()
    } else {
        format!("O{}", idx + 1)
    }
}

fn validate_options(options: &[OptionInput]) -> Result<(), validator::ValidationError> {
    if options.is_empty() {
        return Err(validator::ValidationError::new("options_cannot_be_empty"));
    }
    if options.len() > 26 {
        return Err(validator::ValidationError::new("too_many_options"));
    }
    for opt in options {
        if opt.text.is_empty() || opt.text.len() > 500 {
            return Err(validator::ValidationError::new("option_text_length"));
        }
        if opt.id.as_ref().is_some_and(|id| id.len() > 16) {
            return Err(validator::ValidationError::new("option_id_too_long"));
        }
    }

    let ids: Vec<String> = assign_option_ids(options.to_vec())
        .into_iter()
        .map(|o| o.id)
        .collect();
    for (i, id) in ids.iter().enumerate() {
        if ids[..i].contains(id) {
            return Err(validator::ValidationError::new("duplicate_option_id"));
        }
    }
    Ok(())
}
