// src/models/attempt.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Two-state lifecycle: `InProgress -> Submitted`, terminal at `Submitted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Submitted => "submitted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(AttemptStatus::InProgress),
            "submitted" => Some(AttemptStatus::Submitted),
            _ => None,
        }
    }
}

/// One graded answer. `correct` and `marks_awarded` are a snapshot taken
/// when the answer was saved, not a live view of the question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: i64,
    pub selected_option_id: Option<String>,
    pub correct: bool,
    pub marks_awarded: f64,
}

impl Answer {
    pub fn is_attempted(&self) -> bool {
        self.selected_option_id
            .as_deref()
            .is_some_and(|id| !id.is_empty())
    }
}

/// Represents the 'attempts' table together with its answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: i64,
    pub user_id: i64,
    pub test_id: i64,

    /// Keyed by `question_id`, kept in first-insertion order.
    pub answers: Vec<Answer>,

    /// Zero until submission, then frozen.
    pub total_marks: f64,

    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Set when the submission arrived after the server-side deadline.
    pub late: bool,

    /// Bumped by every answer write; guards finalisation.
    #[serde(skip)]
    pub revision: i64,
}

impl Attempt {
    pub fn is_in_progress(&self) -> bool {
        self.status == AttemptStatus::InProgress
    }

    /// Last-write-wins upsert keyed by question id. A new question keeps
    /// its place at the end; an existing one is overwritten in place.
    pub fn upsert_answer(&mut self, answer: Answer) {
        match self
            .answers
            .iter_mut()
            .find(|a| a.question_id == answer.question_id)
        {
            Some(existing) => *existing = answer,
            None => self.answers.push(answer),
        }
        self.revision += 1;
    }
}

/// Values written when an attempt moves to `Submitted`.
#[derive(Debug, Clone, Copy)]
pub struct Finalize {
    /// Revision the summary was computed from.
    pub revision: i64,
    pub total_marks: f64,
    pub finished_at: DateTime<Utc>,
    pub late: bool,
}

/// One row of the post-submission review.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItem {
    pub question_id: i64,
    pub question_text: String,
    pub selected_option_id: Option<String>,
    pub correct_option_id: Option<String>,
    pub marks_awarded: f64,
}

/// Aggregate result of a submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    pub attempt_id: i64,
    pub total_marks: f64,
    pub total_possible_marks: f64,
    pub correct_count: usize,
    pub attempted_count: usize,
    pub percentage: f64,
    pub accuracy: f64,
    pub late: bool,
    pub answers: Vec<ReviewItem>,
    /// Answers whose question no longer exists; excluded from every total.
    pub skipped_question_ids: Vec<i64>,
}

/// DTO for saving an answer.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAnswerRequest {
    pub question_id: i64,
    #[serde(default)]
    pub selected_option_id: Option<String>,
}

/// Response of an answer save.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SavedAnswer {
    pub correct: bool,
}

/// Minimal attempt view returned when starting.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptHandle {
    pub id: i64,
    pub test_id: i64,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    /// Answers already saved when an in-progress attempt is resumed.
    pub answers: Vec<SavedSelection>,
}

/// A saved selection without its grading.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSelection {
    pub question_id: i64,
    pub selected_option_id: Option<String>,
}

impl From<&Attempt> for AttemptHandle {
    fn from(a: &Attempt) -> Self {
        Self {
            id: a.id,
            test_id: a.test_id,
            status: a.status,
            started_at: a.started_at,
            answers: a
                .answers
                .iter()
                .map(|ans| SavedSelection {
                    question_id: ans.question_id,
                    selected_option_id: ans.selected_option_id.clone(),
                })
                .collect(),
        }
    }
}

/// Owner columns shown next to an attempt in admin views.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptOwner {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// Attempt with its owner, for result listings.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    #[serde(flatten)]
    pub attempt: Attempt,
    /// `None` when the account no longer exists.
    pub user: Option<AttemptOwner>,
}

/// Admin detail view of one attempt.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptDetail {
    #[serde(flatten)]
    pub record: AttemptRecord,
    /// Per-question breakdown with the current answer key.
    pub review: Vec<ReviewItem>,
}
