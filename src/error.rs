// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::fmt;
use thiserror::Error;

use crate::store::StoreError;

/// Typed failures of the exam core (availability gate, attempt engine, ranker).
#[derive(Debug, Error)]
pub enum ExamError {
    #[error("Test not found")]
    TestNotFound,

    #[error("Question not found")]
    QuestionNotFound,

    #[error("Attempt not found")]
    AttemptNotFound,

    #[error("Test is not published")]
    Unpublished,

    #[error("Test has not started yet")]
    NotStarted { starts_at: DateTime<Utc> },

    #[error("Test has ended")]
    Ended { ended_at: DateTime<Utc> },

    #[error("Attempt already submitted")]
    AlreadySubmitted,

    #[error("Test already taken; retakes are disabled")]
    RetakeNotAllowed,

    #[error("Submission deadline has passed")]
    DeadlineExceeded { deadline: DateTime<Utc> },

    #[error("Attempt kept changing during submission, retry")]
    SubmitContention,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ExamError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ExamError::TestNotFound | ExamError::QuestionNotFound | ExamError::AttemptNotFound => {
                "NOT_FOUND"
            }
            ExamError::Unpublished => "UNPUBLISHED",
            ExamError::NotStarted { .. } => "NOT_STARTED",
            ExamError::Ended { .. } => "ENDED",
            ExamError::AlreadySubmitted => "ALREADY_SUBMITTED",
            ExamError::RetakeNotAllowed => "RETAKE_NOT_ALLOWED",
            ExamError::DeadlineExceeded { .. } => "DEADLINE_EXCEEDED",
            ExamError::SubmitContention => "CONFLICT",
            ExamError::Store(_) => "INTERNAL",
        }
    }

    /// The boundary instant relevant to the failure, if any.
    pub fn at(&self) -> Option<DateTime<Utc>> {
        match self {
            ExamError::NotStarted { starts_at } => Some(*starts_at),
            ExamError::Ended { ended_at } => Some(*ended_at),
            ExamError::DeadlineExceeded { deadline } => Some(*deadline),
            _ => None,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ExamError::TestNotFound | ExamError::QuestionNotFound | ExamError::AttemptNotFound => {
                StatusCode::NOT_FOUND
            }
            ExamError::Unpublished | ExamError::NotStarted { .. } | ExamError::Ended { .. } => {
                StatusCode::FORBIDDEN
            }
            ExamError::AlreadySubmitted
            | ExamError::RetakeNotAllowed
            | ExamError::DeadlineExceeded { .. }
            | ExamError::SubmitContention => StatusCode::CONFLICT,
            ExamError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden (e.g., account pending approval)
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., duplicate email)
    Conflict(String),

    // Typed failure from the exam core
    Exam(ExamError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Converts the error into a JSON response with appropriate HTTP status code.
/// Body: `{"error": message, "code": code}` plus `"at"` for availability
/// and deadline failures.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error_message, at) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "Internal Server Error".to_string(),
                    None,
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg, None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg, None),
            AppError::Exam(ExamError::Store(err)) => {
                tracing::error!("Storage failure: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "Internal Server Error".to_string(),
                    None,
                )
            }
            AppError::Exam(err) => (err.status(), err.code(), err.to_string(), err.at()),
        };

        let mut body = json!({
            "error": error_message,
            "code": code,
        });
        if let Some(at) = at {
            body["at"] = json!(at);
        }

        (status, Json(body)).into_response()
    }
}

impl From<ExamError> for AppError {
    fn from(err: ExamError) -> Self {
        AppError::Exam(err)
    }
}

/// Allows using `?` operator on store calls.
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound("Not found".to_string()),
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
