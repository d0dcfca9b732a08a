// src/handlers/admin.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        attempt::{Attempt, AttemptDetail, AttemptOwner, AttemptRecord},
        question::{
            AnswerOption, BulkQuestionsRequest, NewQuestion, QuestionInput, UpdateQuestionRequest,
            assign_option_ids,
        },
        test::{CreateTestRequest, NewTest, UpdateTestRequest},
        user::{User, UserStatus},
    },
    services::scoring,
    store::{DynStore, StoreError},
    utils::{
        html::{clean_html, clean_optional},
        jwt::Claims,
    },
};

/// Lists accounts waiting for approval.
pub async fn list_pending_users(
    State(store): State<DynStore>,
) -> Result<impl IntoResponse, AppError> {
    let users = store
        .list_users_by_status(UserStatus::Pending)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list pending users: {:?}", e);
            AppError::from(e)
        })?;

    Ok(Json(users))
}

pub async fn approve_user(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    set_status(&store, id, UserStatus::Approved).await
}

pub async fn reject_user(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    set_status(&store, id, UserStatus::Rejected).await
}

async fn set_status(
    store: &DynStore,
    id: i64,
    status: UserStatus,
) -> Result<Json<User>, AppError> {
    let user = store
        .set_user_status(id, status)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = id, status = status.as_str(), "account status changed");
    Ok(Json(user))
}

/// Creates a test. The end time is derived from start time and duration.
pub async fn create_test(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let title = clean_html(payload.title.trim());
    if title.is_empty() {
        return Err(AppError::BadRequest("Title must not be empty".to_string()));
    }

    let test = store
        .create_test(NewTest {
            title,
            description: clean_optional(payload.description),
            duration_minutes: payload.duration,
            published: payload.published,
            start_time: payload.start_time,
            created_by: Some(claims.user_id()?),
        })
        .await
        .map_err(|e| {
            tracing::error!("Failed to create test: {:?}", e);
            AppError::from(e)
        })?;

    tracing::info!(test_id = test.id, "test created");
    Ok((StatusCode::CREATED, Json(test)))
}

/// Updates test metadata. Changing start time or duration recomputes the end time.
pub async fn update_test(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mut test = store
        .get_test(id)
        .await?
        .ok_or(AppError::NotFound("Test not found".to_string()))?;

    if let Some(title) = payload.title {
        let title = clean_html(title.trim());
        if title.is_empty() {
            return Err(AppError::BadRequest("Title must not be empty".to_string()));
        }
        test.title = title;
    }
    if payload.description.is_some() {
        test.description = clean_optional(payload.description);
    }
    if let Some(published) = payload.published {
        test.published = published;
    }
    if payload.start_time.is_some() || payload.duration.is_some() {
        let start_time = payload.start_time.unwrap_or(test.start_time);
        let duration = payload.duration.unwrap_or(test.duration_minutes);
        test.reschedule(start_time, duration);
    }

    store.update_test(&test).await?;

    tracing::info!(test_id = id, "test updated");
    Ok(Json(test))
}

/// Deletes a test and its questions. Attempts are kept for the record.
pub async fn delete_test(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !store.delete_test(id).await? {
        return Err(AppError::NotFound("Test not found".to_string()));
    }

    tracing::info!(test_id = id, "test deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Adds one question to a test.
pub async fn add_question(
    State(store): State<DynStore>,
    Path(test_id): Path<i64>,
    Json(payload): Json<QuestionInput>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let next_order = next_display_order(&store, test_id).await?;
    let inserted = store
        .insert_questions(test_id, vec![sanitize(payload.into_new(next_order))])
        .await
        .map_err(|e| not_found_as("Test not found", e))?;

    let question = inserted
        .into_iter()
        .next()
        .ok_or_else(|| AppError::InternalServerError("insert returned no row".to_string()))?;

    Ok((StatusCode::CREATED, Json(question)))
}

/// Adds many questions in one go. Either all are valid and inserted, or none.
pub async fn bulk_add_questions(
    State(store): State<DynStore>,
    Path(test_id): Path<i64>,
    Json(payload): Json<BulkQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.questions.is_empty() {
        return Err(AppError::BadRequest("questions must not be empty".to_string()));
    }
    for (idx, q) in payload.questions.iter().enumerate() {
        if let Err(validation_errors) = q.validate() {
            return Err(AppError::BadRequest(format!(
                "questions[{}]: {}",
                idx, validation_errors
            )));
        }
    }

    let first_order = next_display_order(&store, test_id).await?;
    let questions = payload
        .questions
        .into_iter()
        .enumerate()
        .map(|(idx, q)| sanitize(q.into_new(first_order + idx as i32)))
        .collect();

    let inserted = store
        .insert_questions(test_id, questions)
        .await
        .map_err(|e| not_found_as("Test not found", e))?;

    tracing::info!(test_id, count = inserted.len(), "questions added");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "inserted": inserted.len(),
            "questions": inserted,
        })),
    ))
}

/// Lists a test's questions including the answer key.
pub async fn list_questions(
    State(store): State<DynStore>,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if store.get_test(test_id).await?.is_none() {
        return Err(AppError::NotFound("Test not found".to_string()));
    }

    let questions = store.questions_for_test(test_id).await?;
    Ok(Json(questions))
}

/// Updates a question.
///
/// Once the test has attempts, an option id may not change its text, since
/// saved answers refer to options by id.
pub async fn update_question(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mut question = store
        .get_question(id)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    if let Some(text) = payload.text {
        question.text = clean_html(&text);
    }
    if let Some(question_type) = payload.question_type {
        question.question_type = question_type;
    }
    if let Some(marks) = payload.marks {
        question.marks = marks;
    }
    if let Some(negative_marks) = payload.negative_marks {
        question.negative_marks = negative_marks;
    }
    if let Some(order) = payload.order {
        question.display_order = order;
    }
    if let Some(options) = payload.options {
        let options = sanitize_options(assign_option_ids(options));
        if store.test_has_attempts(question.test_id).await? {
            if let Some(changed) = unstable_option(&question.options, &options) {
                return Err(AppError::Conflict(format!(
                    "Option '{}' cannot be removed or reworded once the test has attempts",
                    changed
                )));
            }
        }
        question.options = options;
    }

    store.update_question(&question).await.map_err(|e| not_found_as("Question not found", e))?;

    tracing::info!(question_id = id, "question updated");
    Ok(Json(question))
}

pub async fn delete_question(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !store.delete_question(id).await? {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    tracing::info!(question_id = id, "question deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// All attempts of a test, newest first, with their owners.
pub async fn get_results(
    State(store): State<DynStore>,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempts = store.attempts_for_test(test_id).await?;

    let mut owners: HashMap<i64, Option<AttemptOwner>> = HashMap::new();
    let mut records = Vec::with_capacity(attempts.len());
    for attempt in attempts {
        let user = match owners.get(&attempt.user_id) {
            Some(owner) => owner.clone(),
            None => {
                let owner = owner_of(&store, &attempt).await?;
                owners.insert(attempt.user_id, owner.clone());
                owner
            }
        };
        records.push(AttemptRecord { attempt, user });
    }

    Ok(Json(json!({ "attempts": records })))
}

/// One attempt with a per-question breakdown.
pub async fn get_attempt(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = store
        .get_attempt(id)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    let ids: Vec<i64> = attempt.answers.iter().map(|a| a.question_id).collect();
    let questions: HashMap<_, _> = store
        .questions_by_ids(&ids)
        .await?
        .into_iter()
        .map(|q| (q.id, q))
        .collect();
    let review = scoring::summarize(attempt.id, &attempt.answers, &questions, attempt.late).answers;

    let user = owner_of(&store, &attempt).await?;
    Ok(Json(AttemptDetail {
        record: AttemptRecord { attempt, user },
        review,
    }))
}

async fn owner_of(store: &DynStore, attempt: &Attempt) -> Result<Option<AttemptOwner>, AppError> {
    Ok(store.find_user(attempt.user_id).await?.map(|u| AttemptOwner {
        id: u.id,
        name: u.name,
        email: u.email,
    }))
}

async fn next_display_order(store: &DynStore, test_id: i64) -> Result<i32, AppError> {
    let existing = store.questions_for_test(test_id).await?;
    Ok(existing
        .iter()
        .map(|q| q.display_order + 1)
        .max()
        .unwrap_or(0))
}

fn sanitize(mut question: NewQuestion) -> NewQuestion {
    question.text = clean_html(&question.text);
    question.options = sanitize_options(question.options);
    question
}

fn sanitize_options(options: Vec<AnswerOption>) -> Vec<AnswerOption> {
    options
        .into_iter()
        .map(|mut o| {
            o.text = clean_html(&o.text);
            o
        })
        .collect()
}

/// First existing option id that `next` drops or rewords. Saved answers
/// refer to options by id, so an id must keep meaning the same option.
fn unstable_option(current: &[AnswerOption], next: &[AnswerOption]) -> Option<String> {
    current
        .iter()
        .find(|old| {
            next.iter()
                .find(|new| new.id == old.id)
                .is_none_or(|new| new.text != old.text)
        })
        .map(|old| old.id.clone())
}

fn not_found_as(message: &str, err: StoreError) -> AppError {
    match err {
        StoreError::NotFound => AppError::NotFound(message.to_string()),
        other => AppError::from(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(id: &str, text: &str) -> AnswerOption {
        AnswerOption {
            id: id.to_string(),
            text: text.to_string(),
            is_correct: false,
        }
    }

    #[test]
    fn existing_options_must_survive_unchanged() {
        let current = vec![option("A", "Paris"), option("B", "Rome")];
        let extended = vec![option("A", "Paris"), option("B", "Rome"), option("C", "Oslo")];
        let reworded = vec![option("A", "Paris"), option("B", "Madrid")];

        assert_eq!(unstable_option(&current, &extended), None);
        assert_eq!(unstable_option(&current, &reworded).as_deref(), Some("B"));
        assert_eq!(unstable_option(&current, &[option("A", "Paris")]).as_deref(), Some("B"));
    }
}
