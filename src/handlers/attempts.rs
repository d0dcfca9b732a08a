// src/handlers/attempts.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptHandle, SaveAnswerRequest},
        leaderboard::LeaderboardParams,
    },
    services::{attempt::AttemptEngine, leaderboard},
    store::DynStore,
    utils::jwt::Claims,
};

/// Starts (or resumes) the caller's attempt on a test.
///
/// 201 when a new attempt was created, 200 when an in-progress one is resumed.
pub async fn start_attempt(
    State(engine): State<AttemptEngine>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let started = engine.start_attempt(user_id, test_id, Utc::now()).await?;

    let status = if started.resumed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(AttemptHandle::from(&started.attempt))))
}

/// Saves or replaces the answer to one question.
pub async fn save_answer(
    State(engine): State<AttemptEngine>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
    Json(payload): Json<SaveAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    engine.attempt_for_user(attempt_id, user_id).await?;

    let saved = engine
        .save_answer(attempt_id, payload.question_id, payload.selected_option_id)
        .await?;
    Ok(Json(saved))
}

/// Submits the caller's attempt and returns the score summary.
pub async fn submit_attempt(
    State(engine): State<AttemptEngine>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    engine.attempt_for_user(attempt_id, user_id).await?;

    let summary = engine.submit_attempt(attempt_id, Utc::now()).await?;
    Ok(Json(summary))
}

/// Ranked submitted attempts of a test.
pub async fn get_leaderboard(
    State(store): State<DynStore>,
    Path(test_id): Path<i64>,
    Query(params): Query<LeaderboardParams>,
) -> Result<impl IntoResponse, AppError> {
    let entries = leaderboard::leaderboard(store.as_ref(), test_id, params.limit).await?;
    Ok(Json(entries))
}
