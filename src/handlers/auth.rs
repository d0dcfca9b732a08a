// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{LoginRequest, NewUser, RegisterRequest, Role, UserStatus},
    store::DynStore,
    utils::{
        hash::{hash_password, verify_password},
        html::clean_html,
        jwt::{ensure_active, sign_jwt},
    },
};

/// Registers a new candidate account.
///
/// The account starts as `pending` and cannot log in until an admin approves it.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(store): State<DynStore>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let name = clean_html(payload.name.trim());
    if name.is_empty() {
        return Err(AppError::BadRequest("Name must not be empty".to_string()));
    }

    let hashed_password = hash_password(&payload.password)?;

    let user = store
        .create_user(NewUser {
            name,
            email: payload.email.trim().to_lowercase(),
            password: hashed_password,
            role: Role::User,
            status: UserStatus::Pending,
        })
        .await
        .map_err(|e| {
            tracing::warn!("Failed to register user: {}", e);
            AppError::from(e)
        })?;

    tracing::info!(user_id = user.id, "user registered, awaiting approval");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Registration received, awaiting admin approval",
            "user": user,
        })),
    ))
}

/// Authenticates a user and returns a JWT token.
///
/// Only approved accounts get a token; admins are never gated on status.
pub async fn login(
    State(store): State<DynStore>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user = store
        .find_user_by_email(payload.email.trim())
        .await
        .map_err(|e| {
            tracing::error!("Login lookup failed: {:?}", e);
            AppError::from(e)
        })?
        .ok_or(AppError::AuthError("Invalid credentials".to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(AppError::AuthError("Invalid credentials".to_string()));
    }

    ensure_active(&user)?;

    let token = sign_jwt(&user, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "user": user,
    })))
}
