//! # Auth Handlers
//!
//! Registration, login and password reset endpoints, plus the
//! `CurrentUser` extractor used by every protected route.

use crate::handlers::{auth_error_to_response, ApiError, ErrorResponse};
use crate::state::AppState;
use axum::{
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};
use pay_auth::{LoginOutput, RegisterInput};
use pay_core::User;
use serde::Deserialize;
use tracing::{info, instrument};

/// Authenticated user resolved from the `Authorization: Bearer` header.
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| {
                v.strip_prefix("Bearer ")
                    .or_else(|| v.strip_prefix("bearer "))
            })
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorResponse::new("Not authenticated", 401)),
                )
            })?;

        let user = state
            .auth
            .authenticate(token)
            .await
            .map_err(auth_error_to_response)?;

        Ok(CurrentUser(user))
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetConfirm {
    pub token: String,
    pub new_password: String,
}

/// Create an account
#[instrument(skip(state, request))]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .auth
        .register(RegisterInput {
            name: request.name,
            last_name: request.last_name,
            email: request.email,
            password: request.password,
        })
        .await
        .map_err(auth_error_to_response)?;

    info!(user_id = user.id, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Exchange credentials for an access token
#[instrument(skip(state, request))]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginOutput>, ApiError> {
    let output = state
        .auth
        .login(&request.email, &request.password)
        .await
        .map_err(auth_error_to_response)?;

    Ok(Json(output))
}

/// Mail a reset link; the answer is the same whether or not the email exists
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state
        .auth
        .request_password_reset(&request.email)
        .await
        .map_err(auth_error_to_response)?;

    Ok(Json(serde_json::json!({ "message": message })))
}

/// Set a new password with a reset token
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetConfirm>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .auth
        .reset_password(&request.token, &request.new_password)
        .await
        .map_err(auth_error_to_response)?;

    info!(user_id = user.id, "Password reset completed");
    Ok(Json(serde_json::json!({ "message": "Password has been reset successfully" })))
}

/// Check the bearer token and return its user
pub async fn verify_token(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    Json(serde_json::json!({
        "valid": true,
        "user": user
    }))
}

/// Current user profile
pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}
