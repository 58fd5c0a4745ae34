use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;

use crate::{
    error::{AppError, Result},
    models::{
        auth::{AuthRequest, RefreshRequest},
        session::AuthIdentity,
    },
    state::AppState,
};

/// The response payload for logout.
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
}

/// The response payload for the current identity.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityResponse {
    pub id: u64,
    pub profile_id: u64,
}

fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::Validation(e.body_text()))
}

/// Handles user login.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Response> {
    let request = json_body(payload)?;
    let response = state.auth.login(&request, Utc::now()).await?;

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Handles user registration.
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    payload: std::result::Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Response> {
    let request = json_body(payload)?;
    let response = state.auth.register(&request, Utc::now()).await?;

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// Handles token refresh.
#[axum::debug_handler]
pub async fn refresh(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Response> {
    let request = json_body(payload)?;
    let response = state.auth.refresh(&request.refresh_token, Utc::now()).await?;

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Handles user logout.
#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthIdentity>,
) -> Result<Response> {
    tracing::info!("👋 Logout for user: {}", identity.user_id);

    state.auth.logout(identity.user_id).await?;

    let response = AuthResponse {
        success: true,
        message: "Logout successful".to_string(),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Returns the identity bound to the current access token.
pub async fn me(Extension(identity): Extension<AuthIdentity>) -> Json<IdentityResponse> {
    Json(IdentityResponse {
        id: identity.user_id,
        profile_id: identity.profile_id,
    })
}

/// Liveness probe.
pub async fn health() -> StatusCode {
    StatusCode::OK
}
