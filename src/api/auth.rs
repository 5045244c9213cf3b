//! Registration, login, account confirmation, and password reset endpoints

use crate::{
    context::AppContext,
    error::MosaicResult,
    users::{LoginRequest, RegisterRequest, TokenResponse, UserProfile},
};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;

/// Build auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/confirm", post(confirm_account))
        .route("/auth/password-reset/request", post(request_password_reset))
        .route("/auth/password-reset/confirm", post(reset_password))
}

/// Register a new account
async fn register(
    State(ctx): State<AppContext>,
    Json(request): Json<RegisterRequest>,
) -> MosaicResult<impl IntoResponse> {
    let profile: UserProfile = ctx.users.register(request, None).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Log in with username or email
async fn login(
    State(ctx): State<AppContext>,
    Json(request): Json<LoginRequest>,
) -> MosaicResult<Json<TokenResponse>> {
    let token = ctx.users.login(request).await?;
    Ok(Json(token))
}

#[derive(Debug, Deserialize)]
struct ConfirmRequest {
    token: String,
}

/// Confirm an account from an emailed token
async fn confirm_account(
    State(ctx): State<AppContext>,
    Json(request): Json<ConfirmRequest>,
) -> MosaicResult<StatusCode> {
    ctx.users.confirm_account(&request.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct PasswordResetRequest {
    email: String,
}

/// Request a password reset email
async fn request_password_reset(
    State(ctx): State<AppContext>,
    Json(request): Json<PasswordResetRequest>,
) -> MosaicResult<StatusCode> {
    ctx.users.request_password_reset(&request.email).await?;
    // Always 204: account existence is never revealed
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct PasswordResetConfirm {
    token: String,
    new_password: String,
    confirm_password: String,
}

/// Complete a password reset
async fn reset_password(
    State(ctx): State<AppContext>,
    Json(request): Json<PasswordResetConfirm>,
) -> MosaicResult<StatusCode> {
    ctx.users
        .reset_password(&request.token, &request.new_password, &request.confirm_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
