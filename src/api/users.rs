//! User profile and admin management endpoints

use crate::{
    auth::{AdminUser, AuthUser},
    context::AppContext,
    error::MosaicResult,
    users::UserProfile,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};

/// Build user routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/users/me", get(get_me).delete(delete_me))
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id", delete(delete_user))
}

/// Fetch the authenticated user's profile
async fn get_me(
    State(ctx): State<AppContext>,
    auth: AuthUser,
) -> MosaicResult<Json<UserProfile>> {
    let profile = ctx.users.get_user(&auth.user_id).await?;
    Ok(Json(profile))
}

/// Delete the authenticated user's own account and image pool
async fn delete_me(
    State(ctx): State<AppContext>,
    auth: AuthUser,
) -> MosaicResult<StatusCode> {
    ctx.users.delete_account(&auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List all users (admin only)
async fn list_users(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
) -> MosaicResult<Json<Vec<UserProfile>>> {
    let users = ctx.users.list_users().await?;
    Ok(Json(users))
}

/// Delete a user account and their image pool (admin only)
async fn delete_user(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
    Path(user_id): Path<String>,
) -> MosaicResult<StatusCode> {
    ctx.users.delete_account(&user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
