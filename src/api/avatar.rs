//! Profile-image lifecycle and media serving endpoints

use crate::{
    auth::{AdminUser, AuthUser},
    avatar::ImageRef,
    context::AppContext,
    error::{MosaicError, MosaicResult},
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};

/// Build avatar routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/users/me/images", post(upload_image).get(list_images))
        .route("/users/me/images/:id/activate", post(activate_image))
        .route("/users/me/images/:id", delete(delete_image))
        .route("/admin/users/:id/images", get(admin_list_images))
        .route("/media/*key", get(get_media))
}

/// Upload a profile image
///
/// Accepts raw image bytes in the request body. The payload is validated,
/// normalized to JPEG, and inserted into the caller's image pool.
async fn upload_image(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    body: Bytes,
) -> MosaicResult<impl IntoResponse> {
    let image: ImageRef = ctx.avatars.add_image(&auth.user_id, &body).await?;
    Ok((StatusCode::CREATED, Json(image)))
}

/// List the caller's profile images, newest first
async fn list_images(
    State(ctx): State<AppContext>,
    auth: AuthUser,
) -> MosaicResult<Json<Vec<ImageRef>>> {
    let images = ctx.avatars.list_images(&auth.user_id).await?;
    Ok(Json(images))
}

/// Make an image the caller's active avatar
async fn activate_image(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(image_id): Path<String>,
) -> MosaicResult<Json<ImageRef>> {
    let image = ctx.avatars.set_active(&auth.user_id, &image_id).await?;
    Ok(Json(image))
}

/// Delete one of the caller's images
async fn delete_image(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(image_id): Path<String>,
) -> MosaicResult<StatusCode> {
    ctx.avatars.delete_image(&auth.user_id, &image_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List another user's profile images (admin only)
async fn admin_list_images(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
    Path(user_id): Path<String>,
) -> MosaicResult<Json<Vec<ImageRef>>> {
    let images = ctx.avatars.list_images(&user_id).await?;
    Ok(Json(images))
}

/// Serve stored image bytes by content key
///
/// Keys are content-addressed, so responses are immutable and cached
/// aggressively.
async fn get_media(
    State(ctx): State<AppContext>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> MosaicResult<Response> {
    let etag = format!("\"{}\"", key);

    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH) {
        if if_none_match.to_str().ok() == Some(etag.as_str()) {
            return Response::builder()
                .status(StatusCode::NOT_MODIFIED)
                .header(header::ETAG, etag)
                .header(header::CACHE_CONTROL, "public, max-age=31536000, immutable")
                .body(axum::body::Body::empty())
                .map_err(|e| MosaicError::Internal(format!("Failed to build response: {}", e)));
        }
    }

    let data = ctx.avatars.get_bytes(&key).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/jpeg")
        .header(header::CONTENT_LENGTH, data.len().to_string())
        .header(header::ETAG, etag)
        .header(header::CACHE_CONTROL, "public, max-age=31536000, immutable")
        .body(axum::body::Body::from(data))
        .map_err(|e| MosaicError::Internal(format!("Failed to build response: {}", e)))
}
