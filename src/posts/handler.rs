use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    identity::CurrentUser,
    posts::{CreatePost, PostFilter, PostResponse, SharePost},
    profiles,
    response::ApiResponse,
    store::{DocumentStore, Page},
};

/// Create a new post
/// POST /api/posts
pub async fn create_post(
    State(store): State<Arc<dyn DocumentStore>>,
    CurrentUser(me): CurrentUser,
    Json(payload): Json<CreatePost>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    // Make sure the author has a profile to resolve in responses.
    profiles::ensure(store.as_ref(), me).await?;

    let post = super::create(store.as_ref(), me, &payload).await?;
    let response = super::to_response(store.as_ref(), post).await?;
    Ok(ApiResponse::success(response).created())
}

/// Get a single post, subject to its visibility
/// GET /api/posts/:id
pub async fn get_post(
    State(store): State<Arc<dyn DocumentStore>>,
    viewer: Option<CurrentUser>,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let post = super::fetch_visible(store.as_ref(), viewer.map(|c| c.0), post_id).await?;
    let response = super::to_response(store.as_ref(), post).await?;
    Ok(ApiResponse::success(response))
}

/// List posts by an author (defaults to the current user)
/// GET /api/posts?author=:id
pub async fn list_posts(
    State(store): State<Arc<dyn DocumentStore>>,
    viewer: Option<CurrentUser>,
    Query(filter): Query<PostFilter>,
) -> Result<impl IntoResponse, AppError> {
    let viewer_id = viewer.map(|c| c.0);
    let author = filter
        .author
        .or(viewer_id)
        .ok_or(AppError::BadRequest("author is required".to_string()))?;

    let limit = filter.limit.unwrap_or(20).clamp(1, 100) as usize;
    let offset = filter.offset.unwrap_or(0).max(0) as usize;

    let posts =
        super::list_by_author(store.as_ref(), viewer_id, author, Page::new(limit, offset)).await?;

    let mut response: Vec<PostResponse> = Vec::with_capacity(posts.len());
    for post in posts {
        response.push(super::to_response(store.as_ref(), post).await?);
    }
    Ok(ApiResponse::success(response))
}

/// Delete a post and everything hanging off it (author only)
/// DELETE /api/posts/:id
pub async fn delete_post(
    State(store): State<Arc<dyn DocumentStore>>,
    CurrentUser(me): CurrentUser,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    super::delete(store.as_ref(), me, post_id).await?;
    Ok(ApiResponse::ok("Post deleted".to_string()))
}

/// Share a post
/// POST /api/posts/:id/share
pub async fn share_post(
    State(store): State<Arc<dyn DocumentStore>>,
    CurrentUser(me): CurrentUser,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<SharePost>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    let share = super::share(store.as_ref(), me, post_id, payload.message).await?;
    Ok(ApiResponse::success(share).created())
}
