use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    comments::{CommentFilter, CommentResponse, CommentsListResponse, CreateComment},
    error::AppError,
    identity::CurrentUser,
    posts,
    response::ApiResponse,
    store::{DocumentStore, Page},
};

/// Create a new comment on a post
/// POST /api/posts/:id/comments
pub async fn create_comment(
    State(store): State<Arc<dyn DocumentStore>>,
    CurrentUser(me): CurrentUser,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<CreateComment>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    let comment = super::create(store.as_ref(), me, post_id, &payload).await?;
    let response = super::to_response(store.as_ref(), comment).await?;
    Ok(ApiResponse::success(response).created())
}

/// Get top-level comments for a post
/// GET /api/posts/:id/comments
pub async fn get_post_comments(
    State(store): State<Arc<dyn DocumentStore>>,
    viewer: Option<CurrentUser>,
    Path(post_id): Path<Uuid>,
    Query(filter): Query<CommentFilter>,
) -> Result<impl IntoResponse, AppError> {
    let post = posts::fetch_visible(store.as_ref(), viewer.map(|c| c.0), post_id).await?;

    let limit = filter.limit.unwrap_or(20).clamp(1, 100) as usize;
    let offset = filter.offset.unwrap_or(0).max(0) as usize;

    let comments =
        super::list_for_post(store.as_ref(), post_id, Page::new(limit, offset)).await?;

    let mut response: Vec<CommentResponse> = Vec::with_capacity(comments.len());
    for comment in comments {
        response.push(super::to_response(store.as_ref(), comment).await?);
    }

    let has_more = (offset + limit) < post.stats.comments.max(0) as usize;
    Ok(ApiResponse::success(CommentsListResponse {
        comments: response,
        has_more,
    }))
}

/// Get replies to a comment
/// GET /api/comments/:id/replies
pub async fn get_replies(
    State(store): State<Arc<dyn DocumentStore>>,
    Path(comment_id): Path<Uuid>,
    Query(filter): Query<CommentFilter>,
) -> Result<impl IntoResponse, AppError> {
    let comment = super::fetch(store.as_ref(), comment_id).await?;

    let limit = filter.limit.unwrap_or(20).clamp(1, 100) as usize;
    let offset = filter.offset.unwrap_or(0).max(0) as usize;

    let replies = super::replies(store.as_ref(), comment_id, Page::new(limit, offset)).await?;

    let mut response: Vec<CommentResponse> = Vec::with_capacity(replies.len());
    for reply in replies {
        response.push(super::to_response(store.as_ref(), reply).await?);
    }

    let has_more = (offset + limit) < comment.stats.replies.max(0) as usize;
    Ok(ApiResponse::success(CommentsListResponse {
        comments: response,
        has_more,
    }))
}

/// Delete a comment (author only)
/// DELETE /api/comments/:id
pub async fn delete_comment(
    State(store): State<Arc<dyn DocumentStore>>,
    CurrentUser(me): CurrentUser,
    Path(comment_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    super::delete(store.as_ref(), me, comment_id).await?;
    Ok(ApiResponse::ok("Comment deleted".to_string()))
}
