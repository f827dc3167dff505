use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    error::AppError, identity::CurrentUser, likes::TargetKind, response::ApiResponse,
    store::DocumentStore,
};

/// Toggle a like on a post
/// POST /api/posts/:id/like
pub async fn like_post(
    State(store): State<Arc<dyn DocumentStore>>,
    CurrentUser(me): CurrentUser,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let result = super::toggle(store.as_ref(), me, TargetKind::Post, post_id).await?;
    Ok(ApiResponse::success(result))
}

/// Toggle a like on a comment
/// POST /api/comments/:id/like
pub async fn like_comment(
    State(store): State<Arc<dyn DocumentStore>>,
    CurrentUser(me): CurrentUser,
    Path(comment_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let result = super::toggle(store.as_ref(), me, TargetKind::Comment, comment_id).await?;
    Ok(ApiResponse::success(result))
}
