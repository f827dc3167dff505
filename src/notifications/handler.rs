use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::AppError, identity::CurrentUser, notifications::NotificationFilter,
    response::ApiResponse, store::DocumentStore, store::Page,
};

/// List the current user's notifications, newest first
/// GET /api/notifications
pub async fn get_notifications(
    State(store): State<Arc<dyn DocumentStore>>,
    CurrentUser(me): CurrentUser,
    Query(filter): Query<NotificationFilter>,
) -> Result<impl IntoResponse, AppError> {
    let limit = filter.limit.unwrap_or(20).clamp(1, 100) as usize;
    let offset = filter.offset.unwrap_or(0).max(0) as usize;

    let notifications = super::list(store.as_ref(), me, Page::new(limit, offset)).await?;
    Ok(ApiResponse::success(notifications))
}

/// GET /api/notifications/unread-count
pub async fn get_unread_count(
    State(store): State<Arc<dyn DocumentStore>>,
    CurrentUser(me): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let count = super::unread_count(store.as_ref(), me).await?;
    Ok(ApiResponse::success(json!({ "count": count })))
}

/// POST /api/notifications/:id/read
pub async fn mark_read(
    State(store): State<Arc<dyn DocumentStore>>,
    CurrentUser(me): CurrentUser,
    Path(notification_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    super::mark_read(store.as_ref(), me, notification_id).await?;
    Ok(ApiResponse::ok("Notification marked as read".to_string()))
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(
    State(store): State<Arc<dyn DocumentStore>>,
    CurrentUser(me): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let count = super::mark_all_read(store.as_ref(), me).await?;
    Ok(ApiResponse::ok(format!(
        "{} notifications marked as read",
        count
    )))
}
