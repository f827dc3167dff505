use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    follows::{FollowActionResponse, FollowListFilter, FollowListResponse},
    identity::CurrentUser,
    profiles,
    response::ApiResponse,
    store::{DocumentStore, Page},
};

/// Request to follow a user (edge starts out pending)
/// POST /api/users/:id/follow
pub async fn follow_user(
    State(store): State<Arc<dyn DocumentStore>>,
    CurrentUser(me): CurrentUser,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let follow = super::request(store.as_ref(), me, user_id).await?;

    let followers_count = followers_count(store.as_ref(), user_id).await?;
    Ok(ApiResponse::success(FollowActionResponse {
        following: true,
        status: Some(follow.status),
        followers_count,
    }))
}

/// Unfollow a user (or withdraw a pending request)
/// DELETE /api/users/:id/follow
pub async fn unfollow_user(
    State(store): State<Arc<dyn DocumentStore>>,
    CurrentUser(me): CurrentUser,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    profiles::find_by_user(store.as_ref(), user_id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    super::unfollow(store.as_ref(), me, user_id).await?;

    let followers_count = followers_count(store.as_ref(), user_id).await?;
    Ok(ApiResponse::success(FollowActionResponse {
        following: false,
        status: None,
        followers_count,
    }))
}

/// Accept a pending follow request addressed to the current user
/// POST /api/follows/:id/accept
pub async fn accept_follow(
    State(store): State<Arc<dyn DocumentStore>>,
    CurrentUser(me): CurrentUser,
    Path(follow_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let follow = super::accept(store.as_ref(), me, follow_id).await?;
    Ok(ApiResponse::success(follow))
}

/// List pending follow requests addressed to the current user
/// GET /api/follows/requests
pub async fn get_pending_requests(
    State(store): State<Arc<dyn DocumentStore>>,
    CurrentUser(me): CurrentUser,
    Query(filter): Query<FollowListFilter>,
) -> Result<impl IntoResponse, AppError> {
    let (limit, offset) = page_params(&filter);
    let requests =
        super::pending_requests(store.as_ref(), me, Page::new(limit, offset)).await?;
    Ok(ApiResponse::success(requests))
}

/// Get a user's followers
/// GET /api/users/:id/followers
pub async fn get_followers(
    State(store): State<Arc<dyn DocumentStore>>,
    Path(user_id): Path<Uuid>,
    Query(filter): Query<FollowListFilter>,
) -> Result<impl IntoResponse, AppError> {
    let profile = profiles::find_by_user(store.as_ref(), user_id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    // Denormalized count straight off the profile
    let total = profile.stats.followers;
    let (limit, offset) = page_params(&filter);

    let users = super::followers(store.as_ref(), user_id, Page::new(limit, offset)).await?;
    let has_more = (offset + limit) < total as usize;

    Ok(ApiResponse::success(FollowListResponse {
        users,
        total,
        has_more,
    }))
}

/// Get users that a user is following
/// GET /api/users/:id/following
pub async fn get_following(
    State(store): State<Arc<dyn DocumentStore>>,
    Path(user_id): Path<Uuid>,
    Query(filter): Query<FollowListFilter>,
) -> Result<impl IntoResponse, AppError> {
    let profile = profiles::find_by_user(store.as_ref(), user_id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let total = profile.stats.following;
    let (limit, offset) = page_params(&filter);

    let users = super::following(store.as_ref(), user_id, Page::new(limit, offset)).await?;
    let has_more = (offset + limit) < total as usize;

    Ok(ApiResponse::success(FollowListResponse {
        users,
        total,
        has_more,
    }))
}

fn page_params(filter: &FollowListFilter) -> (usize, usize) {
    let limit = filter.limit.unwrap_or(20).clamp(1, 100) as usize;
    let offset = filter.offset.unwrap_or(0).max(0) as usize;
    (limit, offset)
}

async fn followers_count(store: &dyn DocumentStore, user_id: Uuid) -> Result<i64, AppError> {
    let profile = profiles::find_by_user(store, user_id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;
    Ok(profile.stats.followers)
}
