use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    config::settings::Settings,
    error::AppError,
    feed::{Audience, FeedFilter},
    follows,
    identity::CurrentUser,
    profiles,
    response::ApiResponse,
    store::{DocumentStore, Page},
};

/// The current user's own unified activity
/// GET /api/feed/me
pub async fn my_activity(
    State(store): State<Arc<dyn DocumentStore>>,
    State(settings): State<Settings>,
    CurrentUser(me): CurrentUser,
    Query(filter): Query<FeedFilter>,
) -> Result<impl IntoResponse, AppError> {
    let limit = display_limit(&filter, &settings);
    let feed = super::for_user(store.as_ref(), me, Audience::Owner, limit).await?;
    Ok(ApiResponse::success(feed))
}

/// Another user's activity, subject to their activity privacy
/// GET /api/feed/users/:id
pub async fn user_activity(
    State(store): State<Arc<dyn DocumentStore>>,
    State(settings): State<Settings>,
    viewer: Option<CurrentUser>,
    Path(user_id): Path<Uuid>,
    Query(filter): Query<FeedFilter>,
) -> Result<impl IntoResponse, AppError> {
    let profile = profiles::find_by_user(store.as_ref(), user_id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let viewer_id = viewer.map(|c| c.0);
    let visible =
        profiles::can_view(store.as_ref(), viewer_id, user_id, profile.privacy.activity).await?;
    if !visible {
        return Err(AppError::Forbidden);
    }

    let audience = match viewer_id {
        Some(viewer_id) if viewer_id == user_id => Audience::Owner,
        Some(viewer_id) => {
            if follows::is_accepted(store.as_ref(), viewer_id, user_id).await? {
                Audience::Friends
            } else {
                Audience::Public
            }
        }
        None => Audience::Public,
    };

    let limit = display_limit(&filter, &settings);
    let feed = super::for_user(store.as_ref(), user_id, audience, limit).await?;
    Ok(ApiResponse::success(feed))
}

/// Posts from accepted followees
/// GET /api/feed/following
pub async fn following_feed(
    State(store): State<Arc<dyn DocumentStore>>,
    State(settings): State<Settings>,
    CurrentUser(me): CurrentUser,
    Query(filter): Query<FeedFilter>,
) -> Result<impl IntoResponse, AppError> {
    let limit = display_limit(&filter, &settings);
    let offset = filter.offset.unwrap_or(0).max(0) as usize;

    let feed = super::following_feed(store.as_ref(), me, Page::new(limit, offset)).await?;
    Ok(ApiResponse::success(feed))
}

fn display_limit(filter: &FeedFilter, settings: &Settings) -> usize {
    filter
        .limit
        .map(|limit| limit.clamp(1, 100) as usize)
        .unwrap_or(settings.feed_limit)
}
