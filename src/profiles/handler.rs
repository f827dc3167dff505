use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    follows,
    identity::CurrentUser,
    media::MediaStore,
    profiles::{ProfileResponse, UpdateProfile},
    response::ApiResponse,
    store::{DocumentStore, Patch},
};

const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

/// Get the current user's profile (created lazily on first touch)
/// GET /api/profiles/me
pub async fn get_me(
    State(store): State<Arc<dyn DocumentStore>>,
    CurrentUser(me): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let profile = super::ensure(store.as_ref(), me).await?;
    Ok(ApiResponse::success(ProfileResponse::from_profile(
        profile, true, false,
    )))
}

/// Update display fields and privacy settings
/// PUT /api/profiles/me
pub async fn update_me(
    State(store): State<Arc<dyn DocumentStore>>,
    CurrentUser(me): CurrentUser,
    Json(payload): Json<UpdateProfile>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    let profile = super::ensure(store.as_ref(), me).await?;

    let mut patch = Patch::new().set("updated_at", Utc::now().timestamp_millis());
    if let Some(username) = &payload.username {
        patch = patch.set("username", username);
    }
    if let Some(display_name) = &payload.display_name {
        patch = patch.set("display_name", display_name);
    }
    if let Some(bio) = &payload.bio {
        patch = patch.set("bio", bio);
    }
    if let Some(privacy) = &payload.privacy {
        patch = patch.set("privacy", privacy);
    }

    store.update(super::COLLECTION, profile.id, patch).await?;

    let updated = super::ensure(store.as_ref(), me).await?;
    Ok(ApiResponse::success(ProfileResponse::from_profile(
        updated, true, false,
    )))
}

/// Get another user's profile, subject to their privacy settings
/// GET /api/profiles/:id
pub async fn get_profile(
    State(store): State<Arc<dyn DocumentStore>>,
    viewer: Option<CurrentUser>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let profile = super::find_by_user(store.as_ref(), user_id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let viewer_id = viewer.map(|c| c.0);

    // A profile the viewer may not see is indistinguishable from a missing one.
    let visible = super::can_view(store.as_ref(), viewer_id, user_id, profile.privacy.profile).await?;
    if !visible {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let include_stats =
        super::can_view(store.as_ref(), viewer_id, user_id, profile.privacy.stats).await?;
    let is_following = match viewer_id {
        Some(viewer_id) if viewer_id != user_id => {
            follows::is_accepted(store.as_ref(), viewer_id, user_id).await?
        }
        _ => false,
    };

    Ok(ApiResponse::success(ProfileResponse::from_profile(
        profile,
        include_stats,
        is_following,
    )))
}

/// Upload a profile image; the raw request body is the image bytes
/// POST /api/profiles/me/avatar
pub async fn upload_avatar(
    State(store): State<Arc<dyn DocumentStore>>,
    State(media): State<Arc<dyn MediaStore>>,
    CurrentUser(me): CurrentUser,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    if body.is_empty() {
        return Err(AppError::BadRequest("Empty upload".to_string()));
    }
    if body.len() > MAX_AVATAR_BYTES {
        return Err(AppError::UnprocessableEntity(
            "Image must be smaller than 5MB".to_string(),
        ));
    }

    let profile = super::ensure(store.as_ref(), me).await?;

    let path = format!("avatars/{}", me.simple());
    let url = media.put(&path, &body).await.map_err(|e| {
        tracing::error!("avatar upload failed: {:?}", e);
        AppError::InternalServerError
    })?;

    store
        .update(
            super::COLLECTION,
            profile.id,
            Patch::new()
                .set("avatar_url", &url)
                .set("updated_at", Utc::now().timestamp_millis()),
        )
        .await?;

    Ok(ApiResponse::success(json!({ "avatar_url": url })))
}
