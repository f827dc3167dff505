use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::follows;
use crate::store::{DocumentStore, Filter, Page, Patch};

pub mod handler;

pub const COLLECTION: &str = "profiles";

/// Per-feature audience for a profile's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Friends,
    Private,
}

/// Denormalized counters cached on the profile. Maintained by deltas
/// alongside each create/delete, never recomputed, so they can drift
/// when a multi-step mutation fails partway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileStats {
    pub workouts: i64,
    pub streak: i64,
    pub followers: i64,
    pub following: i64,
    pub achievements: i64,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_workout_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PrivacySettings {
    pub profile: Visibility,
    pub activity: Visibility,
    pub stats: Visibility,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub stats: ProfileStats,
    pub privacy: PrivacySettings,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

/// Request payload for updating the current user's profile
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfile {
    #[validate(length(
        min = 2,
        max = 40,
        message = "Username must be between 2 and 40 characters"
    ))]
    pub username: Option<String>,
    #[validate(length(max = 60, message = "Display name too long"))]
    pub display_name: Option<String>,
    #[validate(length(max = 500, message = "Bio too long"))]
    pub bio: Option<String>,
    pub privacy: Option<PrivacySettings>,
}

/// Public view of a profile. `stats` is omitted when the viewer is not
/// allowed to see it.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ProfileStats>,
    pub is_following: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl ProfileResponse {
    pub fn from_profile(profile: Profile, include_stats: bool, is_following: bool) -> Self {
        ProfileResponse {
            id: profile.user_id,
            username: profile.username,
            display_name: profile.display_name,
            bio: profile.bio,
            avatar_url: profile.avatar_url,
            stats: include_stats.then_some(profile.stats),
            is_following,
            created_at: profile.created_at,
        }
    }
}

pub async fn find_by_user(
    store: &dyn DocumentStore,
    user_id: Uuid,
) -> Result<Option<Profile>, AppError> {
    let docs = store
        .query(
            COLLECTION,
            &[Filter::eq("user_id", user_id)],
            None,
            Page::first(1),
        )
        .await?;

    match docs.into_iter().next() {
        Some(doc) => Ok(Some(doc.decode()?)),
        None => Ok(None),
    }
}

/// Fetches the user's profile, creating a default one on first touch.
pub async fn ensure(store: &dyn DocumentStore, user_id: Uuid) -> Result<Profile, AppError> {
    if let Some(profile) = find_by_user(store, user_id).await? {
        return Ok(profile);
    }

    let now = Utc::now().timestamp_millis();
    let username = format!("user_{}", &user_id.simple().to_string()[..8]);
    let doc = store
        .create(
            COLLECTION,
            json!({
                "user_id": user_id,
                "username": username,
                "display_name": null,
                "bio": null,
                "avatar_url": null,
                "stats": {
                    "workouts": 0,
                    "streak": 0,
                    "followers": 0,
                    "following": 0,
                    "achievements": 0,
                    "last_workout_at": null,
                },
                "privacy": { "profile": "public", "activity": "public", "stats": "public" },
                "created_at": now,
                "updated_at": now,
            }),
        )
        .await?;

    Ok(doc.decode()?)
}

/// Applies a delta to one of the profile's cached counters.
pub async fn adjust_stat(
    store: &dyn DocumentStore,
    user_id: Uuid,
    stat: &str,
    by: i64,
) -> Result<(), AppError> {
    let profile = find_by_user(store, user_id)
        .await?
        .ok_or(AppError::NotFound("Profile not found".to_string()))?;

    store
        .update(
            COLLECTION,
            profile.id,
            Patch::new().increment(&format!("stats.{stat}"), by),
        )
        .await?;
    Ok(())
}

/// Whether `viewer` may see content of `owner` gated at `visibility`.
/// "Friends" means the viewer's follow of the owner has been accepted.
pub async fn can_view(
    store: &dyn DocumentStore,
    viewer: Option<Uuid>,
    owner: Uuid,
    visibility: Visibility,
) -> Result<bool, AppError> {
    if viewer == Some(owner) {
        return Ok(true);
    }
    match visibility {
        Visibility::Public => Ok(true),
        Visibility::Private => Ok(false),
        Visibility::Friends => match viewer {
            Some(viewer) => follows::is_accepted(store, viewer, owner).await,
            None => Ok(false),
        },
    }
}
