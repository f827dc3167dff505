use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::achievements;
use crate::error::AppError;
use crate::notifications::{self, NotificationKind, NotificationTarget};
use crate::profiles;
use crate::store::{DocumentStore, Filter, OrderBy, Page, Patch};

pub mod handler;

pub const COLLECTION: &str = "follows";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowStatus {
    Pending,
    Accepted,
}

/// Directed follow edge. Counters on both profiles are adjusted when the
/// edge is accepted, and again when an accepted edge is removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follow {
    pub id: Uuid,
    pub follower_id: Uuid,
    pub following_id: Uuid,
    pub status: FollowStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub responded_at: Option<DateTime<Utc>>,
}

/// Response for a user in followers/following lists
#[derive(Debug, Serialize)]
pub struct FollowUserResponse {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub followed_at: DateTime<Utc>,
}

/// Query parameters for paginated follow lists
#[derive(Debug, Deserialize)]
pub struct FollowListFilter {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for paginated followers/following lists
#[derive(Debug, Serialize)]
pub struct FollowListResponse {
    pub users: Vec<FollowUserResponse>,
    pub total: i64,
    pub has_more: bool,
}

/// Response for follow/unfollow actions
#[derive(Debug, Serialize)]
pub struct FollowActionResponse {
    pub following: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<FollowStatus>,
    pub followers_count: i64,
}

pub async fn find_edge(
    store: &dyn DocumentStore,
    follower_id: Uuid,
    following_id: Uuid,
) -> Result<Option<Follow>, AppError> {
    let docs = store
        .query(
            COLLECTION,
            &[
                Filter::eq("follower_id", follower_id),
                Filter::eq("following_id", following_id),
            ],
            None,
            Page::first(1),
        )
        .await?;

    match docs.into_iter().next() {
        Some(doc) => Ok(Some(doc.decode()?)),
        None => Ok(None),
    }
}

pub async fn is_accepted(
    store: &dyn DocumentStore,
    follower_id: Uuid,
    following_id: Uuid,
) -> Result<bool, AppError> {
    Ok(find_edge(store, follower_id, following_id)
        .await?
        .is_some_and(|edge| edge.status == FollowStatus::Accepted))
}

/// Creates a pending follow edge and notifies the followee. Requesting an
/// already existing edge returns it unchanged.
pub async fn request(
    store: &dyn DocumentStore,
    me: Uuid,
    target_user: Uuid,
) -> Result<Follow, AppError> {
    if me == target_user {
        return Err(AppError::UnprocessableEntity(
            "You cannot follow yourself".to_string(),
        ));
    }

    profiles::find_by_user(store, target_user)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    if let Some(existing) = find_edge(store, me, target_user).await? {
        return Ok(existing);
    }

    let doc = store
        .create(
            COLLECTION,
            json!({
                "follower_id": me,
                "following_id": target_user,
                "status": FollowStatus::Pending,
                "created_at": Utc::now().timestamp_millis(),
                "responded_at": null,
            }),
        )
        .await?;
    let follow: Follow = doc.decode()?;

    notifications::notify(
        store,
        target_user,
        me,
        NotificationKind::FollowRequest,
        NotificationTarget::follow(follow.id),
        "sent you a follow request",
    )
    .await?;

    Ok(follow)
}

/// Accepts a pending follow request addressed to `me`. The primary write,
/// the two profile counter deltas and the notification are independent
/// sequential calls; a failure in between leaves the earlier steps applied.
pub async fn accept(
    store: &dyn DocumentStore,
    me: Uuid,
    follow_id: Uuid,
) -> Result<Follow, AppError> {
    let follow: Follow = store
        .read(COLLECTION, follow_id)
        .await?
        .ok_or(AppError::NotFound("Follow request not found".to_string()))?
        .decode()?;

    if follow.following_id != me {
        return Err(AppError::Forbidden);
    }
    if follow.status == FollowStatus::Accepted {
        return Ok(follow);
    }

    store
        .update(
            COLLECTION,
            follow_id,
            Patch::new()
                .set("status", FollowStatus::Accepted)
                .set("responded_at", Utc::now().timestamp_millis()),
        )
        .await?;

    profiles::adjust_stat(store, follow.follower_id, "following", 1).await?;
    profiles::adjust_stat(store, follow.following_id, "followers", 1).await?;

    let profile = profiles::ensure(store, follow.following_id).await?;
    achievements::record_metric(store, follow.following_id, "follower_count", profile.stats.followers)
        .await?;

    notifications::notify(
        store,
        follow.follower_id,
        me,
        NotificationKind::FollowAccepted,
        NotificationTarget::user(me),
        "accepted your follow request",
    )
    .await?;

    Ok(Follow {
        status: FollowStatus::Accepted,
        responded_at: Some(Utc::now()),
        ..follow
    })
}

/// Removes the edge; counters are only decremented when the edge had been
/// accepted (a withdrawn pending request never counted).
pub async fn unfollow(store: &dyn DocumentStore, me: Uuid, target_user: Uuid) -> Result<(), AppError> {
    let Some(edge) = find_edge(store, me, target_user).await? else {
        return Ok(());
    };

    store.delete(COLLECTION, edge.id).await?;

    if edge.status == FollowStatus::Accepted {
        profiles::adjust_stat(store, me, "following", -1).await?;
        profiles::adjust_stat(store, target_user, "followers", -1).await?;
    }
    Ok(())
}

/// Accepted followers of `user_id`, newest first, resolved to profile summaries.
pub async fn followers(
    store: &dyn DocumentStore,
    user_id: Uuid,
    page: Page,
) -> Result<Vec<FollowUserResponse>, AppError> {
    let edges = store
        .query(
            COLLECTION,
            &[
                Filter::eq("following_id", user_id),
                Filter::eq("status", FollowStatus::Accepted),
            ],
            Some(OrderBy::desc("created_at")),
            page,
        )
        .await?;

    resolve_users(store, edges, |follow| follow.follower_id).await
}

/// Accepted followees of `user_id`, newest first.
pub async fn following(
    store: &dyn DocumentStore,
    user_id: Uuid,
    page: Page,
) -> Result<Vec<FollowUserResponse>, AppError> {
    let edges = store
        .query(
            COLLECTION,
            &[
                Filter::eq("follower_id", user_id),
                Filter::eq("status", FollowStatus::Accepted),
            ],
            Some(OrderBy::desc("created_at")),
            page,
        )
        .await?;

    resolve_users(store, edges, |follow| follow.following_id).await
}

/// Pending requests addressed to `user_id`.
pub async fn pending_requests(
    store: &dyn DocumentStore,
    user_id: Uuid,
    page: Page,
) -> Result<Vec<Follow>, AppError> {
    let docs = store
        .query(
            COLLECTION,
            &[
                Filter::eq("following_id", user_id),
                Filter::eq("status", FollowStatus::Pending),
            ],
            Some(OrderBy::desc("created_at")),
            page,
        )
        .await?;

    docs.iter().map(|doc| Ok(doc.decode()?)).collect()
}

/// Accepted followee ids of `user_id`, used for the following feed.
pub async fn following_ids(
    store: &dyn DocumentStore,
    user_id: Uuid,
    limit: usize,
) -> Result<Vec<Uuid>, AppError> {
    let edges = store
        .query(
            COLLECTION,
            &[
                Filter::eq("follower_id", user_id),
                Filter::eq("status", FollowStatus::Accepted),
            ],
            Some(OrderBy::desc("created_at")),
            Page::first(limit),
        )
        .await?;

    edges
        .iter()
        .map(|doc| Ok(doc.decode::<Follow>()?.following_id))
        .collect()
}

async fn resolve_users(
    store: &dyn DocumentStore,
    edges: Vec<crate::store::Document>,
    pick: impl Fn(&Follow) -> Uuid,
) -> Result<Vec<FollowUserResponse>, AppError> {
    let mut users = Vec::with_capacity(edges.len());
    for doc in edges {
        let follow: Follow = doc.decode()?;
        // Dangling edges (profile deleted) are skipped rather than failing the page.
        if let Some(profile) = profiles::find_by_user(store, pick(&follow)).await? {
            users.push(FollowUserResponse {
                id: profile.user_id,
                username: profile.username,
                display_name: profile.display_name,
                avatar_url: profile.avatar_url,
                followed_at: follow.created_at,
            });
        }
    }
    Ok(users)
}
