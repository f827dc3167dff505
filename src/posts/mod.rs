use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::comments;
use crate::error::AppError;
use crate::follows;
use crate::likes;
use crate::notifications::{self, NotificationKind, NotificationTarget};
use crate::profiles::{self, Profile, Visibility};
use crate::store::{BatchOp, DocumentStore, Filter, OrderBy, Page, Patch};

pub mod handler;

pub const COLLECTION: &str = "posts";
pub const SHARES: &str = "shares";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostType {
    Workout,
    Achievement,
    Progress,
    Journal,
}

/// Cached interaction counters, zeroed at creation and maintained by
/// deltas from the comment/like/share flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostStats {
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub kind: PostType,
    pub content: String,
    pub image_url: Option<String>,
    /// Structured payload for workout/progress posts (sets, measurements, ...).
    pub payload: Option<Value>,
    pub visibility: Visibility,
    pub stats: PostStats,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Share {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub message: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Request payload for creating a post
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePost {
    pub kind: PostType,
    #[validate(length(
        min = 1,
        max = 5000,
        message = "Post must be between 1 and 5000 characters"
    ))]
    pub content: String,
    pub image_url: Option<String>,
    pub payload: Option<Value>,
    pub visibility: Option<Visibility>,
}

/// Request payload for sharing a post
#[derive(Debug, Deserialize, Validate)]
pub struct SharePost {
    #[validate(length(max = 500, message = "Share message too long"))]
    pub message: Option<String>,
}

/// Query parameters for post listings
#[derive(Debug, Deserialize)]
pub struct PostFilter {
    pub author: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Author info embedded in post responses
#[derive(Debug, Serialize)]
pub struct PostAuthor {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl PostAuthor {
    fn from_profile(user_id: Uuid, profile: Option<Profile>) -> Self {
        match profile {
            Some(profile) => PostAuthor {
                id: profile.user_id,
                username: profile.username,
                display_name: profile.display_name,
                avatar_url: profile.avatar_url,
            },
            None => PostAuthor {
                id: user_id,
                username: "unknown".to_string(),
                display_name: None,
                avatar_url: None,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub author: PostAuthor,
    pub kind: PostType,
    pub content: String,
    pub image_url: Option<String>,
    pub payload: Option<Value>,
    pub visibility: Visibility,
    pub stats: PostStats,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

pub async fn create(
    store: &dyn DocumentStore,
    me: Uuid,
    payload: &CreatePost,
) -> Result<Post, AppError> {
    let doc = store
        .create(
            COLLECTION,
            json!({
                "author_id": me,
                "kind": payload.kind,
                "content": payload.content,
                "image_url": payload.image_url,
                "payload": payload.payload,
                "visibility": payload.visibility.unwrap_or(Visibility::Public),
                "stats": { "likes": 0, "comments": 0, "shares": 0 },
                "created_at": Utc::now().timestamp_millis(),
            }),
        )
        .await?;

    Ok(doc.decode()?)
}

pub async fn fetch(store: &dyn DocumentStore, post_id: Uuid) -> Result<Post, AppError> {
    store
        .read(COLLECTION, post_id)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?
        .decode()
        .map_err(Into::into)
}

/// Fetches a post and enforces its visibility against the viewer.
pub async fn fetch_visible(
    store: &dyn DocumentStore,
    viewer: Option<Uuid>,
    post_id: Uuid,
) -> Result<Post, AppError> {
    let post = fetch(store, post_id).await?;
    if !profiles::can_view(store, viewer, post.author_id, post.visibility).await? {
        return Err(AppError::Forbidden);
    }
    Ok(post)
}

/// Posts by one author, newest first, filtered to what the viewer may see.
pub async fn list_by_author(
    store: &dyn DocumentStore,
    viewer: Option<Uuid>,
    author_id: Uuid,
    page: Page,
) -> Result<Vec<Post>, AppError> {
    let is_owner = viewer == Some(author_id);
    let is_friend = match viewer {
        Some(viewer) if !is_owner => follows::is_accepted(store, viewer, author_id).await?,
        _ => false,
    };

    let docs = store
        .query(
            COLLECTION,
            &[Filter::eq("author_id", author_id)],
            Some(OrderBy::desc("created_at")),
            page,
        )
        .await?;

    let mut posts = Vec::with_capacity(docs.len());
    for doc in docs {
        let post: Post = doc.decode()?;
        let visible = is_owner
            || match post.visibility {
                Visibility::Public => true,
                Visibility::Friends => is_friend,
                Visibility::Private => false,
            };
        if visible {
            posts.push(post);
        }
    }
    Ok(posts)
}

/// Deletes a post and cascades to its comments, likes and shares. The post
/// delete and the three sub-collection batches are independent calls; each
/// batch is atomic on its own, but a failure in between leaves orphans.
pub async fn delete(store: &dyn DocumentStore, me: Uuid, post_id: Uuid) -> Result<(), AppError> {
    let post = fetch(store, post_id).await?;
    if post.author_id != me {
        return Err(AppError::Unauthorized);
    }

    store.delete(COLLECTION, post_id).await?;

    let comment_docs = store
        .query(
            comments::COLLECTION,
            &[Filter::eq("post_id", post_id)],
            None,
            Page::all(),
        )
        .await?;
    let comment_ids: Vec<Uuid> = comment_docs.iter().map(|doc| doc.id).collect();
    if !comment_ids.is_empty() {
        store
            .batch(
                comment_ids
                    .iter()
                    .map(|&id| BatchOp::Delete {
                        collection: comments::COLLECTION.to_string(),
                        id,
                    })
                    .collect(),
            )
            .await?;
    }

    let mut like_ids: Vec<Uuid> = store
        .query(
            likes::COLLECTION,
            &[
                Filter::eq("target_kind", likes::TargetKind::Post),
                Filter::eq("target_id", post_id),
            ],
            None,
            Page::all(),
        )
        .await?
        .iter()
        .map(|doc| doc.id)
        .collect();
    if !comment_ids.is_empty() {
        like_ids.extend(
            store
                .query(
                    likes::COLLECTION,
                    &[
                        Filter::eq("target_kind", likes::TargetKind::Comment),
                        Filter::is_in("target_id", &comment_ids),
                    ],
                    None,
                    Page::all(),
                )
                .await?
                .iter()
                .map(|doc| doc.id),
        );
    }
    if !like_ids.is_empty() {
        store
            .batch(
                like_ids
                    .into_iter()
                    .map(|id| BatchOp::Delete {
                        collection: likes::COLLECTION.to_string(),
                        id,
                    })
                    .collect(),
            )
            .await?;
    }

    let share_ids: Vec<Uuid> = store
        .query(SHARES, &[Filter::eq("post_id", post_id)], None, Page::all())
        .await?
        .iter()
        .map(|doc| doc.id)
        .collect();
    if !share_ids.is_empty() {
        store
            .batch(
                share_ids
                    .into_iter()
                    .map(|id| BatchOp::Delete {
                        collection: SHARES.to_string(),
                        id,
                    })
                    .collect(),
            )
            .await?;
    }

    Ok(())
}

/// Records a share, bumps the post's share counter and notifies the author.
pub async fn share(
    store: &dyn DocumentStore,
    me: Uuid,
    post_id: Uuid,
    message: Option<String>,
) -> Result<Share, AppError> {
    let post = fetch_visible(store, Some(me), post_id).await?;

    let doc = store
        .create(
            SHARES,
            json!({
                "post_id": post_id,
                "user_id": me,
                "message": message,
                "created_at": Utc::now().timestamp_millis(),
            }),
        )
        .await?;

    store
        .update(COLLECTION, post_id, Patch::new().increment("stats.shares", 1))
        .await?;

    if me != post.author_id {
        notifications::notify(
            store,
            post.author_id,
            me,
            NotificationKind::PostShared,
            NotificationTarget::post(post_id),
            "shared your post",
        )
        .await?;
    }

    Ok(doc.decode()?)
}

pub async fn to_response(store: &dyn DocumentStore, post: Post) -> Result<PostResponse, AppError> {
    let profile = profiles::find_by_user(store, post.author_id).await?;
    Ok(PostResponse {
        id: post.id,
        author: PostAuthor::from_profile(post.author_id, profile),
        kind: post.kind,
        content: post.content,
        image_url: post.image_url,
        payload: post.payload,
        visibility: post.visibility,
        stats: post.stats,
        created_at: post.created_at,
    })
}
