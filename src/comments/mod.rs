use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::likes;
use crate::notifications::{self, NotificationKind, NotificationTarget};
use crate::posts;
use crate::profiles::{self, Profile};
use crate::store::{BatchOp, DocumentStore, Filter, OrderBy, Page, Patch};

pub mod handler;

pub const COLLECTION: &str = "comments";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentStats {
    pub likes: i64,
    pub replies: i64,
}

/// A comment on a post. `reply_to` points at a top-level comment of the
/// same post; the thread never nests deeper than one level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub reply_to: Option<Uuid>,
    pub content: String,
    pub stats: CommentStats,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Request payload for creating a comment
#[derive(Debug, Deserialize, Validate)]
pub struct CreateComment {
    #[validate(length(
        min = 1,
        max = 2000,
        message = "Comment must be between 1 and 2000 characters"
    ))]
    pub content: String,
    pub reply_to: Option<Uuid>,
}

/// Query parameters for fetching comments
#[derive(Debug, Deserialize)]
pub struct CommentFilter {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Author info embedded in comment responses
#[derive(Debug, Serialize)]
pub struct CommentAuthor {
    pub id: Uuid,
    pub username: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author: CommentAuthor,
    pub reply_to: Option<Uuid>,
    pub content: String,
    pub stats: CommentStats,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Response for paginated comment lists
#[derive(Debug, Serialize)]
pub struct CommentsListResponse {
    pub comments: Vec<CommentResponse>,
    pub has_more: bool,
}

pub async fn fetch(store: &dyn DocumentStore, comment_id: Uuid) -> Result<Comment, AppError> {
    store
        .read(COLLECTION, comment_id)
        .await?
        .ok_or(AppError::NotFound("Comment not found".to_string()))?
        .decode()
        .map_err(Into::into)
}

/// Creates a comment. The comment write, the post counter delta, the
/// parent reply counter delta and the notification are issued one after
/// the other as independent calls; if one fails the later steps never run.
pub async fn create(
    store: &dyn DocumentStore,
    me: Uuid,
    post_id: Uuid,
    payload: &CreateComment,
) -> Result<Comment, AppError> {
    let post = posts::fetch_visible(store, Some(me), post_id).await?;

    if let Some(parent_id) = payload.reply_to {
        let parent: Comment = store
            .read(COLLECTION, parent_id)
            .await?
            .ok_or(AppError::NotFound("Parent comment not found".to_string()))?
            .decode()?;
        if parent.post_id != post_id {
            return Err(AppError::UnprocessableEntity(
                "Parent comment does not belong to this post".to_string(),
            ));
        }
        if parent.reply_to.is_some() {
            return Err(AppError::UnprocessableEntity(
                "Replies can only be nested one level deep".to_string(),
            ));
        }
    }

    let doc = store
        .create(
            COLLECTION,
            json!({
                "post_id": post_id,
                "author_id": me,
                "reply_to": payload.reply_to,
                "content": payload.content,
                "stats": { "likes": 0, "replies": 0 },
                "created_at": Utc::now().timestamp_millis(),
            }),
        )
        .await?;

    store
        .update(
            posts::COLLECTION,
            post_id,
            Patch::new().increment("stats.comments", 1),
        )
        .await?;

    if let Some(parent_id) = payload.reply_to {
        store
            .update(
                COLLECTION,
                parent_id,
                Patch::new().increment("stats.replies", 1),
            )
            .await?;
    }

    if me != post.author_id {
        notifications::notify(
            store,
            post.author_id,
            me,
            NotificationKind::PostCommented,
            NotificationTarget::post(post_id),
            "commented on your post",
        )
        .await?;
    }

    Ok(doc.decode()?)
}

/// Top-level comments of a post, newest first.
pub async fn list_for_post(
    store: &dyn DocumentStore,
    post_id: Uuid,
    page: Page,
) -> Result<Vec<Comment>, AppError> {
    let docs = store
        .query(
            COLLECTION,
            &[
                Filter::eq("post_id", post_id),
                Filter::eq("reply_to", Value::Null),
            ],
            Some(OrderBy::desc("created_at")),
            page,
        )
        .await?;

    docs.iter().map(|doc| Ok(doc.decode()?)).collect()
}

/// Replies to a comment, oldest first.
pub async fn replies(
    store: &dyn DocumentStore,
    comment_id: Uuid,
    page: Page,
) -> Result<Vec<Comment>, AppError> {
    let docs = store
        .query(
            COLLECTION,
            &[Filter::eq("reply_to", comment_id)],
            Some(OrderBy::asc("created_at")),
            page,
        )
        .await?;

    docs.iter().map(|doc| Ok(doc.decode()?)).collect()
}

/// Deletes a comment (author only) and cascades: replies go in one batch,
/// likes of the comment and its replies in another, then the post counter
/// is decremented by one. Reply deletions do not re-adjust the counter.
pub async fn delete(store: &dyn DocumentStore, me: Uuid, comment_id: Uuid) -> Result<(), AppError> {
    let comment = fetch(store, comment_id).await?;
    if comment.author_id != me {
        return Err(AppError::Unauthorized);
    }

    store.delete(COLLECTION, comment_id).await?;

    let reply_docs = store
        .query(
            COLLECTION,
            &[Filter::eq("reply_to", comment_id)],
            None,
            Page::all(),
        )
        .await?;
    let reply_ids: Vec<Uuid> = reply_docs.iter().map(|doc| doc.id).collect();
    if !reply_ids.is_empty() {
        store
            .batch(
                reply_ids
                    .iter()
                    .map(|&id| BatchOp::Delete {
                        collection: COLLECTION.to_string(),
                        id,
                    })
                    .collect(),
            )
            .await?;
    }

    let mut target_ids = vec![comment_id];
    target_ids.extend(&reply_ids);
    let like_ids: Vec<Uuid> = store
        .query(
            likes::COLLECTION,
            &[
                Filter::eq("target_kind", likes::TargetKind::Comment),
                Filter::is_in("target_id", &target_ids),
            ],
            None,
            Page::all(),
        )
        .await?
        .iter()
        .map(|doc| doc.id)
        .collect();
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

    store
        .update(
            posts::COLLECTION,
            comment.post_id,
            Patch::new().increment("stats.comments", -1),
        )
        .await?;

    if let Some(parent_id) = comment.reply_to {
        store
            .update(
                COLLECTION,
                parent_id,
                Patch::new().increment("stats.replies", -1),
            )
            .await?;
    }

    Ok(())
}

pub async fn to_response(
    store: &dyn DocumentStore,
    comment: Comment,
) -> Result<CommentResponse, AppError> {
    let profile = profiles::find_by_user(store, comment.author_id).await?;
    Ok(CommentResponse {
        id: comment.id,
        post_id: comment.post_id,
        author: comment_author(comment.author_id, profile),
        reply_to: comment.reply_to,
        content: comment.content,
        stats: comment.stats,
        created_at: comment.created_at,
    })
}

fn comment_author(user_id: Uuid, profile: Option<Profile>) -> CommentAuthor {
    match profile {
        Some(profile) => CommentAuthor {
            id: profile.user_id,
            username: profile.username,
            avatar_url: profile.avatar_url,
        },
        None => CommentAuthor {
            id: user_id,
            username: "unknown".to_string(),
            avatar_url: None,
        },
    }
}
