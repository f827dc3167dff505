use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::comments;
use crate::error::AppError;
use crate::notifications::{self, NotificationKind, NotificationTarget};
use crate::posts;
use crate::store::{lookup_path, DocumentStore, Filter, Page, Patch};

pub mod handler;

pub const COLLECTION: &str = "likes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Post,
    Comment,
}

/// At most one like per (user, target) pair. The pair is checked by query,
/// not enforced by the store, so two racing toggles from the same user can
/// both observe "absent" and double-create. Known-weak, kept as is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    pub id: Uuid,
    pub user_id: Uuid,
    pub target_kind: TargetKind,
    pub target_id: Uuid,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: chrono::DateTime<Utc>,
}

/// Response for like toggles
#[derive(Debug, Serialize)]
pub struct LikeToggle {
    pub liked: bool,
    pub likes_count: i64,
}

struct Target {
    collection: &'static str,
    owner: Uuid,
}

async fn resolve(
    store: &dyn DocumentStore,
    kind: TargetKind,
    target_id: Uuid,
) -> Result<Target, AppError> {
    match kind {
        TargetKind::Post => {
            let post = posts::fetch(store, target_id).await?;
            Ok(Target {
                collection: posts::COLLECTION,
                owner: post.author_id,
            })
        }
        TargetKind::Comment => {
            let comment = comments::fetch(store, target_id).await?;
            Ok(Target {
                collection: comments::COLLECTION,
                owner: comment.author_id,
            })
        }
    }
}

/// Toggles the (user, target) like. Absent: create the like, bump the
/// target's counter and, for someone else's post, notify the owner.
/// Present: delete it and decrement. Two toggles in sequence restore the
/// original state.
pub async fn toggle(
    store: &dyn DocumentStore,
    me: Uuid,
    kind: TargetKind,
    target_id: Uuid,
) -> Result<LikeToggle, AppError> {
    let target = resolve(store, kind, target_id).await?;

    let existing = store
        .query(
            COLLECTION,
            &[
                Filter::eq("user_id", me),
                Filter::eq("target_kind", kind),
                Filter::eq("target_id", target_id),
            ],
            None,
            Page::first(1),
        )
        .await?;

    let liked = match existing.into_iter().next() {
        Some(doc) => {
            let like: Like = doc.decode()?;
            store.delete(COLLECTION, like.id).await?;
            store
                .update(
                    target.collection,
                    target_id,
                    Patch::new().increment("stats.likes", -1),
                )
                .await?;
            false
        }
        None => {
            store
                .create(
                    COLLECTION,
                    json!({
                        "user_id": me,
                        "target_kind": kind,
                        "target_id": target_id,
                        "created_at": Utc::now().timestamp_millis(),
                    }),
                )
                .await?;
            store
                .update(
                    target.collection,
                    target_id,
                    Patch::new().increment("stats.likes", 1),
                )
                .await?;

            if kind == TargetKind::Post && me != target.owner {
                notifications::notify(
                    store,
                    target.owner,
                    me,
                    NotificationKind::PostLiked,
                    NotificationTarget::post(target_id),
                    "liked your post",
                )
                .await?;
            }
            true
        }
    };

    // Report the denormalized counter as stored, not a local guess.
    let likes_count = store
        .read(target.collection, target_id)
        .await?
        .and_then(|doc| {
            lookup_path(&doc.data, "stats.likes")
                .and_then(Value::as_i64)
        })
        .unwrap_or(0);

    Ok(LikeToggle { liked, likes_count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posts::{CreatePost, PostType};
    use crate::store::memory::MemoryStore;
    use crate::{notifications::Notification, profiles};

    async fn seeded_post(store: &MemoryStore, author: Uuid) -> Uuid {
        profiles::ensure(store, author).await.unwrap();
        posts::create(
            store,
            author,
            &CreatePost {
                kind: PostType::Progress,
                content: "made it to the gym".to_string(),
                image_url: None,
                payload: None,
                visibility: None,
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn double_toggle_restores_original_state() {
        let store = MemoryStore::new();
        let author = Uuid::new_v4();
        let liker = Uuid::new_v4();
        let post_id = seeded_post(&store, author).await;

        let first = toggle(&store, liker, TargetKind::Post, post_id).await.unwrap();
        assert!(first.liked);
        assert_eq!(first.likes_count, 1);

        let second = toggle(&store, liker, TargetKind::Post, post_id).await.unwrap();
        assert!(!second.liked);
        assert_eq!(second.likes_count, 0);

        let remaining = store
            .query(
                COLLECTION,
                &[
                    Filter::eq("user_id", liker),
                    Filter::eq("target_id", post_id),
                ],
                None,
                Page::all(),
            )
            .await
            .unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn liking_someone_elses_post_notifies_once() {
        let store = MemoryStore::new();
        let author = Uuid::new_v4();
        let liker = Uuid::new_v4();
        let post_id = seeded_post(&store, author).await;

        toggle(&store, liker, TargetKind::Post, post_id).await.unwrap();
        toggle(&store, liker, TargetKind::Post, post_id).await.unwrap();

        let inbox = store
            .query(
                notifications::COLLECTION,
                &[Filter::eq("user_id", author)],
                None,
                Page::all(),
            )
            .await
            .unwrap();
        let liked: Vec<Notification> = inbox
            .iter()
            .map(|doc| doc.decode().unwrap())
            .filter(|n: &Notification| matches!(n.kind, NotificationKind::PostLiked))
            .collect();
        // The unlike leg is silent.
        assert_eq!(liked.len(), 1);
    }

    #[tokio::test]
    async fn liking_own_post_is_silent() {
        let store = MemoryStore::new();
        let author = Uuid::new_v4();
        let post_id = seeded_post(&store, author).await;

        let result = toggle(&store, author, TargetKind::Post, post_id).await.unwrap();
        assert!(result.liked);

        let inbox = store
            .query(
                notifications::COLLECTION,
                &[Filter::eq("user_id", author)],
                None,
                Page::all(),
            )
            .await
            .unwrap();
        assert!(inbox.is_empty());
    }
}
