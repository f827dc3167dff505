use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::store::{BatchOp, DocumentStore, Filter, OrderBy, Page, Patch};

pub mod handler;

pub const COLLECTION: &str = "notifications";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    FollowRequest,
    FollowAccepted,
    PostLiked,
    PostCommented,
    PostShared,
    AchievementUnlocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    User,
    Post,
    Achievement,
    Follow,
}

/// What the notification points at, so clients can deep-link.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NotificationTarget {
    pub kind: TargetKind,
    pub id: Uuid,
}

impl NotificationTarget {
    pub fn user(id: Uuid) -> Self {
        Self {
            kind: TargetKind::User,
            id,
        }
    }

    pub fn post(id: Uuid) -> Self {
        Self {
            kind: TargetKind::Post,
            id,
        }
    }

    pub fn achievement(id: Uuid) -> Self {
        Self {
            kind: TargetKind::Achievement,
            id,
        }
    }

    pub fn follow(id: Uuid) -> Self {
        Self {
            kind: TargetKind::Follow,
            id,
        }
    }
}

/// Fire-and-forget event record for a user's inbox.
#[derive(Debug, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub actor_id: Uuid,
    pub kind: NotificationKind,
    pub target: NotificationTarget,
    pub message: String,
    pub is_read: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Query parameters for the notification list
#[derive(Debug, Deserialize)]
pub struct NotificationFilter {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn notify(
    store: &dyn DocumentStore,
    recipient: Uuid,
    actor: Uuid,
    kind: NotificationKind,
    target: NotificationTarget,
    message: &str,
) -> Result<(), AppError> {
    store
        .create(
            COLLECTION,
            json!({
                "user_id": recipient,
                "actor_id": actor,
                "kind": kind,
                "target": target,
                "message": message,
                "is_read": false,
                "created_at": Utc::now().timestamp_millis(),
            }),
        )
        .await?;
    Ok(())
}

pub async fn list(
    store: &dyn DocumentStore,
    user_id: Uuid,
    page: Page,
) -> Result<Vec<Notification>, AppError> {
    let docs = store
        .query(
            COLLECTION,
            &[Filter::eq("user_id", user_id)],
            Some(OrderBy::desc("created_at")),
            page,
        )
        .await?;

    docs.iter().map(|doc| Ok(doc.decode()?)).collect()
}

pub async fn unread_count(store: &dyn DocumentStore, user_id: Uuid) -> Result<usize, AppError> {
    let docs = store
        .query(
            COLLECTION,
            &[Filter::eq("user_id", user_id), Filter::eq("is_read", false)],
            None,
            Page::all(),
        )
        .await?;
    Ok(docs.len())
}

pub async fn mark_read(
    store: &dyn DocumentStore,
    user_id: Uuid,
    notification_id: Uuid,
) -> Result<(), AppError> {
    let notification: Notification = store
        .read(COLLECTION, notification_id)
        .await?
        .ok_or(AppError::NotFound("Notification not found".to_string()))?
        .decode()?;

    if notification.user_id != user_id {
        return Err(AppError::Forbidden);
    }

    store
        .update(COLLECTION, notification_id, Patch::new().set("is_read", true))
        .await?;
    Ok(())
}

pub async fn mark_all_read(store: &dyn DocumentStore, user_id: Uuid) -> Result<usize, AppError> {
    let unread = store
        .query(
            COLLECTION,
            &[Filter::eq("user_id", user_id), Filter::eq("is_read", false)],
            None,
            Page::all(),
        )
        .await?;

    if unread.is_empty() {
        return Ok(0);
    }

    let count = unread.len();
    let ops = unread
        .into_iter()
        .map(|doc| BatchOp::Update {
            collection: COLLECTION.to_string(),
            id: doc.id,
            patch: Patch::new().set("is_read", true),
        })
        .collect();
    store.batch(ops).await?;
    Ok(count)
}
