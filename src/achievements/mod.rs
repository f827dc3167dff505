use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::notifications::{self, NotificationKind, NotificationTarget};
use crate::profiles;
use crate::store::{BatchOp, DocumentStore, Filter, OrderBy, Page, Patch, StoreError};

pub mod handler;

pub const COLLECTION: &str = "achievements";
pub const PROGRESS: &str = "user_achievements";

/// Seed catalog: name, description, icon, metric kind, threshold.
const CATALOG: &[(&str, &str, &str, &str, i64)] = &[
    (
        "First Workout",
        "Log your first workout",
        "dumbbell",
        "workout_count",
        1,
    ),
    (
        "Regular",
        "Log ten workouts",
        "dumbbell",
        "workout_count",
        10,
    ),
    (
        "Half Century",
        "Log fifty workouts",
        "medal",
        "workout_count",
        50,
    ),
    (
        "On a Roll",
        "Work out three days in a row",
        "flame",
        "workout_streak",
        3,
    ),
    (
        "Week Warrior",
        "Work out seven days in a row",
        "flame",
        "workout_streak",
        7,
    ),
    (
        "Meal Tracker",
        "Log ten meals",
        "utensils",
        "meal_count",
        10,
    ),
    (
        "Nutrition Pro",
        "Log fifty meals",
        "utensils",
        "meal_count",
        50,
    ),
    (
        "Dear Diary",
        "Write five journal entries",
        "book-open",
        "journal_count",
        5,
    ),
    (
        "Reflective Mind",
        "Write twenty-five journal entries",
        "book-open",
        "journal_count",
        25,
    ),
    (
        "Crowd Favorite",
        "Reach ten followers",
        "users",
        "follower_count",
        10,
    ),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requirement {
    pub kind: String,
    pub value: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub requirement: Requirement,
}

/// Per-user progress toward one achievement. `is_completed` is monotonic:
/// once true it never flips back, no matter what progress value arrives later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAchievement {
    pub id: Uuid,
    pub user_id: Uuid,
    pub achievement_id: Uuid,
    pub progress: i64,
    pub is_completed: bool,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

/// Catalog entry joined with the user's progress (zero if untouched).
#[derive(Debug, Serialize)]
pub struct AchievementProgressResponse {
    pub achievement: Achievement,
    pub progress: i64,
    pub is_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Writes the static catalog in one batch on first boot. Subsequent boots
/// are no-ops.
pub async fn seed(store: &dyn DocumentStore) -> Result<(), StoreError> {
    let existing = store.query(COLLECTION, &[], None, Page::first(1)).await?;
    if !existing.is_empty() {
        return Ok(());
    }

    let ops = CATALOG
        .iter()
        .map(|(name, description, icon, kind, value)| BatchOp::Create {
            collection: COLLECTION.to_string(),
            data: json!({
                "name": name,
                "description": description,
                "icon": icon,
                "requirement": { "kind": kind, "value": value },
            }),
        })
        .collect();
    store.batch(ops).await?;

    tracing::info!("seeded achievement catalog ({} entries)", CATALOG.len());
    Ok(())
}

pub async fn list(store: &dyn DocumentStore) -> Result<Vec<Achievement>, AppError> {
    let docs = store
        .query(COLLECTION, &[], Some(OrderBy::asc("name")), Page::all())
        .await?;
    docs.iter().map(|doc| Ok(doc.decode()?)).collect()
}

pub async fn user_progress(
    store: &dyn DocumentStore,
    user_id: Uuid,
) -> Result<Vec<UserAchievement>, AppError> {
    let docs = store
        .query(
            PROGRESS,
            &[Filter::eq("user_id", user_id)],
            None,
            Page::all(),
        )
        .await?;
    docs.iter().map(|doc| Ok(doc.decode()?)).collect()
}

/// Applies a new progress value for one achievement. The stored progress
/// never regresses, and the completion transition fires at most once:
/// completion stamps the record, notifies the user and bumps the profile
/// counter as three further independent calls.
pub async fn update_progress(
    store: &dyn DocumentStore,
    user_id: Uuid,
    achievement_id: Uuid,
    value: i64,
) -> Result<UserAchievement, AppError> {
    let achievement: Achievement = store
        .read(COLLECTION, achievement_id)
        .await?
        .ok_or(AppError::NotFound("Achievement not found".to_string()))?
        .decode()?;

    let existing = store
        .query(
            PROGRESS,
            &[
                Filter::eq("user_id", user_id),
                Filter::eq("achievement_id", achievement_id),
            ],
            None,
            Page::first(1),
        )
        .await?;

    let now = Utc::now();
    match existing.into_iter().next() {
        None => {
            let completed = value >= achievement.requirement.value;
            let doc = store
                .create(
                    PROGRESS,
                    json!({
                        "user_id": user_id,
                        "achievement_id": achievement_id,
                        "progress": value,
                        "is_completed": completed,
                        "completed_at": completed.then(|| now.timestamp_millis()),
                        "updated_at": now.timestamp_millis(),
                    }),
                )
                .await?;
            if completed {
                award(store, &achievement, user_id).await?;
            }
            Ok(doc.decode()?)
        }
        Some(doc) => {
            let record: UserAchievement = doc.decode()?;
            let progress = record.progress.max(value);
            let completes_now = !record.is_completed && progress >= achievement.requirement.value;

            let mut patch = Patch::new()
                .set("progress", progress)
                .set("updated_at", now.timestamp_millis());
            if completes_now {
                patch = patch
                    .set("is_completed", true)
                    .set("completed_at", now.timestamp_millis());
            }
            store.update(PROGRESS, record.id, patch).await?;

            if completes_now {
                award(store, &achievement, user_id).await?;
            }

            Ok(UserAchievement {
                progress,
                is_completed: record.is_completed || completes_now,
                completed_at: record
                    .completed_at
                    .or_else(|| completes_now.then_some(now)),
                updated_at: now,
                ..record
            })
        }
    }
}

/// Fans a metric value out to every catalog entry tracking that metric.
pub async fn record_metric(
    store: &dyn DocumentStore,
    user_id: Uuid,
    kind: &str,
    value: i64,
) -> Result<(), AppError> {
    let matching = store
        .query(
            COLLECTION,
            &[Filter::eq("requirement.kind", kind)],
            None,
            Page::all(),
        )
        .await?;

    for doc in matching {
        update_progress(store, user_id, doc.id, value).await?;
    }
    Ok(())
}

async fn award(
    store: &dyn DocumentStore,
    achievement: &Achievement,
    user_id: Uuid,
) -> Result<(), AppError> {
    notifications::notify(
        store,
        user_id,
        user_id,
        NotificationKind::AchievementUnlocked,
        NotificationTarget::achievement(achievement.id),
        &format!("Achievement unlocked: {}", achievement.name),
    )
    .await?;

    profiles::adjust_stat(store, user_id, "achievements", 1).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    async fn achievement_by_name(store: &MemoryStore, name: &str) -> Achievement {
        list(store)
            .await
            .unwrap()
            .into_iter()
            .find(|a| a.name == name)
            .unwrap()
    }

    #[tokio::test]
    async fn completion_fires_once_and_is_monotonic() {
        let store = MemoryStore::new();
        seed(&store).await.unwrap();
        let user = Uuid::new_v4();
        profiles::ensure(&store, user).await.unwrap();

        let target = achievement_by_name(&store, "On a Roll").await;

        let first = update_progress(&store, user, target.id, 3).await.unwrap();
        assert!(first.is_completed);
        assert!(first.completed_at.is_some());

        // A lower value later must neither reset completion nor regress progress.
        let second = update_progress(&store, user, target.id, 1).await.unwrap();
        assert!(second.is_completed);
        assert_eq!(second.progress, 3);

        let stored = user_progress(&store, user).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].is_completed);

        // Exactly one unlock notification and one counter bump.
        let inbox = store
            .query(
                notifications::COLLECTION,
                &[Filter::eq("user_id", user)],
                None,
                Page::all(),
            )
            .await
            .unwrap();
        assert_eq!(inbox.len(), 1);

        let profile = profiles::ensure(&store, user).await.unwrap();
        assert_eq!(profile.stats.achievements, 1);
    }

    #[tokio::test]
    async fn progress_below_threshold_does_not_complete() {
        let store = MemoryStore::new();
        seed(&store).await.unwrap();
        let user = Uuid::new_v4();
        profiles::ensure(&store, user).await.unwrap();

        let target = achievement_by_name(&store, "Week Warrior").await;
        let record = update_progress(&store, user, target.id, 5).await.unwrap();
        assert!(!record.is_completed);
        assert_eq!(record.progress, 5);
        assert!(record.completed_at.is_none());
    }

    #[tokio::test]
    async fn record_metric_updates_every_matching_entry() {
        let store = MemoryStore::new();
        seed(&store).await.unwrap();
        let user = Uuid::new_v4();
        profiles::ensure(&store, user).await.unwrap();

        record_metric(&store, user, "workout_count", 10).await.unwrap();

        let records = user_progress(&store, user).await.unwrap();
        // Three workout_count entries exist; two are now complete.
        assert_eq!(records.len(), 3);
        assert_eq!(records.iter().filter(|r| r.is_completed).count(), 2);
    }

    #[tokio::test]
    async fn seed_is_idempotent() {
        let store = MemoryStore::new();
        seed(&store).await.unwrap();
        seed(&store).await.unwrap();
        assert_eq!(list(&store).await.unwrap().len(), CATALOG.len());
    }
}
