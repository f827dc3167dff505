use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::follows;
use crate::logs::{self, exercises, JournalEntry, MealLog, Mood, WorkoutLog};
use crate::posts::{self, Post, PostResponse, PostType};
use crate::profiles::Visibility;
use crate::store::{DocumentStore, Filter, OrderBy, Page};

pub mod handler;

/// How many followees the following feed fans out over.
const FOLLOWING_WINDOW: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Workout,
    Meal,
    NutritionGoal,
    Journal,
    Post,
}

/// Common shape every source is mapped into before merging.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityItem {
    pub id: Uuid,
    pub kind: ActivityKind,
    pub title: String,
    pub description: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub icon: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Relationship of the viewer to the activity's owner, decided once per
/// request and used to filter post visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Owner,
    Friends,
    Public,
}

/// Query parameters for feed endpoints
#[derive(Debug, Deserialize)]
pub struct FeedFilter {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Unified activity for one user: the per-source queries run concurrently,
/// results are mapped into `ActivityItem`, concatenated in fixed source
/// order (workouts, meals, journal, posts), stable-sorted by timestamp and
/// truncated. An empty source contributes nothing; a failed source fails
/// the whole read.
pub async fn for_user(
    store: &dyn DocumentStore,
    user_id: Uuid,
    audience: Audience,
    limit: usize,
) -> Result<Vec<ActivityItem>, AppError> {
    let owner = [Filter::eq("user_id", user_id)];
    let author = [Filter::eq("author_id", user_id)];
    let newest = || Some(OrderBy::desc("created_at"));
    let window = Page::first(limit);

    let (workouts, meals, journal, post_docs) = tokio::try_join!(
        store.query(logs::WORKOUTS, &owner, newest(), window),
        store.query(logs::MEALS, &owner, newest(), window),
        store.query(logs::JOURNAL, &owner, newest(), window),
        store.query(posts::COLLECTION, &author, newest(), window),
    )?;

    let mut items: Vec<ActivityItem> = Vec::new();
    for doc in &workouts {
        items.push(map_workout(doc.decode()?));
    }
    for doc in &meals {
        items.push(map_meal(doc.decode()?));
    }
    for doc in &journal {
        items.push(map_journal(doc.decode()?));
    }
    for doc in &post_docs {
        let post: Post = doc.decode()?;
        if post_visible(&post, audience) {
            items.push(map_post(post));
        }
    }

    Ok(merge(items, limit))
}

/// Posts by accepted followees, newest first, resolved to responses.
pub async fn following_feed(
    store: &dyn DocumentStore,
    me: Uuid,
    page: Page,
) -> Result<Vec<PostResponse>, AppError> {
    let followee_ids = follows::following_ids(store, me, FOLLOWING_WINDOW).await?;
    if followee_ids.is_empty() {
        return Ok(Vec::new());
    }

    let docs = store
        .query(
            posts::COLLECTION,
            &[Filter::is_in("author_id", &followee_ids)],
            Some(OrderBy::desc("created_at")),
            page,
        )
        .await?;

    let mut feed = Vec::with_capacity(docs.len());
    for doc in docs {
        let post: Post = doc.decode()?;
        // Following is accepted by construction, so friends-level posts show.
        if post.visibility == Visibility::Private {
            continue;
        }
        feed.push(posts::to_response(store, post).await?);
    }
    Ok(feed)
}

/// Descending by timestamp; the sort is stable, so equal timestamps keep
/// source-then-insertion order from the concatenation.
fn merge(mut items: Vec<ActivityItem>, limit: usize) -> Vec<ActivityItem> {
    items.sort_by_key(|item| std::cmp::Reverse(item.timestamp));
    items.truncate(limit);
    items
}

fn post_visible(post: &Post, audience: Audience) -> bool {
    match (post.visibility, audience) {
        (_, Audience::Owner) => true,
        (Visibility::Public, _) => true,
        (Visibility::Friends, Audience::Friends) => true,
        _ => false,
    }
}

fn map_workout(log: WorkoutLog) -> ActivityItem {
    let names: Vec<&str> = log
        .exercises
        .iter()
        .map(|set| exercises::display_name(&set.exercise_id))
        .collect();
    let description = if names.is_empty() {
        format!("{} min", log.duration_min)
    } else {
        format!("{} min: {}", log.duration_min, names.join(", "))
    };

    ActivityItem {
        id: log.id,
        kind: ActivityKind::Workout,
        title: log.title.unwrap_or_else(|| "Logged a workout".to_string()),
        description,
        timestamp: log.created_at,
        icon: "dumbbell",
        details: Some(json!({ "exercises": names, "duration_min": log.duration_min })),
    }
}

fn map_meal(log: MealLog) -> ActivityItem {
    match log {
        MealLog::Meal {
            id,
            name,
            calories,
            created_at,
            ..
        } => ActivityItem {
            id,
            kind: ActivityKind::Meal,
            title: "Logged a meal".to_string(),
            description: format!("{name}, {calories} kcal"),
            timestamp: created_at,
            icon: "utensils",
            details: Some(json!({ "calories": calories })),
        },
        MealLog::DailyCompletion {
            id,
            date,
            total_calories,
            meals_logged,
            created_at,
            ..
        } => ActivityItem {
            id,
            kind: ActivityKind::NutritionGoal,
            title: "Completed a nutrition day".to_string(),
            description: format!("{meals_logged} meals, {total_calories} kcal on {date}"),
            timestamp: created_at,
            icon: "flag",
            details: Some(json!({ "date": date, "total_calories": total_calories })),
        },
    }
}

fn map_journal(entry: JournalEntry) -> ActivityItem {
    let mood = match entry.mood {
        Mood::Great => "great",
        Mood::Good => "good",
        Mood::Okay => "okay",
        Mood::Low => "low",
        Mood::Stressed => "stressed",
    };

    ActivityItem {
        id: entry.id,
        kind: ActivityKind::Journal,
        title: "Journal entry".to_string(),
        description: format!("{} (feeling {mood})", entry.title),
        timestamp: entry.created_at,
        icon: "book-open",
        details: None,
    }
}

fn map_post(post: Post) -> ActivityItem {
    let title = match post.kind {
        PostType::Workout => "Shared a workout",
        PostType::Achievement => "Celebrated an achievement",
        PostType::Progress => "Posted a progress update",
        PostType::Journal => "Shared a reflection",
    };

    ActivityItem {
        id: post.id,
        kind: ActivityKind::Post,
        title: title.to_string(),
        description: excerpt(&post.content, 140),
        timestamp: post.created_at,
        icon: "megaphone",
        details: None,
    }
}

fn excerpt(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use chrono::TimeZone;

    fn ms(ts: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ts).unwrap()
    }

    async fn put_workout(store: &MemoryStore, user: Uuid, ts: i64) {
        store
            .create(
                logs::WORKOUTS,
                json!({
                    "user_id": user,
                    "title": null,
                    "exercises": [{"exercise_id": "bench_press", "sets": 3, "reps": 8, "weight_kg": 60.0}],
                    "duration_min": 45,
                    "created_at": ts,
                }),
            )
            .await
            .unwrap();
    }

    async fn put_meal(store: &MemoryStore, user: Uuid, ts: i64) {
        store
            .create(
                logs::MEALS,
                json!({
                    "kind": "meal",
                    "user_id": user,
                    "name": "Oats",
                    "calories": 420,
                    "protein_g": null,
                    "carbs_g": null,
                    "fat_g": null,
                    "created_at": ts,
                }),
            )
            .await
            .unwrap();
    }

    async fn put_journal(store: &MemoryStore, user: Uuid, ts: i64) {
        store
            .create(
                logs::JOURNAL,
                json!({
                    "user_id": user,
                    "mood": "good",
                    "title": "Better today",
                    "body": "…",
                    "created_at": ts,
                }),
            )
            .await
            .unwrap();
    }

    async fn put_post(store: &MemoryStore, user: Uuid, ts: i64, visibility: &str) {
        store
            .create(
                posts::COLLECTION,
                json!({
                    "author_id": user,
                    "kind": "progress",
                    "content": "new PR",
                    "image_url": null,
                    "payload": null,
                    "visibility": visibility,
                    "stats": {"likes": 0, "comments": 0, "shares": 0},
                    "created_at": ts,
                }),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn merges_sources_in_descending_timestamp_order() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();

        put_workout(&store, user, 1_000).await;
        put_meal(&store, user, 3_000).await;
        put_journal(&store, user, 2_000).await;
        put_post(&store, user, 4_000, "public").await;

        let feed = for_user(&store, user, Audience::Owner, 30).await.unwrap();
        let timestamps: Vec<DateTime<Utc>> = feed.iter().map(|i| i.timestamp).collect();
        assert_eq!(timestamps, vec![ms(4_000), ms(3_000), ms(2_000), ms(1_000)]);
        assert_eq!(feed[0].kind, ActivityKind::Post);
        assert_eq!(feed[3].kind, ActivityKind::Workout);
    }

    #[tokio::test]
    async fn equal_timestamps_keep_source_order() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();

        // Insert in reverse of source order; the merge must still put
        // workouts before meals before posts.
        put_post(&store, user, 5_000, "public").await;
        put_meal(&store, user, 5_000).await;
        put_workout(&store, user, 5_000).await;

        let feed = for_user(&store, user, Audience::Owner, 30).await.unwrap();
        let kinds: Vec<ActivityKind> = feed.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![ActivityKind::Workout, ActivityKind::Meal, ActivityKind::Post]
        );
    }

    #[tokio::test]
    async fn tolerates_empty_sources() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();

        let empty = for_user(&store, user, Audience::Owner, 30).await.unwrap();
        assert!(empty.is_empty());

        put_journal(&store, user, 1_000).await;
        put_journal(&store, user, 2_000).await;

        let feed = for_user(&store, user, Audience::Owner, 30).await.unwrap();
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].timestamp, ms(2_000));
    }

    #[tokio::test]
    async fn truncates_to_the_display_count() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        for ts in 0..10 {
            put_workout(&store, user, ts * 1_000).await;
        }

        let feed = for_user(&store, user, Audience::Owner, 3).await.unwrap();
        assert_eq!(feed.len(), 3);
        assert_eq!(feed[0].timestamp, ms(9_000));
    }

    #[tokio::test]
    async fn audience_filters_post_visibility() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        put_post(&store, user, 1_000, "public").await;
        put_post(&store, user, 2_000, "friends").await;
        put_post(&store, user, 3_000, "private").await;

        let public = for_user(&store, user, Audience::Public, 30).await.unwrap();
        assert_eq!(public.len(), 1);

        let friends = for_user(&store, user, Audience::Friends, 30).await.unwrap();
        assert_eq!(friends.len(), 2);

        let owner = for_user(&store, user, Audience::Owner, 30).await.unwrap();
        assert_eq!(owner.len(), 3);
    }

    #[tokio::test]
    async fn meal_variants_map_to_distinct_kinds() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        put_meal(&store, user, 1_000).await;
        store
            .create(
                logs::MEALS,
                json!({
                    "kind": "daily_completion",
                    "user_id": user,
                    "date": "2026-03-01",
                    "total_calories": 2100,
                    "meals_logged": 4,
                    "created_at": 2_000,
                }),
            )
            .await
            .unwrap();

        let feed = for_user(&store, user, Audience::Owner, 30).await.unwrap();
        assert_eq!(feed[0].kind, ActivityKind::NutritionGoal);
        assert_eq!(feed[1].kind, ActivityKind::Meal);
    }

    #[tokio::test]
    async fn workout_items_resolve_exercise_names() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        put_workout(&store, user, 1_000).await;

        let feed = for_user(&store, user, Audience::Owner, 30).await.unwrap();
        assert!(feed[0].description.contains("Bench Press"));
    }
}
