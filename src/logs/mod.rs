use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::achievements;
use crate::error::AppError;
use crate::profiles;
use crate::store::{DocumentStore, Filter, OrderBy, Page, Patch};

pub mod exercises;
pub mod handler;

pub const WORKOUTS: &str = "workout_logs";
pub const MEALS: &str = "meal_logs";
pub const JOURNAL: &str = "journal_entries";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseSet {
    pub exercise_id: String,
    pub sets: u32,
    pub reps: u32,
    pub weight_kg: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: Option<String>,
    pub exercises: Vec<ExerciseSet>,
    pub duration_min: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// A nutrition log entry is one of two shapes, discriminated by `kind`:
/// a single logged meal, or the marker that a day's plan was completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MealLog {
    Meal {
        id: Uuid,
        user_id: Uuid,
        name: String,
        calories: i64,
        protein_g: Option<f64>,
        carbs_g: Option<f64>,
        fat_g: Option<f64>,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        created_at: DateTime<Utc>,
    },
    DailyCompletion {
        id: Uuid,
        user_id: Uuid,
        /// Calendar day being closed out, `YYYY-MM-DD`.
        date: String,
        total_calories: i64,
        meals_logged: u32,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        created_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Great,
    Good,
    Okay,
    Low,
    Stressed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub mood: Mood,
    pub title: String,
    pub body: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Request payload for logging a workout
#[derive(Debug, Deserialize, Validate)]
pub struct LogWorkout {
    #[validate(length(max = 120, message = "Title too long"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "A workout needs at least one exercise"))]
    pub exercises: Vec<ExerciseSet>,
    #[validate(range(min = 1, max = 1440, message = "Duration must be between 1 and 1440 minutes"))]
    pub duration_min: u32,
}

/// Request payload for a nutrition log entry, mirroring the two cases.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogMeal {
    Meal {
        name: String,
        calories: i64,
        protein_g: Option<f64>,
        carbs_g: Option<f64>,
        fat_g: Option<f64>,
    },
    DailyCompletion {
        date: String,
        total_calories: i64,
        meals_logged: u32,
    },
}

/// Request payload for a journal entry
#[derive(Debug, Deserialize, Validate)]
pub struct LogJournal {
    pub mood: Mood,
    #[validate(length(min = 1, max = 120, message = "Title must be between 1 and 120 characters"))]
    pub title: String,
    #[validate(length(max = 10000, message = "Entry too long"))]
    pub body: String,
}

/// Query parameters for log listings. `since`/`until` are epoch millis.
#[derive(Debug, Deserialize)]
pub struct LogFilter {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub since: Option<i64>,
    pub until: Option<i64>,
}

/// Inclusive timestamp window for log queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRange {
    pub since: Option<i64>,
    pub until: Option<i64>,
}

fn scoped(user_id: Uuid, range: LogRange) -> Vec<Filter> {
    let mut filters = vec![Filter::eq("user_id", user_id)];
    if let Some(since) = range.since {
        filters.push(Filter::gte("created_at", since));
    }
    if let Some(until) = range.until {
        filters.push(Filter::lte("created_at", until));
    }
    filters
}

/// Streak rule: same calendar day keeps the streak, the next day extends
/// it, anything longer resets to one.
pub fn next_streak(last: Option<DateTime<Utc>>, now: DateTime<Utc>, current: i64) -> i64 {
    match last {
        None => 1,
        Some(last) => {
            let days = now
                .date_naive()
                .signed_duration_since(last.date_naive())
                .num_days();
            match days {
                0 => current.max(1),
                1 => current + 1,
                _ => 1,
            }
        }
    }
}

/// Persists a workout, then updates the profile counters (workout count,
/// streak, last-workout stamp) and feeds the achievement metrics. Each
/// step is its own store call, issued in sequence.
pub async fn log_workout(
    store: &dyn DocumentStore,
    me: Uuid,
    payload: &LogWorkout,
) -> Result<WorkoutLog, AppError> {
    let profile = profiles::ensure(store, me).await?;
    let now = Utc::now();

    let doc = store
        .create(
            WORKOUTS,
            json!({
                "user_id": me,
                "title": payload.title,
                "exercises": payload.exercises,
                "duration_min": payload.duration_min,
                "created_at": now.timestamp_millis(),
            }),
        )
        .await?;

    let streak = next_streak(profile.stats.last_workout_at, now, profile.stats.streak);
    store
        .update(
            profiles::COLLECTION,
            profile.id,
            Patch::new()
                .increment("stats.workouts", 1)
                .set("stats.streak", streak)
                .set("stats.last_workout_at", now.timestamp_millis()),
        )
        .await?;

    achievements::record_metric(store, me, "workout_count", profile.stats.workouts + 1).await?;
    achievements::record_metric(store, me, "workout_streak", streak).await?;

    Ok(doc.decode()?)
}

pub async fn log_meal(
    store: &dyn DocumentStore,
    me: Uuid,
    payload: LogMeal,
) -> Result<MealLog, AppError> {
    let now = Utc::now().timestamp_millis();
    let data = match &payload {
        LogMeal::Meal {
            name,
            calories,
            protein_g,
            carbs_g,
            fat_g,
        } => {
            if name.trim().is_empty() {
                return Err(AppError::UnprocessableEntity(
                    "Meal name cannot be empty".to_string(),
                ));
            }
            json!({
                "kind": "meal",
                "user_id": me,
                "name": name,
                "calories": calories,
                "protein_g": protein_g,
                "carbs_g": carbs_g,
                "fat_g": fat_g,
                "created_at": now,
            })
        }
        LogMeal::DailyCompletion {
            date,
            total_calories,
            meals_logged,
        } => json!({
            "kind": "daily_completion",
            "user_id": me,
            "date": date,
            "total_calories": total_calories,
            "meals_logged": meals_logged,
            "created_at": now,
        }),
    };

    let doc = store.create(MEALS, data).await?;

    if matches!(payload, LogMeal::Meal { .. }) {
        let count = store
            .query(
                MEALS,
                &[Filter::eq("user_id", me), Filter::eq("kind", "meal")],
                None,
                Page::all(),
            )
            .await?
            .len() as i64;
        achievements::record_metric(store, me, "meal_count", count).await?;
    }

    Ok(doc.decode()?)
}

pub async fn log_journal(
    store: &dyn DocumentStore,
    me: Uuid,
    payload: &LogJournal,
) -> Result<JournalEntry, AppError> {
    let doc = store
        .create(
            JOURNAL,
            json!({
                "user_id": me,
                "mood": payload.mood,
                "title": payload.title,
                "body": payload.body,
                "created_at": Utc::now().timestamp_millis(),
            }),
        )
        .await?;

    let count = store
        .query(
            JOURNAL,
            &[Filter::eq("user_id", me)],
            None,
            Page::all(),
        )
        .await?
        .len() as i64;
    achievements::record_metric(store, me, "journal_count", count).await?;

    Ok(doc.decode()?)
}

pub async fn list_workouts(
    store: &dyn DocumentStore,
    user_id: Uuid,
    range: LogRange,
    page: Page,
) -> Result<Vec<WorkoutLog>, AppError> {
    let docs = store
        .query(
            WORKOUTS,
            &scoped(user_id, range),
            Some(OrderBy::desc("created_at")),
            page,
        )
        .await?;
    docs.iter().map(|doc| Ok(doc.decode()?)).collect()
}

pub async fn list_meals(
    store: &dyn DocumentStore,
    user_id: Uuid,
    range: LogRange,
    page: Page,
) -> Result<Vec<MealLog>, AppError> {
    let docs = store
        .query(
            MEALS,
            &scoped(user_id, range),
            Some(OrderBy::desc("created_at")),
            page,
        )
        .await?;
    docs.iter().map(|doc| Ok(doc.decode()?)).collect()
}

pub async fn list_journal(
    store: &dyn DocumentStore,
    user_id: Uuid,
    range: LogRange,
    page: Page,
) -> Result<Vec<JournalEntry>, AppError> {
    let docs = store
        .query(
            JOURNAL,
            &scoped(user_id, range),
            Some(OrderBy::desc("created_at")),
            page,
        )
        .await?;
    docs.iter().map(|doc| Ok(doc.decode()?)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn first_workout_starts_a_streak() {
        assert_eq!(next_streak(None, at(2026, 3, 1, 9), 0), 1);
    }

    #[test]
    fn same_day_keeps_the_streak() {
        let last = at(2026, 3, 1, 7);
        assert_eq!(next_streak(Some(last), at(2026, 3, 1, 21), 4), 4);
    }

    #[test]
    fn next_day_extends_the_streak() {
        let last = at(2026, 3, 1, 22);
        assert_eq!(next_streak(Some(last), at(2026, 3, 2, 6), 4), 5);
    }

    #[test]
    fn a_gap_resets_the_streak() {
        let last = at(2026, 3, 1, 9);
        assert_eq!(next_streak(Some(last), at(2026, 3, 4, 9), 9), 1);
    }

    #[test]
    fn calendar_days_not_elapsed_hours() {
        // 23:50 to 00:10 is twenty minutes but still the next day.
        let last = at(2026, 3, 1, 23) + Duration::minutes(50);
        let now = at(2026, 3, 2, 0) + Duration::minutes(10);
        assert_eq!(next_streak(Some(last), now, 2), 3);
    }

    #[tokio::test]
    async fn list_workouts_honors_the_time_window() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        for ts in [1_000i64, 2_000, 3_000] {
            store
                .create(
                    WORKOUTS,
                    json!({
                        "user_id": user,
                        "title": null,
                        "exercises": [],
                        "duration_min": 30,
                        "created_at": ts,
                    }),
                )
                .await
                .unwrap();
        }

        let range = LogRange {
            since: Some(2_000),
            until: Some(3_000),
        };
        let logs = list_workouts(&store, user, range, Page::all()).await.unwrap();
        let stamps: Vec<i64> = logs
            .iter()
            .map(|log| log.created_at.timestamp_millis())
            .collect();
        assert_eq!(stamps, vec![3_000, 2_000]);
    }

    #[tokio::test]
    async fn logging_a_workout_updates_profile_counters() {
        let store = MemoryStore::new();
        crate::achievements::seed(&store).await.unwrap();
        let user = Uuid::new_v4();

        let payload = LogWorkout {
            title: None,
            exercises: vec![ExerciseSet {
                exercise_id: "deadlift".to_string(),
                sets: 3,
                reps: 5,
                weight_kg: Some(100.0),
            }],
            duration_min: 40,
        };
        log_workout(&store, user, &payload).await.unwrap();

        let profile = profiles::ensure(&store, user).await.unwrap();
        assert_eq!(profile.stats.workouts, 1);
        assert_eq!(profile.stats.streak, 1);
        assert!(profile.stats.last_workout_at.is_some());

        // "First Workout" unlocks off the first log.
        let progress = achievements::user_progress(&store, user).await.unwrap();
        assert!(progress.iter().any(|record| record.is_completed));
    }

    #[test]
    fn meal_log_round_trips_both_variants() {
        let meal: MealLog = serde_json::from_value(serde_json::json!({
            "kind": "meal",
            "id": Uuid::new_v4(),
            "user_id": Uuid::new_v4(),
            "name": "Oats",
            "calories": 420,
            "protein_g": 18.0,
            "carbs_g": null,
            "fat_g": null,
            "created_at": 1700000000000i64,
        }))
        .unwrap();
        assert!(matches!(meal, MealLog::Meal { calories: 420, .. }));

        let completion: MealLog = serde_json::from_value(serde_json::json!({
            "kind": "daily_completion",
            "id": Uuid::new_v4(),
            "user_id": Uuid::new_v4(),
            "date": "2026-03-01",
            "total_calories": 2100,
            "meals_logged": 4,
            "created_at": 1700000000000i64,
        }))
        .unwrap();
        assert!(matches!(
            completion,
            MealLog::DailyCompletion { meals_logged: 4, .. }
        ));
    }
}
