use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use validator::Validate;

use crate::{
    error::AppError,
    identity::CurrentUser,
    logs::{LogFilter, LogJournal, LogMeal, LogRange, LogWorkout},
    response::ApiResponse,
    store::{DocumentStore, Page},
};

/// Log a completed workout
/// POST /api/logs/workouts
pub async fn log_workout(
    State(store): State<Arc<dyn DocumentStore>>,
    CurrentUser(me): CurrentUser,
    Json(payload): Json<LogWorkout>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    let log = super::log_workout(store.as_ref(), me, &payload).await?;
    Ok(ApiResponse::success(log).created())
}

/// GET /api/logs/workouts
pub async fn get_workouts(
    State(store): State<Arc<dyn DocumentStore>>,
    CurrentUser(me): CurrentUser,
    Query(filter): Query<LogFilter>,
) -> Result<impl IntoResponse, AppError> {
    let (range, page) = list_params(&filter);
    let logs = super::list_workouts(store.as_ref(), me, range, page).await?;
    Ok(ApiResponse::success(logs))
}

/// Log a meal or close out a day's nutrition plan
/// POST /api/logs/meals
pub async fn log_meal(
    State(store): State<Arc<dyn DocumentStore>>,
    CurrentUser(me): CurrentUser,
    Json(payload): Json<LogMeal>,
) -> Result<impl IntoResponse, AppError> {
    let log = super::log_meal(store.as_ref(), me, payload).await?;
    Ok(ApiResponse::success(log).created())
}

/// GET /api/logs/meals
pub async fn get_meals(
    State(store): State<Arc<dyn DocumentStore>>,
    CurrentUser(me): CurrentUser,
    Query(filter): Query<LogFilter>,
) -> Result<impl IntoResponse, AppError> {
    let (range, page) = list_params(&filter);
    let logs = super::list_meals(store.as_ref(), me, range, page).await?;
    Ok(ApiResponse::success(logs))
}

/// Write a journal entry
/// POST /api/logs/journal
pub async fn log_journal(
    State(store): State<Arc<dyn DocumentStore>>,
    CurrentUser(me): CurrentUser,
    Json(payload): Json<LogJournal>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    let entry = super::log_journal(store.as_ref(), me, &payload).await?;
    Ok(ApiResponse::success(entry).created())
}

/// GET /api/logs/journal
pub async fn get_journal(
    State(store): State<Arc<dyn DocumentStore>>,
    CurrentUser(me): CurrentUser,
    Query(filter): Query<LogFilter>,
) -> Result<impl IntoResponse, AppError> {
    let (range, page) = list_params(&filter);
    let entries = super::list_journal(store.as_ref(), me, range, page).await?;
    Ok(ApiResponse::success(entries))
}

fn list_params(filter: &LogFilter) -> (LogRange, Page) {
    let limit = filter.limit.unwrap_or(20).clamp(1, 100) as usize;
    let offset = filter.offset.unwrap_or(0).max(0) as usize;
    let range = LogRange {
        since: filter.since,
        until: filter.until,
    };
    (range, Page::new(limit, offset))
}
