use std::collections::HashMap;
use std::sync::Arc;

use axum::{extract::State, response::IntoResponse};
use uuid::Uuid;

use crate::{
    achievements::AchievementProgressResponse, error::AppError, identity::CurrentUser,
    response::ApiResponse, store::DocumentStore,
};

/// List the achievement catalog
/// GET /api/achievements
pub async fn get_achievements(
    State(store): State<Arc<dyn DocumentStore>>,
) -> Result<impl IntoResponse, AppError> {
    let achievements = super::list(store.as_ref()).await?;
    Ok(ApiResponse::success(achievements))
}

/// Catalog joined with the current user's progress
/// GET /api/achievements/me
pub async fn get_my_progress(
    State(store): State<Arc<dyn DocumentStore>>,
    CurrentUser(me): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let catalog = super::list(store.as_ref()).await?;
    let records = super::user_progress(store.as_ref(), me).await?;

    let by_achievement: HashMap<Uuid, _> = records
        .into_iter()
        .map(|record| (record.achievement_id, record))
        .collect();

    let response: Vec<AchievementProgressResponse> = catalog
        .into_iter()
        .map(|achievement| {
            let record = by_achievement.get(&achievement.id);
            AchievementProgressResponse {
                progress: record.map_or(0, |r| r.progress),
                is_completed: record.is_some_and(|r| r.is_completed),
                completed_at: record.and_then(|r| r.completed_at),
                achievement,
            }
        })
        .collect();

    Ok(ApiResponse::success(response))
}
