use std::sync::Arc;

use axum::{
    extract::FromRef,
    routing::{delete, get, post},
    Router,
};
use dotenv::dotenv;
use tracing::{info, warn};

mod achievements;
mod comments;
mod config;
mod error;
mod feed;
mod follows;
mod identity;
mod likes;
mod logs;
mod media;
mod notifications;
mod posts;
mod profiles;
mod response;
mod store;

#[cfg(test)]
mod tests;

use config::settings::Settings;
use media::{LocalMediaStore, MediaStore};
use store::{memory::MemoryStore, postgres::PgStore, DocumentStore};

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn DocumentStore>,
    media: Arc<dyn MediaStore>,
    settings: Settings,
}

impl FromRef<AppState> for Arc<dyn DocumentStore> {
    fn from_ref(app_state: &AppState) -> Arc<dyn DocumentStore> {
        app_state.store.clone()
    }
}

impl FromRef<AppState> for Arc<dyn MediaStore> {
    fn from_ref(app_state: &AppState) -> Arc<dyn MediaStore> {
        app_state.media.clone()
    }
}

impl FromRef<AppState> for Settings {
    fn from_ref(app_state: &AppState) -> Settings {
        app_state.settings.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let settings = Settings::new();

    let store: Arc<dyn DocumentStore> = match &settings.database_url {
        Some(url) => {
            let store = PgStore::connect(url).await?;
            info!("database connected");
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set, falling back to the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    achievements::seed(store.as_ref()).await?;

    let media: Arc<dyn MediaStore> = Arc::new(LocalMediaStore::new(
        settings.media_root.clone(),
        settings.media_base_url.clone(),
    ));

    let app_state = AppState {
        store,
        media,
        settings: settings.clone(),
    };

    let profile_router = Router::new()
        .route(
            "/me",
            get(profiles::handler::get_me).put(profiles::handler::update_me),
        )
        .route("/me/avatar", post(profiles::handler::upload_avatar))
        .route("/:id", get(profiles::handler::get_profile));

    let user_router = Router::new()
        .route(
            "/:id/follow",
            post(follows::handler::follow_user).delete(follows::handler::unfollow_user),
        )
        .route("/:id/followers", get(follows::handler::get_followers))
        .route("/:id/following", get(follows::handler::get_following));

    let follow_router = Router::new()
        .route("/requests", get(follows::handler::get_pending_requests))
        .route("/:id/accept", post(follows::handler::accept_follow));

    let post_router = Router::new()
        .route(
            "/",
            post(posts::handler::create_post).get(posts::handler::list_posts),
        )
        .route(
            "/:id",
            get(posts::handler::get_post).delete(posts::handler::delete_post),
        )
        .route("/:id/like", post(likes::handler::like_post))
        .route("/:id/share", post(posts::handler::share_post))
        .route(
            "/:id/comments",
            post(comments::handler::create_comment).get(comments::handler::get_post_comments),
        );

    let comment_router = Router::new()
        .route("/:id", delete(comments::handler::delete_comment))
        .route("/:id/like", post(likes::handler::like_comment))
        .route("/:id/replies", get(comments::handler::get_replies));

    let achievement_router = Router::new()
        .route("/", get(achievements::handler::get_achievements))
        .route("/me", get(achievements::handler::get_my_progress));

    let notification_router = Router::new()
        .route("/", get(notifications::handler::get_notifications))
        .route(
            "/unread-count",
            get(notifications::handler::get_unread_count),
        )
        .route("/read-all", post(notifications::handler::mark_all_read))
        .route("/:id/read", post(notifications::handler::mark_read));

    let log_router = Router::new()
        .route(
            "/workouts",
            post(logs::handler::log_workout).get(logs::handler::get_workouts),
        )
        .route(
            "/meals",
            post(logs::handler::log_meal).get(logs::handler::get_meals),
        )
        .route(
            "/journal",
            post(logs::handler::log_journal).get(logs::handler::get_journal),
        );

    let feed_router = Router::new()
        .route("/me", get(feed::handler::my_activity))
        .route("/following", get(feed::handler::following_feed))
        .route("/users/:id", get(feed::handler::user_activity));

    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .nest("/api/profiles", profile_router)
        .nest("/api/users", user_router)
        .nest("/api/follows", follow_router)
        .nest("/api/posts", post_router)
        .nest("/api/comments", comment_router)
        .nest("/api/achievements", achievement_router)
        .nest("/api/notifications", notification_router)
        .nest("/api/logs", log_router)
        .nest("/api/feed", feed_router)
        .with_state(app_state);

    info!("Server running on http://localhost:{}", settings.port);

    let listener = tokio::net::TcpListener::bind(settings.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
