// Define data modules
pub mod models; // Data structures (User, Task, Habit, Reward, ...)
pub mod error; // Error taxonomy + HTTP mapping
pub mod store; // Per-user persistent storage and locking
pub mod ledger; // Coin balance credit / debit
pub mod completion; // Task / habit / pomodoro completion rules
pub mod catalog; // Reward catalogue and redemption
pub mod scoring; // Leaderboard score and ranking
pub mod progress; // Progress statistics
pub mod auth; // Password hashing, tokens, CurrentUser
pub mod config; // CLI / env configuration
pub mod routes_auth; // HTTP handlers for register / login / profile
pub mod routes_tasks; // HTTP handlers for task APIs
pub mod routes_habits; // HTTP handlers for habit APIs
pub mod routes_pomodoro; // HTTP handlers for pomodoro APIs
pub mod routes_rewards; // HTTP handlers for the reward store
pub mod routes_stats; // HTTP handlers for leaderboard and progress

use std::{path::Path, sync::Arc};

use axum::{
    extract::{FromRequest, FromRequestParts},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use uuid::Uuid;

use crate::auth::TokenIssuer;
use crate::error::AppError;
use crate::store::Store;

// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub tokens: Arc<TokenIssuer>,
}

impl AppState {
    pub fn new(store: Store, tokens: TokenIssuer) -> Self {
        Self {
            store: Arc::new(store),
            tokens: Arc::new(tokens),
        }
    }
}

// JSON body extractor whose rejection is a `validation_error`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

// Query string extractor, rejected the same way.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

// Parse a path segment as an entity id.
pub fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::validation("invalid id"))
}

pub fn api_router() -> Router<AppState> {
    Router::new()
        // auth + profile
        .route("/register", post(routes_auth::register))
        .route("/login", post(routes_auth::login))
        .route("/user/profile", get(routes_auth::get_profile).put(routes_auth::update_profile))
        .route("/premium/upgrade", post(routes_auth::upgrade_premium))
        // tasks
        .route("/tasks", get(routes_tasks::get_tasks).post(routes_tasks::create_task))
        .route("/tasks/:id", put(routes_tasks::update_task).delete(routes_tasks::delete_task))
        .route("/tasks/:id/complete", post(routes_tasks::complete_task))
        // habits
        .route("/habits", get(routes_habits::get_habits).post(routes_habits::create_habit))
        .route("/habits/:id", put(routes_habits::update_habit).delete(routes_habits::delete_habit))
        .route("/habits/:id/complete", post(routes_habits::complete_habit))
        // pomodoro
        .route("/pomodoro", get(routes_pomodoro::get_sessions).post(routes_pomodoro::start_session))
        .route("/pomodoro/:id/complete", post(routes_pomodoro::complete_session))
        // rewards
        .route("/rewards", get(routes_rewards::get_rewards).post(routes_rewards::create_reward))
        .route("/rewards/:id", delete(routes_rewards::delete_reward))
        .route("/rewards/:id/redeem", post(routes_rewards::redeem_reward))
        // stats
        .route("/leaderboard", get(routes_stats::get_leaderboard))
        .route("/progress", get(routes_stats::get_progress))
}

// Full application: `/api` routes, health check, optional static client.
pub fn app(state: AppState, static_dir: Option<&Path>) -> Router {
    let mut app = Router::new()
        .nest("/api", api_router())
        .route("/health", get(|| async { "OK" }));

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
