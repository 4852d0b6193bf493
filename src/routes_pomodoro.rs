// Pomodoro session endpoints. Coins are paid on completion, never on start.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::completion;
use crate::error::AppError;
use crate::models::PomodoroSession;
use crate::{parse_id, ApiJson, AppState};

pub const DEFAULT_DURATION_MIN: u32 = 25;
pub const MAX_DURATION_MIN: u32 = 180;
pub const HISTORY_LIMIT: usize = 10;

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<PomodoroSession>,
}

// GET /api/pomodoro
// Latest sessions first
pub async fn get_sessions(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<SessionsResponse>, AppError> {
    let mut sessions = state.store.read(user.id, |b| b.sessions.clone()).await?;
    sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    sessions.truncate(HISTORY_LIMIT);
    Ok(Json(SessionsResponse { sessions }))
}

#[derive(Debug, Default, Deserialize)]
pub struct StartSessionInput {
    pub duration: Option<u32>, // minutes
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub id: Uuid,
    pub start_time: DateTime<Utc>,
    pub duration: u32,
}

// POST /api/pomodoro
pub async fn start_session(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<StartSessionInput>,
) -> Result<impl IntoResponse, AppError> {
    let duration = input.duration.unwrap_or(DEFAULT_DURATION_MIN);
    if !(1..=MAX_DURATION_MIN).contains(&duration) {
        return Err(AppError::validation(format!(
            "duration must be between 1 and {MAX_DURATION_MIN} minutes"
        )));
    }

    let session = PomodoroSession {
        id: Uuid::new_v4(),
        user_id: user.id,
        duration,
        start_time: Utc::now(),
        end_time: None,
        completed: false,
        coins_earned: None,
    };
    let resp = StartSessionResponse {
        id: session.id,
        start_time: session.start_time,
        duration,
    };

    state
        .store
        .update(user.id, |b| {
            b.sessions.push(session);
            Ok(())
        })
        .await?;

    Ok((StatusCode::CREATED, Json(resp)))
}

#[derive(Debug, Serialize)]
pub struct SessionCompleteResponse {
    pub message: &'static str,
    pub coins_earned: u64,
    pub balance: u64,
}

// POST /api/pomodoro/:id/complete
pub async fn complete_session(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<SessionCompleteResponse>, AppError> {
    let id = parse_id(&id)?;
    let now = Utc::now();

    let payout = state
        .store
        .update(user.id, |b| completion::complete_pomodoro(b, id, now))
        .await?;

    info!(user_id = %user.id, session_id = %id, coins = payout.coins_earned, "pomodoro completed");

    Ok(Json(SessionCompleteResponse {
        message: "Session completed",
        coins_earned: payout.coins_earned,
        balance: payout.balance,
    }))
}
