use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::models::Timeframe;
use crate::progress::{self, Progress};
use crate::scoring::{self, RankedEntry};
use crate::{ApiQuery, AppState};

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub timeframe: Option<String>, // weekly | monthly | all-time
    pub limit: Option<usize>,
}

fn parse_timeframe(raw: Option<&str>) -> Result<Timeframe, AppError> {
    match raw {
        None => Ok(Timeframe::default()),
        Some(s) => Timeframe::parse(s)
            .ok_or_else(|| AppError::validation("timeframe must be weekly, monthly or all-time")),
    }
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub timeframe: Timeframe,
    pub leaderboard: Vec<RankedEntry>,
}

// GET /api/leaderboard?timeframe=weekly&limit=10
pub async fn get_leaderboard(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiQuery(q): ApiQuery<StatsQuery>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let timeframe = parse_timeframe(q.timeframe.as_deref())?;
    let now = Utc::now();

    let stats = state
        .store
        .snapshot(|b| scoring::stats_for(b, timeframe, now))
        .await?;

    let mut leaderboard = scoring::rank(stats);
    if let Some(limit) = q.limit {
        leaderboard.truncate(limit);
    }

    Ok(Json(LeaderboardResponse { timeframe, leaderboard }))
}

// GET /api/progress?timeframe=weekly
pub async fn get_progress(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(q): ApiQuery<StatsQuery>,
) -> Result<Json<Progress>, AppError> {
    let timeframe = parse_timeframe(q.timeframe.as_deref())?;
    let now = Utc::now();

    let p = state
        .store
        .read(user.id, |b| progress::progress(b, timeframe, now))
        .await?;
    Ok(Json(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeframe_defaults_to_weekly() {
        assert_eq!(parse_timeframe(None).unwrap(), Timeframe::Weekly);
        assert_eq!(parse_timeframe(Some("all-time")).unwrap(), Timeframe::AllTime);
        assert!(parse_timeframe(Some("daily")).is_err());
    }
}
