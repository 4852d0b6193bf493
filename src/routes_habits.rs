// --------------------------------------------------
// Habit endpoints: CRUD plus the once-per-day completion
// that grows the streak and pays coins.
// --------------------------------------------------

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::completion;
use crate::error::AppError;
use crate::models::{hhmm, Habit};
use crate::{parse_id, ApiJson, AppState};

fn parse_reminder(raw: &str) -> Result<Option<NaiveTime>, AppError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    hhmm::parse(raw.trim())
        .map(Some)
        .ok_or_else(|| AppError::validation("reminder_time must be HH:MM"))
}

fn validate_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::validation("name required"));
    }
    Ok(())
}

fn validate_target(target_days: u32) -> Result<(), AppError> {
    if target_days == 0 {
        return Err(AppError::validation("target_days must be at least 1"));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct HabitsResponse {
    pub habits: Vec<Habit>,
}

// GET /api/habits
pub async fn get_habits(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<HabitsResponse>, AppError> {
    let habits = state.store.read(user.id, |b| b.habits.clone()).await?;
    Ok(Json(HabitsResponse { habits }))
}

#[derive(Debug, Deserialize)]
pub struct CreateHabitInput {
    pub name: String,
    pub description: Option<String>,
    pub target_days: Option<u32>,
    pub reminder_time: Option<String>, // "HH:MM"
}

// POST /api/habits
pub async fn create_habit(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<CreateHabitInput>,
) -> Result<impl IntoResponse, AppError> {
    validate_name(&input.name)?;
    let target_days = input.target_days.unwrap_or(1);
    validate_target(target_days)?;
    let reminder_time = match input.reminder_time.as_deref() {
        Some(raw) => parse_reminder(raw)?,
        None => None,
    };

    let habit = Habit {
        id: Uuid::new_v4(),
        user_id: user.id,
        name: input.name,
        description: input.description,
        target_days,
        reminder_time,
        streak: 0,
        last_completed: None,
        created_at: Utc::now(),
    };

    let created = state
        .store
        .update(user.id, |b| {
            b.habits.push(habit.clone());
            Ok(habit)
        })
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateHabitInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub target_days: Option<u32>,
    pub reminder_time: Option<String>,
}

// PUT /api/habits/:id
// Streak and last completion are owned by /complete and cannot be edited.
pub async fn update_habit(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<UpdateHabitInput>,
) -> Result<Json<Habit>, AppError> {
    let id = parse_id(&id)?;
    if let Some(name) = &input.name {
        validate_name(name)?;
    }
    if let Some(target) = input.target_days {
        validate_target(target)?;
    }
    let reminder_time = match input.reminder_time.as_deref() {
        Some(raw) => Some(parse_reminder(raw)?),
        None => None,
    };

    let updated = state
        .store
        .update(user.id, |b| {
            let h = b
                .habits
                .iter_mut()
                .find(|h| h.id == id)
                .ok_or(AppError::NotFound("Habit"))?;

            if let Some(name) = input.name {
                h.name = name;
            }
            if input.description.is_some() {
                h.description = input.description;
            }
            if let Some(target) = input.target_days {
                h.target_days = target;
            }
            if let Some(reminder) = reminder_time {
                h.reminder_time = reminder;
            }
            Ok(h.clone())
        })
        .await?;

    Ok(Json(updated))
}

// DELETE /api/habits/:id
pub async fn delete_habit(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id)?;

    state
        .store
        .update(user.id, |b| {
            let before = b.habits.len();
            b.habits.retain(|h| h.id != id);
            if b.habits.len() == before {
                return Err(AppError::NotFound("Habit"));
            }
            Ok(())
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct HabitCompleteResponse {
    pub message: &'static str,
    pub streak: u32,
    pub coins_earned: u64,
    pub balance: u64,
}

// POST /api/habits/:id/complete
// "Today" is the UTC calendar date of the request.
pub async fn complete_habit(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<HabitCompleteResponse>, AppError> {
    let id = parse_id(&id)?;
    let today = Utc::now().date_naive();

    let payout = state
        .store
        .update(user.id, |b| completion::complete_habit(b, id, today))
        .await?;

    info!(
        user_id = %user.id,
        habit_id = %id,
        streak = payout.streak,
        coins = payout.coins_earned,
        "habit completed"
    );

    Ok(Json(HabitCompleteResponse {
        message: "Habit completed",
        streak: payout.streak,
        coins_earned: payout.coins_earned,
        balance: payout.balance,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reminder_parsing() {
        assert_eq!(parse_reminder("08:15").unwrap(), NaiveTime::from_hms_opt(8, 15, 0));
        assert_eq!(parse_reminder("").unwrap(), None);
        assert!(parse_reminder("8am").is_err());
        assert!(parse_reminder("25:00").is_err());
    }

    #[test]
    fn target_must_be_positive() {
        assert!(validate_target(0).is_err());
        assert!(validate_target(30).is_ok());
    }
}
