// --------------------------------------------------
// Handles API endpoints related to task CRUD operations
// and task completion payouts.
//
// Responsibilities:
// - Create / read / update / delete tasks
// - Complete a task and credit its coin reward once
// --------------------------------------------------

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::completion;
use crate::error::AppError;
use crate::models::{Priority, Task};
use crate::{parse_id, ApiJson, AppState};

pub const DEFAULT_TASK_COINS: u64 = 10;
const MAX_TITLE_LEN: usize = 200;
const MAX_CATEGORY_LEN: usize = 50;

// Accepts RFC3339, or a naive "YYYY-MM-DDTHH:MM[:SS]" / "YYYY-MM-DD" taken as UTC
pub fn parse_due_date(raw: &str) -> Result<Option<DateTime<Utc>>, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(Some(naive.and_utc()));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Some(naive.and_utc()))
        .ok_or_else(|| AppError::validation("invalid due_date"))
}

fn validate_title(title: &str) -> Result<(), AppError> {
    if title.trim().is_empty() {
        return Err(AppError::validation("title required"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::validation(format!("title longer than {MAX_TITLE_LEN} characters")));
    }
    Ok(())
}

fn validate_category(category: &Option<String>) -> Result<(), AppError> {
    match category {
        Some(c) if c.chars().count() > MAX_CATEGORY_LEN => Err(AppError::validation(format!(
            "category longer than {MAX_CATEGORY_LEN} characters"
        ))),
        _ => Ok(()),
    }
}

#[derive(Debug, Serialize)]
pub struct TasksResponse {
    pub tasks: Vec<Task>,
}

// -----------------------------
// GET /api/tasks
// Returns all tasks of the caller
// -----------------------------
pub async fn get_tasks(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<TasksResponse>, AppError> {
    let tasks = state.store.read(user.id, |b| b.tasks.clone()).await?;
    Ok(Json(TasksResponse { tasks }))
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskInput {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub due_date: Option<String>, // RFC3339 or naive local
    pub coins_reward: Option<u64>,
}

// -----------------------------
// POST /api/tasks
// Creates a new task for the caller
// -----------------------------
pub async fn create_task(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<CreateTaskInput>,
) -> Result<impl IntoResponse, AppError> {
    validate_title(&input.title)?;
    validate_category(&input.category)?;
    let due_date = match input.due_date.as_deref() {
        Some(raw) => parse_due_date(raw)?,
        None => None,
    };

    let now = Utc::now();
    let task = Task {
        id: Uuid::new_v4(),
        user_id: user.id,
        title: input.title,
        description: input.description,
        priority: input.priority.unwrap_or_default(),
        category: input.category,
        due_date,
        coins_reward: input.coins_reward.unwrap_or(DEFAULT_TASK_COINS),
        completed: false,
        completed_at: None,
        created_at: now,
    };

    let created = state
        .store
        .update(user.id, |b| {
            b.tasks.push(task.clone());
            Ok(task)
        })
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub due_date: Option<String>,
    pub coins_reward: Option<u64>,
}

// -----------------------------
// PUT /api/tasks/:id
// Updates the given fields of an existing task.
// Completion state is only changed by /complete.
// ----------------------------
pub async fn update_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<UpdateTaskInput>,
) -> Result<Json<Task>, AppError> {
    let id = parse_id(&id)?;

    if let Some(title) = &input.title {
        validate_title(title)?;
    }
    validate_category(&input.category)?;
    let due_date = match input.due_date.as_deref() {
        Some(raw) => Some(parse_due_date(raw)?),
        None => None,
    };

    let updated = state
        .store
        .update(user.id, |b| {
            let t = b
                .tasks
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or(AppError::NotFound("Task"))?;

            if let Some(title) = input.title {
                t.title = title;
            }
            if input.description.is_some() {
                t.description = input.description;
            }
            if let Some(p) = input.priority {
                t.priority = p;
            }
            if input.category.is_some() {
                t.category = input.category;
            }
            if let Some(due) = due_date {
                t.due_date = due;
            }
            if let Some(coins) = input.coins_reward {
                t.coins_reward = coins;
            }
            Ok(t.clone())
        })
        .await?;

    Ok(Json(updated))
}

// -----------------------------
// DELETE /api/tasks/:id
// Removes a task permanently
// -----------------------------
pub async fn delete_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id)?;

    state
        .store
        .update(user.id, |b| {
            let before = b.tasks.len();
            b.tasks.retain(|t| t.id != id);
            if b.tasks.len() == before {
                return Err(AppError::NotFound("Task"));
            }
            Ok(())
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct CompleteResponse {
    pub message: &'static str,
    pub coins_earned: u64,
    pub balance: u64,
}

// -----------------------------
// POST /api/tasks/:id/complete
// Marks a task done and credits its reward (once)
// -----------------------------
pub async fn complete_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<CompleteResponse>, AppError> {
    let id = parse_id(&id)?;
    let now = Utc::now();

    let payout = state
        .store
        .update(user.id, |b| completion::complete_task(b, id, now))
        .await?;

    info!(user_id = %user.id, task_id = %id, coins = payout.coins_earned, "task completed");

    Ok(Json(CompleteResponse {
        message: "Task completed successfully",
        coins_earned: payout.coins_earned,
        balance: payout.balance,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn due_date_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap();
        assert_eq!(parse_due_date("2024-06-01T09:30:00Z").unwrap(), Some(expected));
        assert_eq!(parse_due_date("2024-06-01T11:30:00+02:00").unwrap(), Some(expected));
        assert_eq!(parse_due_date("2024-06-01T09:30").unwrap(), Some(expected));
        assert_eq!(
            parse_due_date("2024-06-01").unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_due_date("  ").unwrap(), None);
        assert!(parse_due_date("next tuesday").is_err());
    }

    #[test]
    fn title_rules() {
        assert!(validate_title("Ship it").is_ok());
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(201)).is_err());
    }
}
