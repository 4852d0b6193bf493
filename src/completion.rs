/*
Completion and payout rules for tasks, habits and pomodoro sessions.
Module is written independently from HTTP / Axum for testing:
callers pass in `now` / `today` instead of reading the clock here.
*/

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::ledger;
use crate::models::UserBook;

// Habit payout: 5 coins per streak day, capped
pub const HABIT_COINS_PER_STREAK_DAY: u64 = 5;
pub const HABIT_COINS_CAP: u64 = 50;

// Pomodoro payout: 4 coins per 5 planned minutes (25 min -> 20 coins)
pub const POMODORO_COINS_NUMERATOR: u64 = 4;
pub const POMODORO_COINS_DENOMINATOR: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payout {
    pub coins_earned: u64,
    pub balance: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HabitPayout {
    pub coins_earned: u64,
    pub streak: u32,
    pub balance: u64,
}

pub fn habit_payout(streak: u32) -> u64 {
    (u64::from(streak) * HABIT_COINS_PER_STREAK_DAY).min(HABIT_COINS_CAP)
}

pub fn pomodoro_payout(duration_min: u32) -> u64 {
    u64::from(duration_min) * POMODORO_COINS_NUMERATOR / POMODORO_COINS_DENOMINATOR
}

// Mark a task done and pay its reward. Fails if it was already paid.
pub fn complete_task(book: &mut UserBook, task_id: Uuid, now: DateTime<Utc>) -> Result<Payout, AppError> {
    let task = book
        .tasks
        .iter_mut()
        .find(|t| t.id == task_id)
        .ok_or(AppError::NotFound("Task"))?;

    if task.completed {
        return Err(AppError::AlreadyCompleted("Task"));
    }

    task.completed = true;
    task.completed_at = Some(now);
    let coins = task.coins_reward;

    let balance = ledger::credit(&mut book.user, coins);
    Ok(Payout { coins_earned: coins, balance })
}

// Record today's completion of a habit.
//
// Rules:
// - last completion == today (or later) -> rejected, nothing changes
// - last completion == yesterday        -> streak + 1
// - anything else (gap, first time)     -> streak = 1
pub fn complete_habit(book: &mut UserBook, habit_id: Uuid, today: NaiveDate) -> Result<HabitPayout, AppError> {
    let habit = book
        .habits
        .iter_mut()
        .find(|h| h.id == habit_id)
        .ok_or(AppError::NotFound("Habit"))?;

    if habit.last_completed.is_some_and(|last| last >= today) {
        return Err(AppError::AlreadyCompletedToday);
    }

    let yesterday = today.pred_opt();
    habit.streak = if habit.last_completed.is_some() && habit.last_completed == yesterday {
        habit.streak.saturating_add(1)
    } else {
        1
    };
    habit.last_completed = Some(today);

    let streak = habit.streak;
    let coins = habit_payout(streak);
    let balance = ledger::credit(&mut book.user, coins);

    Ok(HabitPayout { coins_earned: coins, streak, balance })
}

// Finish an active pomodoro session and pay for its planned length.
pub fn complete_pomodoro(book: &mut UserBook, session_id: Uuid, now: DateTime<Utc>) -> Result<Payout, AppError> {
    let session = book
        .sessions
        .iter_mut()
        .find(|s| s.id == session_id)
        .ok_or(AppError::NotFound("Pomodoro session"))?;

    if session.completed {
        return Err(AppError::AlreadyCompleted("Pomodoro session"));
    }

    let coins = pomodoro_payout(session.duration);
    session.completed = true;
    session.end_time = Some(now);
    session.coins_earned = Some(coins);

    let balance = ledger::credit(&mut book.user, coins);
    Ok(Payout { coins_earned: coins, balance })
}
