// Aggregate statistics for the progress page.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Timeframe, UserBook};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub timeframe: Timeframe,
    pub tasks: TaskProgress,
    pub habits: HabitProgress,
    pub pomodoro: PomodoroProgress,
    pub coins: CoinProgress,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskProgress {
    pub total: usize,
    pub completed: usize,
    pub completion_rate: f64, // 0..1
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HabitProgress {
    pub total: usize,
    pub active_streaks: usize,
    pub average_streak: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PomodoroProgress {
    pub total_sessions: usize,
    pub completed_sessions: usize,
    pub total_minutes: u64,
    pub average_session_length: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoinProgress {
    pub balance: u64,
    pub spent: u64,
}

fn ratio(num: f64, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num / den as f64 }
}

// Tasks and sessions are filtered by creation / start time;
// habits are always counted in full.
pub fn progress(book: &UserBook, timeframe: Timeframe, now: DateTime<Utc>) -> Progress {
    let tasks: Vec<_> = book
        .tasks
        .iter()
        .filter(|t| timeframe.contains(t.created_at, now))
        .collect();
    let completed = tasks.iter().filter(|t| t.completed).count();

    let habit_total = book.habits.len();
    let streak_sum: u64 = book.habits.iter().map(|h| u64::from(h.streak)).sum();

    let sessions: Vec<_> = book
        .sessions
        .iter()
        .filter(|s| timeframe.contains(s.start_time, now))
        .collect();
    let total_minutes: u64 = sessions.iter().map(|s| u64::from(s.duration)).sum();

    let spent = book
        .redemptions
        .iter()
        .filter(|r| timeframe.contains(r.redeemed_at, now))
        .map(|r| r.coins_cost)
        .sum();

    Progress {
        timeframe,
        tasks: TaskProgress {
            total: tasks.len(),
            completed,
            completion_rate: ratio(completed as f64, tasks.len()),
        },
        habits: HabitProgress {
            total: habit_total,
            active_streaks: book.habits.iter().filter(|h| h.streak > 0).count(),
            average_streak: ratio(streak_sum as f64, habit_total),
        },
        pomodoro: PomodoroProgress {
            total_sessions: sessions.len(),
            completed_sessions: sessions.iter().filter(|s| s.completed).count(),
            total_minutes,
            average_session_length: ratio(total_minutes as f64, sessions.len()),
        },
        coins: CoinProgress {
            balance: book.user.coins,
            spent,
        },
    }
}
