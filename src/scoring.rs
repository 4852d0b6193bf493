/*
Leaderboard scoring and ranking.
Pure functions over a snapshot of per-user stats; nothing here mutates.
*/

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Timeframe, UserBook};

pub const POINTS_PER_TASK: u64 = 10;
pub const POINTS_PER_STREAK_DAY: u64 = 5;
pub const PREMIUM_MULTIPLIER: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserStats {
    pub user_id: Uuid,
    pub username: String,
    pub is_premium: bool,
    pub tasks_completed: u64,
    pub total_streak: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub rank: usize, // 1-based
    #[serde(flatten)]
    pub stats: UserStats,
    pub score: f64,
}

// base = tasks * 10 + streak * 5, premium users get x1.5
pub fn score(stats: &UserStats) -> f64 {
    let base = stats.tasks_completed * POINTS_PER_TASK + stats.total_streak * POINTS_PER_STREAK_DAY;
    if stats.is_premium {
        base as f64 * PREMIUM_MULTIPLIER
    } else {
        base as f64
    }
}

// Collect one user's stats for the timeframe.
//
// - tasks_completed: tasks whose completion time lies inside the window
// - total_streak: sum of current streaks across all habits
pub fn stats_for(book: &UserBook, timeframe: Timeframe, now: DateTime<Utc>) -> UserStats {
    let tasks_completed = book
        .tasks
        .iter()
        .filter_map(|t| t.completed_at)
        .filter(|at| timeframe.contains(*at, now))
        .count() as u64;

    let total_streak = book.habits.iter().map(|h| u64::from(h.streak)).sum();

    UserStats {
        user_id: book.user.id,
        username: book.user.username.clone(),
        is_premium: book.user.is_premium,
        tasks_completed,
        total_streak,
    }
}

// Sorting rules:
// 1) Higher score first
// 2) If tied, lower user id first
pub fn rank(users: Vec<UserStats>) -> Vec<RankedEntry> {
    let mut scored: Vec<(UserStats, f64)> = users
        .into_iter()
        .map(|s| {
            let sc = score(&s);
            (s, sc)
        })
        .collect();

    scored.sort_by(|(a, sa), (b, sb)| sb.total_cmp(sa).then_with(|| a.user_id.cmp(&b.user_id)));

    scored
        .into_iter()
        .enumerate()
        .map(|(i, (stats, score))| RankedEntry { rank: i + 1, stats, score })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Habit, Priority, Task, User};
    use chrono::Duration;

    fn stats(id: u128, tasks: u64, streak: u64, premium: bool) -> UserStats {
        UserStats {
            user_id: Uuid::from_u128(id),
            username: format!("user{id}"),
            is_premium: premium,
            tasks_completed: tasks,
            total_streak: streak,
        }
    }

    #[test]
    fn score_examples() {
        assert_eq!(score(&stats(1, 10, 4, false)), 120.0);
        assert_eq!(score(&stats(1, 10, 4, true)), 180.0);
        assert_eq!(score(&stats(1, 0, 0, true)), 0.0);
        assert_eq!(score(&stats(1, 0, 1, true)), 7.5);
    }

    #[test]
    fn rank_orders_by_score_then_id() {
        let ranked = rank(vec![
            stats(3, 1, 0, false),  // 10
            stats(2, 2, 0, false),  // 20
            stats(1, 1, 0, false),  // 10
            stats(4, 0, 3, true),   // 22.5
        ]);
        let ids: Vec<u128> = ranked.iter().map(|e| e.stats.user_id.as_u128()).collect();
        assert_eq!(ids, vec![4, 2, 1, 3]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[3].rank, 4);
    }

    #[test]
    fn rank_is_deterministic_across_input_orders() {
        let a = vec![stats(5, 1, 1, false), stats(9, 1, 1, false), stats(7, 1, 1, false)];
        let mut b = a.clone();
        b.reverse();
        assert_eq!(rank(a), rank(b));
    }

    #[test]
    fn stats_respect_timeframe() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: "kim".into(),
            email: "kim@example.com".into(),
            password_hash: String::new(),
            coins: 0,
            is_premium: false,
            created_at: now,
        };
        let mut book = UserBook::new(user);
        for days_ago in [1, 10, 100] {
            book.tasks.push(Task {
                id: Uuid::new_v4(),
                user_id: book.user.id,
                title: format!("t{days_ago}"),
                description: None,
                priority: Priority::Low,
                category: None,
                due_date: None,
                coins_reward: 10,
                completed: true,
                completed_at: Some(now - Duration::days(days_ago)),
                created_at: now - Duration::days(days_ago),
            });
        }
        // open tasks never count
        let mut open = book.tasks[0].clone();
        open.id = Uuid::new_v4();
        open.completed = false;
        open.completed_at = None;
        book.tasks.push(open);

        for streak in [2, 3] {
            book.habits.push(Habit {
                id: Uuid::new_v4(),
                user_id: book.user.id,
                name: "h".into(),
                description: None,
                target_days: 1,
                reminder_time: None,
                streak,
                last_completed: None,
                created_at: now,
            });
        }

        assert_eq!(stats_for(&book, Timeframe::Weekly, now).tasks_completed, 1);
        assert_eq!(stats_for(&book, Timeframe::Monthly, now).tasks_completed, 2);
        let all = stats_for(&book, Timeframe::AllTime, now);
        assert_eq!(all.tasks_completed, 3);
        assert_eq!(all.total_streak, 5);
    }
}
