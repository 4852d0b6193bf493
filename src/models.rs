use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub coins: u64,
    pub is_premium: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub category: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub coins_reward: u64,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Habit {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub target_days: u32,
    #[serde(with = "hhmm")]
    pub reminder_time: Option<NaiveTime>, // "HH:MM"
    pub streak: u32,
    pub last_completed: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PomodoroSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub duration: u32, // minutes
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub completed: bool,
    pub coins_earned: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reward {
    pub id: Uuid,
    pub user_id: Option<Uuid>, // None for system catalogue entries
    pub name: String,
    pub description: Option<String>,
    pub coins_cost: u64,
    pub is_premium: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Redemption {
    pub reward_id: Uuid,
    pub reward_name: String,
    pub coins_cost: u64,
    pub redeemed_at: DateTime<Utc>,
}

// Everything owned by one user. This is the unit of locking and of
// persistence: one document per user on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBook {
    pub user: User,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub habits: Vec<Habit>,
    #[serde(default)]
    pub sessions: Vec<PomodoroSession>,
    #[serde(default)]
    pub rewards: Vec<Reward>,
    #[serde(default)]
    pub redemptions: Vec<Redemption>,
}

impl UserBook {
    pub fn new(user: User) -> Self {
        Self {
            user,
            tasks: Vec::new(),
            habits: Vec::new(),
            sessions: Vec::new(),
            rewards: Vec::new(),
            redemptions: Vec::new(),
        }
    }
}

// Public view of a user, without the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub coins: u64,
    pub is_premium: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            email: u.email.clone(),
            coins: u.coins,
            is_premium: u.is_premium,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub enum Timeframe {
    #[default]
    #[serde(rename = "weekly")]
    Weekly,
    #[serde(rename = "monthly")]
    Monthly,
    #[serde(rename = "all-time")]
    AllTime,
}

impl Timeframe {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "all-time" => Some(Self::AllTime),
            _ => None,
        }
    }

    // Earliest instant inside the window, None when unbounded
    pub fn window_start(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Weekly => Some(now - Duration::days(7)),
            Self::Monthly => Some(now - Duration::days(30)),
            Self::AllTime => None,
        }
    }

    pub fn contains(self, at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.window_start(now).is_none_or(|start| at >= start)
    }
}

// Optional time-of-day stored and exchanged as "HH:MM"
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn parse(s: &str) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(s, FORMAT).ok()
    }

    pub fn serialize<S: Serializer>(t: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match t {
            Some(t) => s.serialize_str(&t.format(FORMAT).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw {
            None => Ok(None),
            Some(s) => parse(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid time {s:?}, expected HH:MM"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timeframe_parses_query_values() {
        assert_eq!(Timeframe::parse("weekly"), Some(Timeframe::Weekly));
        assert_eq!(Timeframe::parse("monthly"), Some(Timeframe::Monthly));
        assert_eq!(Timeframe::parse("all-time"), Some(Timeframe::AllTime));
        assert_eq!(Timeframe::parse("yearly"), None);
    }

    #[test]
    fn timeframe_window_bounds() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();
        let eight_days_ago = now - Duration::days(8);
        assert!(!Timeframe::Weekly.contains(eight_days_ago, now));
        assert!(Timeframe::Monthly.contains(eight_days_ago, now));
        assert!(Timeframe::AllTime.contains(now - Duration::days(3650), now));
    }

    #[test]
    fn reminder_time_uses_hh_mm() {
        let user_id = Uuid::new_v4();
        let habit = Habit {
            id: Uuid::new_v4(),
            user_id,
            name: "Read".into(),
            description: None,
            target_days: 1,
            reminder_time: hhmm::parse("07:30"),
            streak: 0,
            last_completed: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&habit).unwrap();
        assert_eq!(json["reminder_time"], "07:30");

        let back: Habit = serde_json::from_value(json).unwrap();
        assert_eq!(back.reminder_time, NaiveTime::from_hms_opt(7, 30, 0));
    }
}
