/*
Reward catalogue: listing with eligibility hints, custom reward creation
for premium users, and redemption against the ledger.

System rewards (no owner) are shared by everybody. Custom rewards live in
their creator's book and are visible to that user only.
*/

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::ledger;
use crate::models::{Redemption, Reward, User, UserBook};

#[derive(Debug, Clone, Serialize)]
pub struct RewardListing {
    #[serde(flatten)]
    pub reward: Reward,
    pub eligible: bool,
    pub affordable: bool,
}

#[derive(Debug, Clone)]
pub struct NewReward {
    pub name: String,
    pub description: Option<String>,
    pub coins_cost: u64,
    pub is_premium: bool,
}

pub fn is_eligible(user: &User, reward: &Reward) -> bool {
    !reward.is_premium || user.is_premium
}

pub fn is_affordable(user: &User, reward: &Reward) -> bool {
    user.coins >= reward.coins_cost
}

// System rewards first, then the user's own, each in creation order.
pub fn list_rewards(user: &User, system: &[Reward], own: &[Reward]) -> Vec<RewardListing> {
    system
        .iter()
        .chain(own.iter())
        .map(|r| RewardListing {
            eligible: is_eligible(user, r),
            affordable: is_affordable(user, r),
            reward: r.clone(),
        })
        .collect()
}

pub fn create_reward(book: &mut UserBook, input: NewReward, now: DateTime<Utc>) -> Result<Reward, AppError> {
    if !book.user.is_premium {
        return Err(AppError::PremiumRequired("to create custom rewards"));
    }
    if input.name.trim().is_empty() {
        return Err(AppError::validation("name required"));
    }

    let reward = Reward {
        id: Uuid::new_v4(),
        user_id: Some(book.user.id),
        name: input.name,
        description: input.description,
        coins_cost: input.coins_cost,
        is_premium: input.is_premium,
        created_at: now,
    };
    book.rewards.push(reward.clone());
    Ok(reward)
}

// Exchange coins for a reward and return the remaining balance.
//
// The premium gate is checked before the funds gate, so a non-premium
// user who is also short of coins is told about the premium requirement.
pub fn redeem(book: &mut UserBook, reward: &Reward, now: DateTime<Utc>) -> Result<u64, AppError> {
    if !is_eligible(&book.user, reward) {
        return Err(AppError::PremiumRequired("for this reward"));
    }

    let remaining = ledger::debit(&mut book.user, reward.coins_cost)?;
    book.redemptions.push(Redemption {
        reward_id: reward.id,
        reward_name: reward.name.clone(),
        coins_cost: reward.coins_cost,
        redeemed_at: now,
    });
    Ok(remaining)
}

pub fn delete_reward(book: &mut UserBook, reward_id: Uuid) -> Result<(), AppError> {
    let before = book.rewards.len();
    book.rewards.retain(|r| r.id != reward_id);
    if book.rewards.len() == before {
        return Err(AppError::NotFound("Reward"));
    }
    Ok(())
}

// Starter catalogue used by `--seed-catalog` on an empty store.
pub fn default_catalog(now: DateTime<Utc>) -> Vec<Reward> {
    [
        ("Coffee break", "Treat yourself to a fancy coffee", 50, false),
        ("Episode night", "Watch one episode of your favourite show", 100, false),
        ("Lazy morning", "Sleep in without an alarm", 200, false),
        ("Day off", "A guilt-free day with no tasks", 500, true),
    ]
    .into_iter()
    .map(|(name, description, coins_cost, is_premium)| Reward {
        id: Uuid::new_v4(),
        user_id: None,
        name: name.to_string(),
        description: Some(description.to_string()),
        coins_cost,
        is_premium,
        created_at: now,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(coins: u64, is_premium: bool) -> UserBook {
        UserBook::new(User {
            id: Uuid::new_v4(),
            username: "linus".into(),
            email: "linus@example.com".into(),
            password_hash: String::new(),
            coins,
            is_premium,
            created_at: Utc::now(),
        })
    }

    fn reward(cost: u64, is_premium: bool) -> Reward {
        Reward {
            id: Uuid::new_v4(),
            user_id: None,
            name: "Movie".into(),
            description: None,
            coins_cost: cost,
            is_premium,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn redeem_twice_until_short() {
        let mut b = book(50, false);
        let r = reward(30, false);

        assert_eq!(redeem(&mut b, &r, Utc::now()).unwrap(), 20);
        let err = redeem(&mut b, &r, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::InsufficientFunds { .. }));
        assert_eq!(b.user.coins, 20);
        assert_eq!(b.redemptions.len(), 1);
    }

    #[test]
    fn premium_reward_rejected_for_rich_free_user() {
        let mut b = book(10_000, false);
        let err = redeem(&mut b, &reward(10, true), Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::PremiumRequired(_)));
        assert_eq!(b.user.coins, 10_000);
    }

    #[test]
    fn premium_gate_reported_before_funds() {
        let mut b = book(0, false);
        let err = redeem(&mut b, &reward(10, true), Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::PremiumRequired(_)));
    }

    #[test]
    fn premium_user_redeems_premium_reward() {
        let mut b = book(100, true);
        assert_eq!(redeem(&mut b, &reward(60, true), Utc::now()).unwrap(), 40);
    }

    #[test]
    fn listing_annotates_gates() {
        let b = book(40, false);
        let system = vec![reward(30, false), reward(30, true), reward(90, false)];
        let listed = list_rewards(&b.user, &system, &[]);

        let flags: Vec<(bool, bool)> = listed.iter().map(|l| (l.eligible, l.affordable)).collect();
        assert_eq!(flags, vec![(true, true), (false, true), (true, false)]);
    }

    #[test]
    fn only_premium_users_create_rewards() {
        let input = NewReward {
            name: "Concert".into(),
            description: None,
            coins_cost: 300,
            is_premium: false,
        };

        let mut free = book(0, false);
        assert!(matches!(
            create_reward(&mut free, input.clone(), Utc::now()),
            Err(AppError::PremiumRequired(_))
        ));
        assert!(free.rewards.is_empty());

        let mut premium = book(0, true);
        let created = create_reward(&mut premium, input, Utc::now()).unwrap();
        assert_eq!(created.user_id, Some(premium.user.id));
        assert_eq!(premium.rewards.len(), 1);
    }

    #[test]
    fn delete_unknown_reward_is_not_found() {
        let mut b = book(0, true);
        assert!(matches!(delete_reward(&mut b, Uuid::new_v4()), Err(AppError::NotFound(_))));
    }

    #[test]
    fn default_catalog_is_system_owned() {
        let catalog = default_catalog(Utc::now());
        assert!(!catalog.is_empty());
        assert!(catalog.iter().all(|r| r.user_id.is_none()));
        assert!(catalog.iter().any(|r| r.is_premium));
    }
}
