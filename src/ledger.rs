// Coin balance mutations. Callers hold the user's lock (see store.rs),
// so these functions only have to keep the balance arithmetic honest.

use crate::error::AppError;
use crate::models::User;

// Add `amount` coins and return the new balance.
pub fn credit(user: &mut User, amount: u64) -> u64 {
    user.coins = user.coins.saturating_add(amount);
    user.coins
}

// Remove `amount` coins, or fail without touching the balance.
pub fn debit(user: &mut User, amount: u64) -> Result<u64, AppError> {
    if user.coins < amount {
        return Err(AppError::InsufficientFunds {
            balance: user.coins,
            required: amount,
        });
    }
    user.coins -= amount;
    Ok(user.coins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(coins: u64) -> User {
        User {
            id: Uuid::new_v4(),
            username: "ada".into(),
            email: "ada@example.com".into(),
            password_hash: String::new(),
            coins,
            is_premium: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn credit_returns_new_balance() {
        let mut u = user(5);
        assert_eq!(credit(&mut u, 10), 15);
        assert_eq!(credit(&mut u, 0), 15);
    }

    #[test]
    fn credit_saturates() {
        let mut u = user(u64::MAX - 1);
        assert_eq!(credit(&mut u, 10), u64::MAX);
    }

    #[test]
    fn debit_exact_balance_reaches_zero() {
        let mut u = user(30);
        assert_eq!(debit(&mut u, 30).unwrap(), 0);
    }

    #[test]
    fn failed_debit_leaves_balance() {
        let mut u = user(20);
        let err = debit(&mut u, 30).unwrap_err();
        assert!(matches!(err, AppError::InsufficientFunds { balance: 20, required: 30 }));
        assert_eq!(u.coins, 20);
    }
}
