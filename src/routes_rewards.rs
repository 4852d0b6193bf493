// --------------------------------------------------
// Reward store endpoints.
//
// - GET lists system rewards plus the caller's custom rewards,
//   annotated with eligibility / affordability hints
// - POST creates a custom reward (premium only)
// - redeem debits coins after the premium and funds gates
// --------------------------------------------------

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::CurrentUser;
use crate::catalog::{self, NewReward, RewardListing};
use crate::error::AppError;
use crate::{parse_id, ApiJson, AppState};

#[derive(Debug, Serialize)]
pub struct RewardsResponse {
    pub rewards: Vec<RewardListing>,
    pub user_coins: u64,
    pub is_premium: bool,
}

// GET /api/rewards
pub async fn get_rewards(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<RewardsResponse>, AppError> {
    let system = state.store.catalog().await;
    let resp = state
        .store
        .read(user.id, |b| RewardsResponse {
            rewards: catalog::list_rewards(&b.user, &system, &b.rewards),
            user_coins: b.user.coins,
            is_premium: b.user.is_premium,
        })
        .await?;
    Ok(Json(resp))
}

#[derive(Debug, Deserialize)]
pub struct CreateRewardInput {
    pub name: String,
    pub description: Option<String>,
    pub coins_cost: u64,
    #[serde(default)]
    pub is_premium: bool,
}

// POST /api/rewards
// The premium gate is checked before the body is looked at.
pub async fn create_reward(
    State(state): State<AppState>,
    user: CurrentUser,
    input: Result<ApiJson<CreateRewardInput>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    if !state.store.read(user.id, |b| b.user.is_premium).await? {
        return Err(AppError::PremiumRequired("to create custom rewards"));
    }
    let ApiJson(input) = input?;

    let now = Utc::now();
    let new_reward = NewReward {
        name: input.name,
        description: input.description,
        coins_cost: input.coins_cost,
        is_premium: input.is_premium,
    };

    let reward = state
        .store
        .update(user.id, |b| catalog::create_reward(b, new_reward, now))
        .await?;

    info!(user_id = %user.id, reward_id = %reward.id, cost = reward.coins_cost, "custom reward created");
    Ok((StatusCode::CREATED, Json(reward)))
}

// DELETE /api/rewards/:id
// Only custom rewards owned by the caller can be deleted.
pub async fn delete_reward(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id)?;
    state
        .store
        .update(user.id, |b| catalog::delete_reward(b, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    pub message: &'static str,
    pub remaining_coins: u64,
}

// POST /api/rewards/:id/redeem
pub async fn redeem_reward(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<RedeemResponse>, AppError> {
    let id = parse_id(&id)?;
    let now = Utc::now();

    // System rewards are looked up before taking the user lock.
    let system = state.store.catalog_reward(id).await;

    let result = state
        .store
        .update(user.id, |b| {
            let reward = match system {
                Some(r) => r,
                None => b
                    .rewards
                    .iter()
                    .find(|r| r.id == id)
                    .cloned()
                    .ok_or(AppError::NotFound("Reward"))?,
            };
            catalog::redeem(b, &reward, now)
        })
        .await;

    match result {
        Ok(remaining_coins) => {
            info!(user_id = %user.id, reward_id = %id, remaining_coins, "reward redeemed");
            Ok(Json(RedeemResponse {
                message: "Reward redeemed successfully",
                remaining_coins,
            }))
        }
        Err(err) => {
            if matches!(err, AppError::PremiumRequired(_) | AppError::InsufficientFunds { .. }) {
                warn!(user_id = %user.id, reward_id = %id, kind = err.kind(), "redemption rejected");
            }
            Err(err)
        }
    }
}
