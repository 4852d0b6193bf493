// --------------------------------------------------
// Account endpoints: register, login, profile, premium upgrade.
// Everything except register / login needs a bearer token.
// --------------------------------------------------

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::{self, CurrentUser};
use crate::error::AppError;
use crate::models::{User, UserProfile};
use crate::{ApiJson, AppState};

pub const MIN_PASSWORD_LEN: usize = 8;
const MAX_USERNAME_LEN: usize = 80;

fn validate_username(username: &str) -> Result<(), AppError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("username required"));
    }
    if trimmed.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::validation(format!(
            "username longer than {MAX_USERNAME_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AppError> {
    let trimmed = email.trim();
    match trimmed.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(AppError::validation("invalid email")),
    }
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

// POST /api/register
pub async fn register(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<RegisterInput>,
) -> Result<impl IntoResponse, AppError> {
    validate_username(&input.username)?;
    validate_email(&input.email)?;
    validate_password(&input.password)?;

    let user = User {
        id: Uuid::new_v4(),
        username: input.username.trim().to_string(),
        email: input.email.trim().to_string(),
        password_hash: auth::hash_password(&input.password)?,
        coins: 0,
        is_premium: false,
        created_at: Utc::now(),
    };

    let user = state.store.register(user).await?;
    let token = state.tokens.issue(user.id)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: UserProfile::from(&user),
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<LoginInput>,
) -> Result<Json<AuthResponse>, AppError> {
    let invalid = || AppError::Unauthenticated("Invalid credentials".into());

    let id = state.store.find_by_email(&input.email).await?.ok_or_else(invalid)?;
    let user = state.store.read(id, |b| b.user.clone()).await?;
    if !auth::verify_password(&input.password, &user.password_hash)? {
        return Err(invalid());
    }

    let token = state.tokens.issue(user.id)?;
    Ok(Json(AuthResponse {
        token,
        user: UserProfile::from(&user),
    }))
}

// GET /api/user/profile
pub async fn get_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<UserProfile>, AppError> {
    let profile = state.store.read(user.id, |b| UserProfile::from(&b.user)).await?;
    Ok(Json(profile))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileInput {
    pub username: Option<String>,
    pub email: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

// PUT /api/user/profile
// Password changes need both current_password and new_password.
pub async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<UpdateProfileInput>,
) -> Result<Json<UserProfile>, AppError> {
    let username = input.username.map(|u| u.trim().to_string());
    let email = input.email.map(|e| e.trim().to_string());
    if let Some(u) = &username {
        validate_username(u)?;
    }
    if let Some(e) = &email {
        validate_email(e)?;
    }

    // Hashing is slow, so do it before taking any lock.
    let password_change = match (input.current_password, input.new_password) {
        (Some(current), Some(new)) => {
            validate_password(&new)?;
            Some((current, auth::hash_password(&new)?))
        }
        (None, None) => None,
        _ => {
            return Err(AppError::validation(
                "current_password and new_password must be given together",
            ))
        }
    };

    let profile = state
        .store
        .update_identity(user.id, username, email, |b| {
            if let Some((current, new_hash)) = password_change {
                if !auth::verify_password(&current, &b.user.password_hash)? {
                    return Err(AppError::validation("Current password is incorrect"));
                }
                b.user.password_hash = new_hash;
            }
            Ok(UserProfile::from(&b.user))
        })
        .await?;

    info!(user_id = %user.id, "profile updated");
    Ok(Json(profile))
}

#[derive(Debug, Serialize)]
pub struct UpgradeResponse {
    pub message: &'static str,
    pub is_premium: bool,
}

// POST /api/premium/upgrade
// No payment integration: the flag is simply set.
pub async fn upgrade_premium(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<UpgradeResponse>, AppError> {
    state
        .store
        .update(user.id, |b| {
            if b.user.is_premium {
                return Err(AppError::validation("User is already premium"));
            }
            b.user.is_premium = true;
            Ok(())
        })
        .await?;

    info!(user_id = %user.id, "upgraded to premium");
    Ok(Json(UpgradeResponse {
        message: "Successfully upgraded to premium",
        is_premium: true,
    }))
}
