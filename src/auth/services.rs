use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{LoginRequest, RegisterRequest, UserPatch},
        jwt::TokenKeys,
        password::{hash_password, verify_password, MAX_PASSWORD_BYTES, MIN_PASSWORD_LEN},
        repo::UserStore,
        repo_types::{NewUser, User},
    },
    error::AppError,
    validation::{check_max_len, normalize_email},
};

/// Every login failure looks like this, whatever the cause.
pub const INVALID_CREDENTIALS: &str = "Incorrect email or password";

fn check_password_shape(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AppError::validation(format!(
            "Password must be at most {MAX_PASSWORD_BYTES} bytes"
        )));
    }
    Ok(())
}

#[instrument(skip(users, req), fields(email = %req.email))]
pub async fn register(users: &dyn UserStore, req: RegisterRequest) -> Result<User, AppError> {
    let email = normalize_email(&req.email)?;
    check_password_shape(&req.password)?;
    check_max_len("full_name", req.full_name.as_deref(), 100)?;

    if users.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let hash = hash_password(&req.password)?;
    // A concurrent registration can still win the race; the unique index turns it into Conflict.
    let user = users
        .insert(NewUser::local(email, hash, req.full_name))
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

#[instrument(skip(users, keys, req), fields(email = %req.email))]
pub async fn login(
    users: &dyn UserStore,
    keys: &TokenKeys,
    req: LoginRequest,
) -> Result<String, AppError> {
    let invalid = || AppError::unauthorized(INVALID_CREDENTIALS);
    let email = req.email.trim().to_lowercase();

    let Some(user) = users.find_by_email(&email).await? else {
        warn!(%email, "login unknown email");
        return Err(invalid());
    };
    let Some(hash) = user.password_hash.as_deref() else {
        warn!(user_id = %user.id, "login against federation-only account");
        return Err(invalid());
    };
    if !verify_password(&req.password, hash) {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    let token = keys.issue_access(&user.email)?;
    info!(user_id = %user.id, "user logged in");
    Ok(token)
}

#[instrument(skip(users, user, patch), fields(user_id = %user.id))]
pub async fn update_profile(
    users: &dyn UserStore,
    mut user: User,
    patch: UserPatch,
) -> Result<User, AppError> {
    patch.validate()?;
    patch.apply(&mut user);
    let user = users.update(&user).await?;
    info!("profile updated");
    Ok(user)
}

pub async fn get_user(users: &dyn UserStore, id: Uuid) -> Result<User, AppError> {
    users
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}
