use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use crate::{
    auth::{jwt::TokenKeys, repo::UserStore, repo_types::User},
    error::AppError,
    state::AppState,
};

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AppError> {
    let header =
        header.ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?;
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::unauthorized("Invalid Authorization header"))?;
    Ok(token)
}

/// Verify the token and load the user it names.
pub async fn resolve_user(
    users: &dyn UserStore,
    keys: &TokenKeys,
    token: &str,
) -> Result<User, AppError> {
    let email = keys.verify_access(token).map_err(|e| {
        warn!(error = %e, "rejected bearer token");
        AppError::from(e)
    })?;
    users.find_by_email(&email).await?.ok_or_else(|| {
        warn!("token subject has no account");
        AppError::unauthorized("Could not validate credentials")
    })
}

pub fn require_active(user: User) -> Result<User, AppError> {
    if !user.is_active {
        return Err(AppError::unauthorized("Inactive user"));
    }
    Ok(user)
}

pub fn require_superuser(user: User) -> Result<User, AppError> {
    let user = require_active(user)?;
    if !user.is_superuser {
        return Err(AppError::Forbidden("Not enough permissions".into()));
    }
    Ok(user)
}

async fn user_from_parts(parts: &Parts, state: &AppState) -> Result<User, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let token = bearer_token(header)?;
    resolve_user(state.users.as_ref(), &state.tokens, token).await
}

/// A valid token belonging to an active account.
pub struct ActiveUser(pub User);

/// An active superuser.
pub struct Superuser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for ActiveUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = user_from_parts(parts, state).await?;
        require_active(user).map(ActiveUser)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Superuser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = user_from_parts(parts, state).await?;
        require_superuser(user).map(Superuser)
    }
}
