use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{
        dto::{
            AuthorizationUrlResponse, CallbackParams, FederatedAuthResponse, LoginRequest,
            PublicUser, RegisterRequest, TokenResponse, UserPatch,
        },
        extractors::{ActiveUser, Superuser},
        federation::{self, FederationPolicy},
        google::IdentityProvider,
        jwt::TokenKeys,
        services,
    },
    error::AppError,
    pagination::Pagination,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/google/login", get(google_login))
        .route("/auth/google/callback", get(google_callback))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me).patch(update_me))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/users", get(list_users))
        .route("/auth/users/:id", get(get_user))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    let user = services::register(state.users.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, keys, payload))]
pub async fn login(
    State(state): State<AppState>,
    State(keys): State<TokenKeys>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = services::login(state.users.as_ref(), &keys, payload).await?;
    Ok(Json(TokenResponse::bearer(token)))
}

#[instrument(skip_all)]
pub async fn get_me(ActiveUser(user): ActiveUser) -> Json<PublicUser> {
    Json(user.into())
}

#[instrument(skip_all)]
pub async fn update_me(
    State(state): State<AppState>,
    ActiveUser(user): ActiveUser,
    Json(patch): Json<UserPatch>,
) -> Result<Json<PublicUser>, AppError> {
    let user = services::update_profile(state.users.as_ref(), user, patch).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, _admin))]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: Superuser,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<PublicUser>>, AppError> {
    let p = p.validate()?;
    let users = state.users.list(p.skip, p.limit).await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state, _admin))]
pub async fn get_user(
    State(state): State<AppState>,
    _admin: Superuser,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicUser>, AppError> {
    let user = services::get_user(state.users.as_ref(), id).await?;
    Ok(Json(user.into()))
}

fn federated(state: &AppState) -> Result<(&dyn IdentityProvider, FederationPolicy), AppError> {
    match (state.identity.as_deref(), state.config.google.as_ref()) {
        (Some(provider), Some(cfg)) => Ok((provider, FederationPolicy::from(cfg))),
        _ => Err(AppError::Configuration(
            "Google login is not configured".into(),
        )),
    }
}

#[instrument(skip_all)]
pub async fn google_login(
    State(state): State<AppState>,
) -> Result<Json<AuthorizationUrlResponse>, AppError> {
    let (provider, _) = federated(&state)?;
    Ok(Json(federation::begin(provider, &state.tokens)?))
}

#[instrument(skip_all)]
pub async fn google_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<FederatedAuthResponse>, AppError> {
    let (provider, policy) = federated(&state)?;
    let (access_token, user) =
        federation::complete(state.users.as_ref(), &state.tokens, provider, policy, params)
            .await?;
    Ok(Json(FederatedAuthResponse {
        access_token,
        token_type: "bearer".into(),
        user: user.into(),
    }))
}
