use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    articles::{
        dto::{ArticleCreate, ArticlePatch},
        repo,
        repo_types::Article,
    },
    auth::extractors::ActiveUser,
    error::AppError,
    pagination::{Page, Pagination},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/articles", get(list_articles))
        .route("/articles/:id", get(get_article))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/articles", post(create_article))
        .route("/articles/:id", put(update_article).delete(delete_article))
}

fn article_not_found() -> AppError {
    AppError::not_found("Article not found")
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create_article(
    State(state): State<AppState>,
    ActiveUser(user): ActiveUser,
    Json(body): Json<ArticleCreate>,
) -> Result<(StatusCode, Json<Article>), AppError> {
    body.validate()?;
    let article = repo::insert(&state.db, &body).await?;
    info!(article_id = %article.id, "article created");
    Ok((StatusCode::CREATED, Json(article)))
}

#[instrument(skip(state))]
pub async fn list_articles(
    State(state): State<AppState>,
    Query(p): Query<Pagination>,
) -> Result<Json<Page<Article>>, AppError> {
    let p = p.validate()?;
    let (items, total) = repo::list(&state.db, p.skip, p.limit).await?;
    Ok(Json(Page::new(items, total, p)))
}

#[instrument(skip(state))]
pub async fn get_article(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Article>, AppError> {
    repo::get(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(article_not_found)
}

#[instrument(skip(state, user, patch), fields(user_id = %user.id))]
pub async fn update_article(
    State(state): State<AppState>,
    ActiveUser(user): ActiveUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<ArticlePatch>,
) -> Result<Json<Article>, AppError> {
    patch.validate()?;
    let mut article = repo::get(&state.db, id)
        .await?
        .ok_or_else(article_not_found)?;
    patch.apply(&mut article);
    let article = repo::update(&state.db, &article).await?;
    info!(article_id = %article.id, "article updated");
    Ok(Json(article))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_article(
    State(state): State<AppState>,
    ActiveUser(user): ActiveUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !repo::delete(&state.db, id).await? {
        return Err(article_not_found());
    }
    info!(article_id = %id, "article deleted");
    Ok(Json(json!({ "message": "Article deleted successfully" })))
}
