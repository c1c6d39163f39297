use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::ActiveUser,
    books::{
        dto::{BookCreate, BookPatch},
        repo,
        repo_types::Book,
    },
    error::AppError,
    pagination::{Page, Pagination},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/books", get(list_books))
        .route("/books/:id", get(get_book))
        .route("/books/isbn/:isbn", get(get_book_by_isbn))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/books", axum::routing::post(create_book))
        .route(
            "/books/:id",
            axum::routing::put(update_book).delete(delete_book),
        )
}

fn book_not_found() -> AppError {
    AppError::not_found("Book not found")
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create_book(
    State(state): State<AppState>,
    ActiveUser(user): ActiveUser,
    Json(body): Json<BookCreate>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    body.validate()?;
    if let Some(isbn) = body.isbn.as_deref() {
        if repo::get_by_isbn(&state.db, isbn).await?.is_some() {
            return Err(AppError::Conflict("ISBN already exists".into()));
        }
    }
    let book = repo::insert(&state.db, &body).await?;
    info!(book_id = %book.id, "book created");
    Ok((StatusCode::CREATED, Json(book)))
}

#[instrument(skip(state))]
pub async fn list_books(
    State(state): State<AppState>,
    Query(p): Query<Pagination>,
) -> Result<Json<Page<Book>>, AppError> {
    let p = p.validate()?;
    let (items, total) = repo::list(&state.db, p.skip, p.limit).await?;
    Ok(Json(Page::new(items, total, p)))
}

#[instrument(skip(state))]
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Book>, AppError> {
    repo::get(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(book_not_found)
}

#[instrument(skip(state))]
pub async fn get_book_by_isbn(
    State(state): State<AppState>,
    Path(isbn): Path<String>,
) -> Result<Json<Book>, AppError> {
    repo::get_by_isbn(&state.db, &isbn)
        .await?
        .map(Json)
        .ok_or_else(book_not_found)
}

#[instrument(skip(state, user, patch), fields(user_id = %user.id))]
pub async fn update_book(
    State(state): State<AppState>,
    ActiveUser(user): ActiveUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<BookPatch>,
) -> Result<Json<Book>, AppError> {
    patch.validate()?;
    let mut book = repo::get(&state.db, id).await?.ok_or_else(book_not_found)?;

    if let Some(isbn) = patch.new_isbn() {
        if let Some(other) = repo::get_by_isbn(&state.db, isbn).await? {
            if other.id != id {
                return Err(AppError::Conflict("ISBN already exists".into()));
            }
        }
    }

    patch.apply(&mut book);
    let book = repo::update(&state.db, &book).await?;
    info!(book_id = %book.id, "book updated");
    Ok(Json(book))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_book(
    State(state): State<AppState>,
    ActiveUser(user): ActiveUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !repo::delete(&state.db, id).await? {
        return Err(book_not_found());
    }
    info!(book_id = %id, "book deleted");
    Ok(Json(json!({ "message": "Book deleted successfully" })))
}
