use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    books::{dto::BookCreate, repo_types::Book},
    db::StoreError,
};

const BOOK_COLUMNS: &str =
    "id, title, author, description, isbn, price, publication_date, created_at, updated_at";

pub async fn insert(db: &PgPool, new: &BookCreate) -> Result<Book, StoreError> {
    sqlx::query_as::<_, Book>(&format!(
        r#"
        INSERT INTO books (title, author, description, isbn, price, publication_date)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {BOOK_COLUMNS}
        "#
    ))
    .bind(&new.title)
    .bind(&new.author)
    .bind(&new.description)
    .bind(&new.isbn)
    .bind(new.price)
    .bind(new.publication_date)
    .fetch_one(db)
    .await
    .map_err(StoreError::from_sqlx)
}

pub async fn get(db: &PgPool, id: Uuid) -> Result<Option<Book>, StoreError> {
    sqlx::query_as::<_, Book>(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
        .map_err(StoreError::from_sqlx)
}

pub async fn get_by_isbn(db: &PgPool, isbn: &str) -> Result<Option<Book>, StoreError> {
    sqlx::query_as::<_, Book>(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE isbn = $1"))
        .bind(isbn)
        .fetch_optional(db)
        .await
        .map_err(StoreError::from_sqlx)
}

pub async fn list(db: &PgPool, skip: i64, limit: i64) -> Result<(Vec<Book>, i64), StoreError> {
    let rows = sqlx::query_as::<_, Book>(&format!(
        "SELECT {BOOK_COLUMNS} FROM books ORDER BY created_at, id LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind(skip)
    .fetch_all(db)
    .await
    .map_err(StoreError::from_sqlx)?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
        .fetch_one(db)
        .await
        .map_err(StoreError::from_sqlx)?;
    Ok((rows, total))
}

pub async fn update(db: &PgPool, book: &Book) -> Result<Book, StoreError> {
    sqlx::query_as::<_, Book>(&format!(
        r#"
        UPDATE books
        SET title = $2, author = $3, description = $4, isbn = $5, price = $6,
            publication_date = $7, updated_at = now()
        WHERE id = $1
        RETURNING {BOOK_COLUMNS}
        "#
    ))
    .bind(book.id)
    .bind(&book.title)
    .bind(&book.author)
    .bind(&book.description)
    .bind(&book.isbn)
    .bind(book.price)
    .bind(book.publication_date)
    .fetch_one(db)
    .await
    .map_err(StoreError::from_sqlx)
}

/// `false` when no row matched.
pub async fn delete(db: &PgPool, id: Uuid) -> Result<bool, StoreError> {
    let res = sqlx::query("DELETE FROM books WHERE id = $1")
        .bind(id)
        .execute(db)
        .await
        .map_err(StoreError::from_sqlx)?;
    Ok(res.rows_affected() > 0)
}
