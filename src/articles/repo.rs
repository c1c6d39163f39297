use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    articles::{
        dto::ArticleCreate,
        repo_types::{Article, ArticleRow},
    },
    db::StoreError,
};

const ARTICLE_COLUMNS: &str = "id, title, author, content, summary, category, tags, published, \
     reading_time, created_at, updated_at";

fn into_article(row: ArticleRow) -> Result<Article, StoreError> {
    Article::try_from(row).map_err(|e| StoreError::Database(sqlx::Error::Decode(e.into())))
}

pub async fn insert(db: &PgPool, new: &ArticleCreate) -> Result<Article, StoreError> {
    let row = sqlx::query_as::<_, ArticleRow>(&format!(
        r#"
        INSERT INTO articles (title, author, content, summary, category, tags, published, reading_time)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {ARTICLE_COLUMNS}
        "#
    ))
    .bind(&new.title)
    .bind(&new.author)
    .bind(&new.content)
    .bind(&new.summary)
    .bind(&new.category)
    .bind(&new.tags)
    .bind(new.published.as_str())
    .bind(new.reading_time)
    .fetch_one(db)
    .await
    .map_err(StoreError::from_sqlx)?;
    into_article(row)
}

pub async fn get(db: &PgPool, id: Uuid) -> Result<Option<Article>, StoreError> {
    let row = sqlx::query_as::<_, ArticleRow>(&format!(
        "SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
    .map_err(StoreError::from_sqlx)?;
    row.map(into_article).transpose()
}

pub async fn list(db: &PgPool, skip: i64, limit: i64) -> Result<(Vec<Article>, i64), StoreError> {
    let rows = sqlx::query_as::<_, ArticleRow>(&format!(
        "SELECT {ARTICLE_COLUMNS} FROM articles ORDER BY created_at, id LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind(skip)
    .fetch_all(db)
    .await
    .map_err(StoreError::from_sqlx)?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
        .fetch_one(db)
        .await
        .map_err(StoreError::from_sqlx)?;
    let items = rows
        .into_iter()
        .map(into_article)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((items, total))
}

pub async fn update(db: &PgPool, article: &Article) -> Result<Article, StoreError> {
    let row = sqlx::query_as::<_, ArticleRow>(&format!(
        r#"
        UPDATE articles
        SET title = $2, author = $3, content = $4, summary = $5, category = $6, tags = $7,
            published = $8, reading_time = $9, updated_at = now()
        WHERE id = $1
        RETURNING {ARTICLE_COLUMNS}
        "#
    ))
    .bind(article.id)
    .bind(&article.title)
    .bind(&article.author)
    .bind(&article.content)
    .bind(&article.summary)
    .bind(&article.category)
    .bind(&article.tags)
    .bind(article.published.as_str())
    .bind(article.reading_time)
    .fetch_one(db)
    .await
    .map_err(StoreError::from_sqlx)?;
    into_article(row)
}

pub async fn delete(db: &PgPool, id: Uuid) -> Result<bool, StoreError> {
    let res = sqlx::query("DELETE FROM articles WHERE id = $1")
        .bind(id)
        .execute(db)
        .await
        .map_err(StoreError::from_sqlx)?;
    Ok(res.rows_affected() > 0)
}
