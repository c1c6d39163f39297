use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Publication state of an article.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl PublishStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStatus::Draft => "draft",
            PublishStatus::Published => "published",
            PublishStatus::Archived => "archived",
        }
    }
}

impl FromStr for PublishStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PublishStatus::Draft),
            "published" => Ok(PublishStatus::Published),
            "archived" => Ok(PublishStatus::Archived),
            other => anyhow::bail!("unknown publish status {other:?}"),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ArticleRow {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub content: String,
    pub summary: Option<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub published: String,
    pub reading_time: Option<i32>,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub content: String,
    pub summary: Option<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub published: PublishStatus,
    pub reading_time: Option<i32>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl TryFrom<ArticleRow> for Article {
    type Error = anyhow::Error;

    fn try_from(r: ArticleRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            title: r.title,
            author: r.author,
            content: r.content,
            summary: r.summary,
            category: r.category,
            tags: r.tags,
            published: r.published.parse()?,
            reading_time: r.reading_time,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}
