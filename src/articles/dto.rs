use serde::Deserialize;

use crate::{
    articles::repo_types::{Article, PublishStatus},
    error::AppError,
    validation::{check_len, check_max_len},
};

#[derive(Debug, Deserialize)]
pub struct ArticleCreate {
    pub title: String,
    pub author: String,
    pub content: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub published: PublishStatus,
    #[serde(default)]
    pub reading_time: Option<i32>,
}

fn check_reading_time(minutes: Option<i32>) -> Result<(), AppError> {
    match minutes {
        Some(m) if m < 1 => Err(AppError::validation("reading_time must be >= 1")),
        _ => Ok(()),
    }
}

impl ArticleCreate {
    pub fn validate(&self) -> Result<(), AppError> {
        check_len("title", &self.title, 1, 200)?;
        check_len("author", &self.author, 1, 100)?;
        check_len("content", &self.content, 1, usize::MAX)?;
        check_max_len("category", self.category.as_deref(), 50)?;
        check_max_len("tags", self.tags.as_deref(), 500)?;
        check_reading_time(self.reading_time)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ArticlePatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub summary: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub category: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub tags: Option<Option<String>>,
    #[serde(default)]
    pub published: Option<PublishStatus>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub reading_time: Option<Option<i32>>,
}

impl ArticlePatch {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(title) = &self.title {
            check_len("title", title, 1, 200)?;
        }
        if let Some(author) = &self.author {
            check_len("author", author, 1, 100)?;
        }
        if let Some(content) = &self.content {
            check_len("content", content, 1, usize::MAX)?;
        }
        if let Some(category) = &self.category {
            check_max_len("category", category.as_deref(), 50)?;
        }
        if let Some(tags) = &self.tags {
            check_max_len("tags", tags.as_deref(), 500)?;
        }
        if let Some(minutes) = self.reading_time {
            check_reading_time(minutes)?;
        }
        Ok(())
    }

    pub fn apply(self, article: &mut Article) {
        if let Some(title) = self.title {
            article.title = title;
        }
        if let Some(author) = self.author {
            article.author = author;
        }
        if let Some(content) = self.content {
            article.content = content;
        }
        if let Some(summary) = self.summary {
            article.summary = summary;
        }
        if let Some(category) = self.category {
            article.category = category;
        }
        if let Some(tags) = self.tags {
            article.tags = tags;
        }
        if let Some(published) = self.published {
            article.published = published;
        }
        if let Some(reading_time) = self.reading_time {
            article.reading_time = reading_time;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn article() -> Article {
        Article {
            id: Uuid::new_v4(),
            title: "Ownership".into(),
            author: "Ferris".into(),
            content: "Every value has an owner.".into(),
            summary: None,
            category: Some("rust".into()),
            tags: Some("memory,borrowck".into()),
            published: PublishStatus::Draft,
            reading_time: Some(4),
            created_at: OffsetDateTime::now_utc(),
            updated_at: None,
        }
    }

    #[test]
    fn create_defaults_to_draft() {
        let body: ArticleCreate = serde_json::from_str(
            r#"{"title": "Ownership", "author": "Ferris", "content": "..."}"#,
        )
        .unwrap();
        assert_eq!(body.published, PublishStatus::Draft);
        assert!(body.validate().is_ok());
    }

    #[test]
    fn unknown_status_is_rejected_at_parse_time() {
        let res: Result<ArticleCreate, _> = serde_json::from_str(
            r#"{"title": "t", "author": "a", "content": "c", "published": "live"}"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn create_validation_bounds() {
        let body: ArticleCreate = serde_json::from_str(
            r#"{"title": "t", "author": "a", "content": "", "reading_time": 3}"#,
        )
        .unwrap();
        assert!(body.validate().is_err());

        let body: ArticleCreate = serde_json::from_str(
            r#"{"title": "t", "author": "a", "content": "c", "reading_time": 0}"#,
        )
        .unwrap();
        assert!(body.validate().is_err());
    }

    #[test]
    fn patch_merges_deterministically() {
        let patch: ArticlePatch = serde_json::from_str(
            r#"{"published": "published", "category": null, "reading_time": 6}"#,
        )
        .unwrap();
        assert!(patch.validate().is_ok());
        let mut a = article();
        patch.apply(&mut a);
        assert_eq!(a.published, PublishStatus::Published);
        assert_eq!(a.category, None);
        assert_eq!(a.reading_time, Some(6));
        assert_eq!(a.tags.as_deref(), Some("memory,borrowck"));
        assert_eq!(a.title, "Ownership");
    }

    #[test]
    fn status_tags_round_trip() {
        for s in [
            PublishStatus::Draft,
            PublishStatus::Published,
            PublishStatus::Archived,
        ] {
            assert_eq!(s.as_str().parse::<PublishStatus>().unwrap(), s);
        }
    }
}
