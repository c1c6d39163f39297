use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    books::repo_types::Book,
    error::AppError,
    validation::{check_len, check_max_len},
};

#[derive(Debug, Deserialize)]
pub struct BookCreate {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub publication_date: Option<OffsetDateTime>,
}

fn check_price(price: Option<f64>) -> Result<(), AppError> {
    match price {
        Some(p) if !p.is_finite() || p < 0.0 => Err(AppError::validation("price must be >= 0")),
        _ => Ok(()),
    }
}

impl BookCreate {
    pub fn validate(&self) -> Result<(), AppError> {
        check_len("title", &self.title, 1, 200)?;
        check_len("author", &self.author, 1, 100)?;
        check_max_len("isbn", self.isbn.as_deref(), 20)?;
        check_price(self.price)
    }
}

/// Partial update. `None` leaves a field alone; for nullable fields
/// `Some(None)` clears it.
#[derive(Debug, Default, Deserialize)]
pub struct BookPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub isbn: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub price: Option<Option<f64>>,
    #[serde(default, deserialize_with = "publication_date_patch")]
    pub publication_date: Option<Option<OffsetDateTime>>,
}

fn publication_date_patch<'de, D>(d: D) -> Result<Option<Option<OffsetDateTime>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    time::serde::rfc3339::option::deserialize(d).map(Some)
}

impl BookPatch {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(title) = &self.title {
            check_len("title", title, 1, 200)?;
        }
        if let Some(author) = &self.author {
            check_len("author", author, 1, 100)?;
        }
        if let Some(isbn) = &self.isbn {
            check_max_len("isbn", isbn.as_deref(), 20)?;
        }
        if let Some(price) = self.price {
            check_price(price)?;
        }
        Ok(())
    }

    /// ISBN this patch would set, if any.
    pub fn new_isbn(&self) -> Option<&str> {
        self.isbn.as_ref().and_then(|i| i.as_deref())
    }

    pub fn apply(self, book: &mut Book) {
        if let Some(title) = self.title {
            book.title = title;
        }
        if let Some(author) = self.author {
            book.author = author;
        }
        if let Some(description) = self.description {
            book.description = description;
        }
        if let Some(isbn) = self.isbn {
            book.isbn = isbn;
        }
        if let Some(price) = self.price {
            book.price = price;
        }
        if let Some(publication_date) = self.publication_date {
            book.publication_date = publication_date;
        }
    }
}
