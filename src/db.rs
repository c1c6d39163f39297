use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

use crate::error::AppError;

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("connect to database")
}

/// Failure of a storage call, with unique-index violations pulled out.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate {field}")]
    Duplicate { field: &'static str },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Classify a sqlx error, naming the unique index that fired if there is one.
    pub fn from_sqlx(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                let constraint = db_err.constraint().unwrap_or_default();
                return StoreError::Duplicate {
                    field: field_for_constraint(constraint),
                };
            }
        }
        StoreError::Database(e)
    }
}

fn field_for_constraint(constraint: &str) -> &'static str {
    if constraint.contains("email") {
        "email"
    } else if constraint.contains("username") {
        "username"
    } else if constraint.contains("google_id") {
        "provider identity"
    } else if constraint.contains("isbn") {
        "ISBN"
    } else {
        "value"
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate { field: "email" } => {
                AppError::Conflict("Email already registered".into())
            }
            StoreError::Duplicate { field: "username" } => {
                AppError::Conflict("Username already taken".into())
            }
            StoreError::Duplicate { field: "ISBN" } => {
                AppError::Conflict("ISBN already exists".into())
            }
            StoreError::Duplicate { field } => AppError::Conflict(format!("Duplicate {field}")),
            StoreError::Database(e) => AppError::Internal(anyhow::Error::new(e).context("database")),
        }
    }
}
