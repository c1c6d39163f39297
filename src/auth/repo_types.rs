use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Where an account's identity comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Local,
    Google,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Local => "local",
            Provider::Google => "google",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Provider::Local),
            "google" => Ok(Provider::Google),
            other => anyhow::bail!("unknown provider tag {other:?}"),
        }
    }
}

/// `users` row as stored.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: Option<String>,
    pub email: String,
    pub hashed_password: Option<String>,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
    pub google_id: Option<String>,
    pub avatar_url: Option<String>,
    pub provider: String,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

/// User record. Never serialized directly; see `PublicUser`.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub username: Option<String>,
    pub email: String,
    pub password_hash: Option<String>,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
    pub provider_subject: Option<String>,
    pub avatar_url: Option<String>,
    pub provider: Provider,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            username: r.username,
            email: r.email,
            password_hash: r.hashed_password,
            full_name: r.full_name,
            is_active: r.is_active,
            is_superuser: r.is_superuser,
            provider_subject: r.google_id,
            avatar_url: r.avatar_url,
            provider: r.provider.parse()?,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Fields for a user that does not exist yet.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: Option<String>,
    pub full_name: Option<String>,
    pub provider_subject: Option<String>,
    pub avatar_url: Option<String>,
    pub provider: Provider,
}

impl NewUser {
    pub fn local(email: String, password_hash: String, full_name: Option<String>) -> Self {
        Self {
            email,
            password_hash: Some(password_hash),
            full_name,
            provider_subject: None,
            avatar_url: None,
            provider: Provider::Local,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_round_trips_through_its_tag() {
        for p in [Provider::Local, Provider::Google] {
            assert_eq!(p.as_str().parse::<Provider>().unwrap(), p);
        }
        assert!("github".parse::<Provider>().is_err());
    }

    #[test]
    fn unknown_provider_in_row_is_rejected() {
        let row = UserRow {
            id: Uuid::new_v4(),
            username: None,
            email: "a@example.com".into(),
            hashed_password: None,
            full_name: None,
            is_active: true,
            is_superuser: false,
            google_id: None,
            avatar_url: None,
            provider: "myspace".into(),
            created_at: OffsetDateTime::now_utc(),
            updated_at: None,
        };
        assert!(User::try_from(row).is_err());
    }
}
