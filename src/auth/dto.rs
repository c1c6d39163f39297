use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::repo_types::{Provider, User},
    error::AppError,
    validation::check_len,
};

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".into(),
        }
    }
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: Option<String>,
    pub email: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
    pub provider: Provider,
    pub avatar_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            full_name: u.full_name,
            is_active: u.is_active,
            is_superuser: u.is_superuser,
            provider: u.provider,
            avatar_url: u.avatar_url,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Self-service profile changes. An absent field is left alone; an explicit
/// `null` clears it.
#[derive(Debug, Default, Deserialize)]
pub struct UserPatch {
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub username: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub full_name: Option<Option<String>>,
}

impl UserPatch {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(Some(username)) = &self.username {
            check_len("username", username, 1, 50)?;
        }
        if let Some(Some(full_name)) = &self.full_name {
            check_len("full_name", full_name, 0, 100)?;
        }
        Ok(())
    }

    pub fn apply(self, user: &mut User) {
        if let Some(username) = self.username {
            user.username = username;
        }
        if let Some(full_name) = self.full_name {
            user.full_name = full_name;
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorizationUrlResponse {
    pub authorization_url: String,
    pub state: String,
}

/// Query string the identity provider redirects back with.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FederatedAuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: PublicUser,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            username: Some("alice".into()),
            email: "alice@example.com".into(),
            password_hash: Some("$argon2id$v=19$...".into()),
            full_name: Some("Alice".into()),
            is_active: true,
            is_superuser: false,
            provider_subject: None,
            avatar_url: None,
            provider: Provider::Local,
            created_at: OffsetDateTime::now_utc(),
            updated_at: None,
        }
    }

    #[test]
    fn public_user_never_carries_the_hash() {
        let json = serde_json::to_string(&PublicUser::from(user())).unwrap();
        assert!(json.contains("alice@example.com"));
        assert!(json.contains("\"provider\":\"local\""));
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn patch_distinguishes_absent_from_null() {
        let patch: UserPatch = serde_json::from_str(r#"{"full_name": null}"#).unwrap();
        let mut u = user();
        patch.apply(&mut u);
        assert_eq!(u.full_name, None);
        assert_eq!(u.username.as_deref(), Some("alice"));

        let patch: UserPatch = serde_json::from_str(r#"{"username": "al"}"#).unwrap();
        let mut u = user();
        patch.apply(&mut u);
        assert_eq!(u.username.as_deref(), Some("al"));
        assert_eq!(u.full_name.as_deref(), Some("Alice"));
    }

    #[test]
    fn patch_validation_bounds() {
        let patch: UserPatch = serde_json::from_str(r#"{"username": ""}"#).unwrap();
        assert!(patch.validate().is_err());
        let long = "x".repeat(101);
        let patch = UserPatch {
            full_name: Some(Some(long)),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
    }
}
