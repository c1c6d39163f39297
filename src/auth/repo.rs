use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::repo_types::{NewUser, User, UserRow},
    db::StoreError,
};

const USER_COLUMNS: &str = "id, username, email, hashed_password, full_name, is_active, \
     is_superuser, google_id, avatar_url, provider, created_at, updated_at";

/// Credential store. Uniqueness of email, username and provider subject is
/// enforced here, not by callers.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_provider_subject(&self, subject: &str) -> Result<Option<User>, StoreError>;
    async fn insert(&self, new: NewUser) -> Result<User, StoreError>;
    /// Persist every mutable column of `user` and stamp `updated_at`.
    async fn update(&self, user: &User) -> Result<User, StoreError>;
    async fn list(&self, skip: i64, limit: i64) -> Result<Vec<User>, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn fetch_one_by(&self, column: &str, value: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {column} = $1"
        ))
        .bind(value)
        .fetch_optional(&self.db)
        .await
        .map_err(StoreError::from_sqlx)?;
        row.map(into_user).transpose()
    }
}

fn into_user(row: UserRow) -> Result<User, StoreError> {
    User::try_from(row).map_err(|e| StoreError::Database(sqlx::Error::Decode(e.into())))
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(StoreError::from_sqlx)?;
        row.map(into_user).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.fetch_one_by("email", email).await
    }

    async fn find_by_provider_subject(&self, subject: &str) -> Result<Option<User>, StoreError> {
        self.fetch_one_by("google_id", subject).await
    }

    async fn insert(&self, new: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (email, hashed_password, full_name, google_id, avatar_url, provider)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.full_name)
        .bind(&new.provider_subject)
        .bind(&new.avatar_url)
        .bind(new.provider.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(StoreError::from_sqlx)?;
        into_user(row)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET username = $2, hashed_password = $3, full_name = $4, is_active = $5,
                is_superuser = $6, google_id = $7, avatar_url = $8, provider = $9,
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.is_active)
        .bind(user.is_superuser)
        .bind(&user.provider_subject)
        .bind(&user.avatar_url)
        .bind(user.provider.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(StoreError::from_sqlx)?;
        into_user(row)
    }

    async fn list(&self, skip: i64, limit: i64) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.db)
        .await
        .map_err(StoreError::from_sqlx)?;
        rows.into_iter().map(into_user).collect()
    }
}

/// In-process store with the same unique constraints as the `users` table.
#[cfg(test)]
pub mod memory {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct MemoryUserStore {
        users: Mutex<Vec<User>>,
    }

    impl MemoryUserStore {
        pub fn len(&self) -> usize {
            self.users.lock().unwrap().len()
        }

        fn check_unique(users: &[User], candidate: &User) -> Result<(), StoreError> {
            for u in users.iter().filter(|u| u.id != candidate.id) {
                if u.email == candidate.email {
                    return Err(StoreError::Duplicate { field: "email" });
                }
                if candidate.username.is_some() && u.username == candidate.username {
                    return Err(StoreError::Duplicate { field: "username" });
                }
                if candidate.provider_subject.is_some()
                    && u.provider_subject == candidate.provider_subject
                {
                    return Err(StoreError::Duplicate {
                        field: "provider identity",
                    });
                }
            }
            Ok(())
        }
    }

    #[async_trait]
    impl UserStore for MemoryUserStore {
        async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
            Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.email == email)
                .cloned())
        }

        async fn find_by_provider_subject(
            &self,
            subject: &str,
        ) -> Result<Option<User>, StoreError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.provider_subject.as_deref() == Some(subject))
                .cloned())
        }

        async fn insert(&self, new: NewUser) -> Result<User, StoreError> {
            let user = User {
                id: Uuid::new_v4(),
                username: None,
                email: new.email,
                password_hash: new.password_hash,
                full_name: new.full_name,
                is_active: true,
                is_superuser: false,
                provider_subject: new.provider_subject,
                avatar_url: new.avatar_url,
                provider: new.provider,
                created_at: OffsetDateTime::now_utc(),
                updated_at: None,
            };
            let mut users = self.users.lock().unwrap();
            Self::check_unique(&users, &user)?;
            users.push(user.clone());
            Ok(user)
        }

        async fn update(&self, user: &User) -> Result<User, StoreError> {
            let mut users = self.users.lock().unwrap();
            Self::check_unique(&users, user)?;
            let slot = users
                .iter_mut()
                .find(|u| u.id == user.id)
                .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;
            *slot = User {
                updated_at: Some(OffsetDateTime::now_utc()),
                ..user.clone()
            };
            Ok(slot.clone())
        }

        async fn list(&self, skip: i64, limit: i64) -> Result<Vec<User>, StoreError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .skip(skip.max(0) as usize)
                .take(limit.max(0) as usize)
                .cloned()
                .collect())
        }
    }
}
