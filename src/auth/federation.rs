//! OAuth2 authorization-code login: initiate, exchange, provision.

use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthorizationUrlResponse, CallbackParams},
        google::{IdentityProvider, ProviderUserInfo},
        jwt::TokenKeys,
        repo::UserStore,
        repo_types::{NewUser, Provider, User},
    },
    config::GoogleConfig,
    db::StoreError,
    error::AppError,
};

#[derive(Debug, Clone, Copy)]
pub struct FederationPolicy {
    pub link_by_email: bool,
    pub verify_state: bool,
}

impl From<&GoogleConfig> for FederationPolicy {
    fn from(cfg: &GoogleConfig) -> Self {
        Self {
            link_by_email: cfg.link_by_email,
            verify_state: cfg.verify_state,
        }
    }
}

/// Provider error codes are echoed back, but only as a short token.
fn provider_error_code(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .take(64)
        .collect()
}

pub fn begin(
    provider: &dyn IdentityProvider,
    keys: &TokenKeys,
) -> Result<AuthorizationUrlResponse, AppError> {
    let state = keys.issue_state()?;
    let authorization_url = provider.authorization_url(&state);
    Ok(AuthorizationUrlResponse {
        authorization_url,
        state,
    })
}

/// Run the callback leg: returns an access token and the signed-in user.
#[instrument(skip_all)]
pub async fn complete(
    users: &dyn UserStore,
    keys: &TokenKeys,
    provider: &dyn IdentityProvider,
    policy: FederationPolicy,
    params: CallbackParams,
) -> Result<(String, User), AppError> {
    if let Some(err) = params.error.as_deref() {
        let code = provider_error_code(err);
        warn!(provider = %provider.provider(), error = %code, "provider returned an error");
        return Err(AppError::UpstreamAuth(format!(
            "{} authorization failed: {code}",
            provider.provider()
        )));
    }
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::UpstreamAuth("No authorization code provided".into()))?;

    if policy.verify_state {
        let state = params
            .state
            .ok_or_else(|| AppError::unauthorized("Missing OAuth state"))?;
        keys.verify_state(&state)
            .map_err(|_| AppError::unauthorized("Invalid OAuth state"))?;
    }

    let access_token = provider.exchange_code(&code).await?;
    let info = provider.fetch_user_info(&access_token).await?;
    let user = provision(users, provider.provider(), &info, policy).await?;
    let token = keys.issue_access(&user.email)?;
    Ok((token, user))
}

async fn lookup(
    users: &dyn UserStore,
    subject: &str,
    email: &str,
) -> Result<Option<User>, StoreError> {
    if let Some(user) = users.find_by_provider_subject(subject).await? {
        return Ok(Some(user));
    }
    users.find_by_email(email).await
}

/// Find, link or create the account behind a provider identity.
#[instrument(skip(users, info, policy), fields(subject = %info.subject))]
pub async fn provision(
    users: &dyn UserStore,
    provider: Provider,
    info: &ProviderUserInfo,
    policy: FederationPolicy,
) -> Result<User, AppError> {
    let email = info.email.trim().to_lowercase();

    if let Some(user) = lookup(users, &info.subject, &email).await? {
        return link(users, user, provider, info, policy).await;
    }

    let new = NewUser {
        email: email.clone(),
        password_hash: None,
        full_name: info.name.clone(),
        provider_subject: Some(info.subject.clone()),
        avatar_url: info.avatar_url.clone(),
        provider,
    };
    match users.insert(new).await {
        Ok(user) => {
            info!(user_id = %user.id, %provider, "federated user created");
            Ok(user)
        }
        Err(StoreError::Duplicate { field }) => {
            // Lost a race with a concurrent callback for the same identity.
            warn!(field, "federated insert collided, re-reading");
            let user = lookup(users, &info.subject, &email)
                .await?
                .ok_or_else(|| AppError::Conflict(format!("Duplicate {field}")))?;
            link(users, user, provider, info, policy).await
        }
        Err(e) => Err(e.into()),
    }
}

async fn link(
    users: &dyn UserStore,
    mut user: User,
    provider: Provider,
    info: &ProviderUserInfo,
    policy: FederationPolicy,
) -> Result<User, AppError> {
    if user.provider_subject.is_some() {
        return Ok(user);
    }
    if !policy.link_by_email || !info.email_verified {
        warn!(user_id = %user.id, verified = info.email_verified, "refusing to link by email");
        return Err(AppError::Conflict(
            "An account with this email already exists; sign in with your password".into(),
        ));
    }

    user.provider_subject = Some(info.subject.clone());
    user.provider = provider;
    if info.avatar_url.is_some() {
        user.avatar_url = info.avatar_url.clone();
    }
    match users.update(&user).await {
        Ok(user) => {
            info!(user_id = %user.id, %provider, "local account linked to provider identity");
            Ok(user)
        }
        Err(StoreError::Duplicate { .. }) => users
            .find_by_provider_subject(&info.subject)
            .await?
            .ok_or_else(|| AppError::Conflict("Provider identity already linked".into())),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::auth::{
        dto::RegisterRequest,
        google::fake::{google_user, FakeProvider},
        jwt::tests::make_keys,
        repo::memory::MemoryUserStore,
        services,
    };

    const POLICY: FederationPolicy = FederationPolicy {
        link_by_email: true,
        verify_state: true,
    };

    fn callback(keys: &TokenKeys, code: &str) -> CallbackParams {
        CallbackParams {
            code: Some(code.into()),
            state: Some(keys.issue_state().unwrap()),
            error: None,
        }
    }

    #[test]
    fn begin_embeds_a_verifiable_state() {
        let keys = make_keys("dev-secret");
        let provider = FakeProvider::returning(google_user("g-1", "a@example.com"));
        let res = begin(&provider, &keys).unwrap();
        assert!(res.authorization_url.contains(&res.state));
        assert!(keys.verify_state(&res.state).is_ok());
    }

    #[tokio::test]
    async fn first_login_creates_federated_user() {
        let store = MemoryUserStore::default();
        let keys = make_keys("dev-secret");
        let provider = FakeProvider::returning(google_user("g-1", "Carol@Example.com"));

        let (token, user) = complete(&store, &keys, &provider, POLICY, callback(&keys, "c1"))
            .await
            .unwrap();
        assert_eq!(user.email, "carol@example.com");
        assert_eq!(user.provider, Provider::Google);
        assert_eq!(user.provider_subject.as_deref(), Some("g-1"));
        assert_eq!(user.password_hash, None);
        assert!(user.is_active && !user.is_superuser);
        assert_eq!(keys.verify_access(&token).unwrap(), "carol@example.com");
    }

    #[tokio::test]
    async fn repeated_login_reuses_the_same_user() {
        let store = MemoryUserStore::default();
        let keys = make_keys("dev-secret");
        let provider = FakeProvider::returning(google_user("g-1", "carol@example.com"));

        let (_, first) = complete(&store, &keys, &provider, POLICY, callback(&keys, "c1"))
            .await
            .unwrap();
        let (_, second) = complete(&store, &keys, &provider, POLICY, callback(&keys, "c2"))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn email_match_links_existing_local_account() {
        let store = MemoryUserStore::default();
        let keys = make_keys("dev-secret");
        let local = services::register(
            &store,
            RegisterRequest {
                email: "alice@example.com".into(),
                password: "secret1".into(),
                full_name: None,
            },
        )
        .await
        .unwrap();
        let provider = FakeProvider::returning(google_user("g-alice", "alice@example.com"));

        let (_, linked) = complete(&store, &keys, &provider, POLICY, callback(&keys, "c1"))
            .await
            .unwrap();
        assert_eq!(linked.id, local.id);
        assert_eq!(linked.provider_subject.as_deref(), Some("g-alice"));
        assert_eq!(linked.provider, Provider::Google);
        assert!(linked.avatar_url.is_some());
        assert_eq!(linked.password_hash, local.password_hash);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn linking_refused_when_disabled_or_unverified() {
        let store = MemoryUserStore::default();
        let keys = make_keys("dev-secret");
        services::register(
            &store,
            RegisterRequest {
                email: "alice@example.com".into(),
                password: "secret1".into(),
                full_name: None,
            },
        )
        .await
        .unwrap();

        let provider = FakeProvider::returning(google_user("g-alice", "alice@example.com"));
        let no_link = FederationPolicy {
            link_by_email: false,
            ..POLICY
        };
        let err = complete(&store, &keys, &provider, no_link, callback(&keys, "c1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let mut unverified = google_user("g-alice", "alice@example.com");
        unverified.email_verified = false;
        let provider = FakeProvider::returning(unverified);
        let err = complete(&store, &keys, &provider, POLICY, callback(&keys, "c2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let user = store.find_by_email("alice@example.com").await.unwrap().unwrap();
        assert_eq!(user.provider_subject, None);
    }

    #[tokio::test]
    async fn provider_error_short_circuits_before_exchange() {
        let store = MemoryUserStore::default();
        let keys = make_keys("dev-secret");
        let provider = FakeProvider::returning(google_user("g-1", "a@example.com"));
        let params = CallbackParams {
            code: Some("c1".into()),
            state: None,
            error: Some("access_denied<script>".into()),
        };
        let err = complete(&store, &keys, &provider, POLICY, params)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UpstreamAuth(ref m) if m.ends_with("access_deniedscript")));
        assert_eq!(provider.exchanges(), 0);
    }

    #[tokio::test]
    async fn missing_code_is_upstream_error() {
        let store = MemoryUserStore::default();
        let keys = make_keys("dev-secret");
        let provider = FakeProvider::returning(google_user("g-1", "a@example.com"));
        let params = CallbackParams {
            code: None,
            state: Some(keys.issue_state().unwrap()),
            error: None,
        };
        let err = complete(&store, &keys, &provider, POLICY, params)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UpstreamAuth(_)));
    }

    #[tokio::test]
    async fn state_must_be_one_we_issued() {
        let store = MemoryUserStore::default();
        let keys = make_keys("dev-secret");
        let provider = FakeProvider::returning(google_user("g-1", "a@example.com"));

        for state in [None, Some("forged".to_string()), Some(keys.issue_access("a@example.com").unwrap())] {
            let params = CallbackParams {
                code: Some("c1".into()),
                state,
                error: None,
            };
            let err = complete(&store, &keys, &provider, POLICY, params)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Unauthorized(_)));
        }
        assert_eq!(provider.exchanges(), 0);

        let lax = FederationPolicy {
            verify_state: false,
            ..POLICY
        };
        let params = CallbackParams {
            code: Some("c1".into()),
            state: None,
            error: None,
        };
        assert!(complete(&store, &keys, &provider, lax, params).await.is_ok());
    }

    #[tokio::test]
    async fn exchange_and_user_info_failures_propagate() {
        let store = MemoryUserStore::default();
        let keys = make_keys("dev-secret");

        let provider = FakeProvider::returning(google_user("g-1", "a@example.com"));
        let err = complete(&store, &keys, &provider, POLICY, callback(&keys, "bad-code"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UpstreamAuth(_)));

        let provider = FakeProvider::failing("Google user info request failed with status 401");
        let err = complete(&store, &keys, &provider, POLICY, callback(&keys, "c1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UpstreamAuth(_)));
        assert_eq!(store.len(), 0);
    }

    /// Hides existing rows from lookups until an insert collides, like a
    /// concurrent callback committing between our read and our write.
    struct RacingStore {
        inner: MemoryUserStore,
        blind: AtomicBool,
    }

    #[async_trait]
    impl UserStore for RacingStore {
        async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
            self.inner.find_by_id(id).await
        }
        async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
            if self.blind.load(Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.find_by_email(email).await
        }
        async fn find_by_provider_subject(&self, s: &str) -> Result<Option<User>, StoreError> {
            if self.blind.load(Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.find_by_provider_subject(s).await
        }
        async fn insert(&self, new: NewUser) -> Result<User, StoreError> {
            let res = self.inner.insert(new).await;
            if res.is_err() {
                self.blind.store(false, Ordering::SeqCst);
            }
            res
        }
        async fn update(&self, user: &User) -> Result<User, StoreError> {
            self.inner.update(user).await
        }
        async fn list(&self, skip: i64, limit: i64) -> Result<Vec<User>, StoreError> {
            self.inner.list(skip, limit).await
        }
    }

    #[tokio::test]
    async fn duplicate_key_on_insert_resolves_to_the_winner() {
        let store = RacingStore {
            inner: MemoryUserStore::default(),
            blind: AtomicBool::new(false),
        };
        let info = google_user("g-1", "carol@example.com");
        let winner = provision(&store, Provider::Google, &info, POLICY).await.unwrap();

        store.blind.store(true, Ordering::SeqCst);
        let again = provision(&store, Provider::Google, &info, POLICY).await.unwrap();
        assert_eq!(again.id, winner.id);
        assert_eq!(store.inner.len(), 1);
    }
}
