use std::time::Duration;

use async_trait::async_trait;
use oauth2::{
    basic::{BasicClient, BasicErrorResponse},
    reqwest::async_http_client,
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl,
    RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::{auth::repo_types::Provider, config::GoogleConfig, error::AppError};

/// Identity as reported by the provider's user-info endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderUserInfo {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
}

/// An OAuth2 authorization-code identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn provider(&self) -> Provider;

    /// Authorization endpoint URL carrying `state`.
    fn authorization_url(&self, state: &str) -> String;

    /// Trade an authorization code for the provider's access token.
    async fn exchange_code(&self, code: &str) -> Result<String, AppError>;

    async fn fetch_user_info(&self, access_token: &str) -> Result<ProviderUserInfo, AppError>;
}

/// Google's v2 userinfo payload.
#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
    #[serde(default)]
    verified_email: bool,
}

pub struct GoogleProvider {
    oauth: BasicClient,
    http: reqwest::Client,
    userinfo_url: reqwest::Url,
    scopes: Vec<String>,
    timeout: Duration,
}

impl GoogleProvider {
    pub fn new(cfg: &GoogleConfig) -> Result<Self, AppError> {
        let bad = |what: &str, e: &dyn std::fmt::Display| {
            AppError::Configuration(format!("invalid Google {what}: {e}"))
        };
        let auth_url = AuthUrl::new(cfg.auth_url.clone()).map_err(|e| bad("authorization URL", &e))?;
        let token_url = TokenUrl::new(cfg.token_url.clone()).map_err(|e| bad("token URL", &e))?;
        let redirect = RedirectUrl::new(cfg.redirect_uri.clone()).map_err(|e| bad("redirect URI", &e))?;
        let userinfo_url =
            reqwest::Url::parse(&cfg.userinfo_url).map_err(|e| bad("user info URL", &e))?;
        let timeout = Duration::from_secs(cfg.http_timeout_secs);

        let oauth = BasicClient::new(
            ClientId::new(cfg.client_id.clone()),
            Some(ClientSecret::new(cfg.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_redirect_uri(redirect);

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| bad("HTTP client", &e))?;

        Ok(Self {
            oauth,
            http,
            userinfo_url,
            scopes: cfg.scopes.clone(),
            timeout,
        })
    }
}

fn token_error<RE>(e: RequestTokenError<RE, BasicErrorResponse>) -> AppError
where
    RE: std::error::Error + 'static,
{
    match e {
        RequestTokenError::ServerResponse(resp) => {
            warn!(
                error = %resp.error(),
                description = ?resp.error_description(),
                "google rejected the authorization code"
            );
            AppError::UpstreamAuth(format!("Google token exchange failed: {}", resp.error()))
        }
        RequestTokenError::Request(e) => {
            warn!(error = %e, "google token endpoint unreachable");
            AppError::UpstreamAuth("Google token endpoint unreachable".into())
        }
        RequestTokenError::Parse(e, _body) => {
            warn!(error = %e, "google token response did not parse");
            AppError::UpstreamAuth("Google token response lacked an access token".into())
        }
        RequestTokenError::Other(msg) => {
            warn!(%msg, "google token exchange failed");
            AppError::UpstreamAuth("Google token exchange failed".into())
        }
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    fn authorization_url(&self, state: &str) -> String {
        let state = state.to_string();
        let mut req = self.oauth.authorize_url(move || CsrfToken::new(state));
        for scope in &self.scopes {
            req = req.add_scope(Scope::new(scope.clone()));
        }
        let (url, _) = req
            .add_extra_param("access_type", "offline")
            .add_extra_param("include_granted_scopes", "true")
            .url();
        url.to_string()
    }

    #[instrument(skip_all)]
    async fn exchange_code(&self, code: &str) -> Result<String, AppError> {
        let exchange = self
            .oauth
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client);
        let token = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                warn!(timeout = ?self.timeout, "google token exchange timed out");
                AppError::UpstreamAuth("Google token exchange timed out".into())
            })?
            .map_err(token_error)?;

        let access_token = token.access_token().secret().clone();
        if access_token.is_empty() {
            return Err(AppError::UpstreamAuth(
                "Google token response lacked an access token".into(),
            ));
        }
        debug!("google code exchanged");
        Ok(access_token)
    }

    #[instrument(skip_all)]
    async fn fetch_user_info(&self, access_token: &str) -> Result<ProviderUserInfo, AppError> {
        let res = self
            .http
            .get(self.userinfo_url.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "google user info request failed");
                if e.is_timeout() {
                    AppError::UpstreamAuth("Google user info request timed out".into())
                } else {
                    AppError::UpstreamAuth("Google user info endpoint unreachable".into())
                }
            })?;

        let status = res.status();
        if !status.is_success() {
            warn!(%status, "google user info rejected");
            return Err(AppError::UpstreamAuth(format!(
                "Google user info request failed with status {}",
                status.as_u16()
            )));
        }

        let info: GoogleUserInfo = res.json().await.map_err(|e| {
            warn!(error = %e, "google user info did not parse");
            AppError::UpstreamAuth("Google user info response was malformed".into())
        })?;
        let email = info
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AppError::UpstreamAuth("Google did not return an email".into()))?;

        Ok(ProviderUserInfo {
            subject: info.id,
            email,
            name: info.name,
            avatar_url: info.picture,
            email_verified: info.verified_email,
        })
    }
}
