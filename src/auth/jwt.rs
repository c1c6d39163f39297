use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{config::JwtConfig, error::AppError, state::AppState};

/// Lifetime of an anti-forgery state token handed out with an authorization URL.
pub const STATE_TTL: Duration = Duration::minutes(10);

/// What a token may be used for.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    OauthState,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // email, or a nonce for state tokens
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token is invalid")]
    Invalid,
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => AppError::unauthorized("Token has expired"),
            TokenError::Invalid => AppError::unauthorized("Could not validate credentials"),
        }
    }
}

#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
}

impl TokenKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::minutes(cfg.ttl_minutes),
        }
    }

    fn sign(&self, subject: &str, ttl: Duration, kind: TokenKind) -> Result<String, AppError> {
        let now = OffsetDateTime::now_utc();
        let exp = (now + ttl).unix_timestamp().max(0);
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("sign jwt: {e}")))?;
        debug!(kind = ?kind, "jwt signed");
        Ok(token)
    }

    /// Access token for `subject` expiring `ttl` from now.
    pub fn issue(&self, subject: &str, ttl: Duration) -> Result<String, AppError> {
        self.sign(subject, ttl, TokenKind::Access)
    }

    pub fn issue_access(&self, subject: &str) -> Result<String, AppError> {
        self.issue(subject, self.access_ttl)
    }

    pub fn issue_state(&self) -> Result<String, AppError> {
        self.sign(&Uuid::new_v4().to_string(), STATE_TTL, TokenKind::OauthState)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })?;
        // The second named by `exp` is already past validity.
        if data.claims.exp as i64 <= OffsetDateTime::now_utc().unix_timestamp() {
            return Err(TokenError::Expired);
        }
        if data.claims.sub.trim().is_empty() {
            return Err(TokenError::Invalid);
        }
        Ok(data.claims)
    }

    /// Subject of a valid access token.
    pub fn verify_access(&self, token: &str) -> Result<String, TokenError> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Access {
            return Err(TokenError::Invalid);
        }
        Ok(claims.sub)
    }

    pub fn verify_state(&self, state: &str) -> Result<(), TokenError> {
        let claims = self.verify(state)?;
        if claims.kind != TokenKind::OauthState {
            return Err(TokenError::Invalid);
        }
        Ok(())
    }
}

impl FromRef<AppState> for TokenKeys {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}
