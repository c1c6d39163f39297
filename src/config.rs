use std::net::SocketAddr;

use serde::Deserialize;

use crate::error::AppError;

/// Token lifetime used when `JWT_TTL_MINUTES` is unset.
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 30;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const DEFAULT_GOOGLE_REDIRECT_URI: &str = "http://localhost:8080/api/v1/auth/google/callback";
const DEFAULT_GOOGLE_SCOPES: &str = "openid email profile";
const DEFAULT_GOOGLE_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub http_timeout_secs: u64,
    /// Link a federated login to an existing local account with the same (verified) email.
    pub link_by_email: bool,
    /// Require the callback `state` to be one we minted.
    pub verify_state: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// `APP_HOST:APP_PORT`, defaults `0.0.0.0:8080`.
    pub bind_addr: SocketAddr,
    pub jwt: JwtConfig,
    pub google: Option<GoogleConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok())?)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AppError::Configuration(format!("{key} is not set")))
        };
        let database_url = required("DATABASE_URL")?;

        let host = lookup("APP_HOST").unwrap_or_else(|| DEFAULT_HOST.into());
        let port = lookup("APP_PORT").unwrap_or_else(|| DEFAULT_PORT.to_string());
        let bind_addr = format!("{host}:{port}").parse::<SocketAddr>().map_err(|_| {
            AppError::Configuration(format!("APP_HOST/APP_PORT do not form an address: {host}:{port}"))
        })?;

        let ttl_minutes = match lookup("JWT_TTL_MINUTES") {
            Some(v) => match v.trim().parse::<i64>() {
                Ok(m) if m > 0 => m,
                _ => {
                    return Err(AppError::Configuration(format!(
                        "JWT_TTL_MINUTES is not a positive number: {v}"
                    )))
                }
            },
            None => DEFAULT_TOKEN_TTL_MINUTES,
        };
        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "folio".into()),
            audience: lookup("JWT_AUDIENCE").unwrap_or_else(|| "folio-users".into()),
            ttl_minutes,
        };

        Ok(Self {
            database_url,
            bind_addr,
            jwt,
            google: GoogleConfig::from_lookup(lookup)?,
        })
    }
}

impl GoogleConfig {
    /// `Ok(None)` when neither credential is set: federated login is simply off.
    /// Half a credential pair is a startup error.
    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let (client_id, client_secret) = match (
            non_empty("GOOGLE_CLIENT_ID"),
            non_empty("GOOGLE_CLIENT_SECRET"),
        ) {
            (None, None) => return Ok(None),
            (Some(id), Some(secret)) => (id, secret),
            (Some(_), None) => {
                return Err(AppError::Configuration(
                    "GOOGLE_CLIENT_SECRET is not set while GOOGLE_CLIENT_ID is".into(),
                ))
            }
            (None, Some(_)) => {
                return Err(AppError::Configuration(
                    "GOOGLE_CLIENT_ID is not set while GOOGLE_CLIENT_SECRET is".into(),
                ))
            }
        };

        let scopes = non_empty("GOOGLE_SCOPES")
            .unwrap_or_else(|| DEFAULT_GOOGLE_SCOPES.to_string())
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let http_timeout_secs = match non_empty("GOOGLE_HTTP_TIMEOUT_SECS") {
            Some(v) => v.parse::<u64>().map_err(|_| {
                AppError::Configuration(format!("GOOGLE_HTTP_TIMEOUT_SECS is not a number: {v}"))
            })?,
            None => DEFAULT_GOOGLE_HTTP_TIMEOUT_SECS,
        };

        Ok(Some(Self {
            client_id,
            client_secret,
            redirect_uri: non_empty("GOOGLE_REDIRECT_URI")
                .unwrap_or_else(|| DEFAULT_GOOGLE_REDIRECT_URI.into()),
            scopes,
            auth_url: non_empty("GOOGLE_AUTH_URL").unwrap_or_else(|| GOOGLE_AUTH_URL.into()),
            token_url: non_empty("GOOGLE_TOKEN_URL").unwrap_or_else(|| GOOGLE_TOKEN_URL.into()),
            userinfo_url: non_empty("GOOGLE_USERINFO_URL")
                .unwrap_or_else(|| GOOGLE_USERINFO_URL.into()),
            http_timeout_secs,
            link_by_email: flag(non_empty("GOOGLE_LINK_BY_EMAIL"), true),
            verify_state: flag(non_empty("OAUTH_VERIFY_STATE"), true),
        }))
    }
}

fn flag(value: Option<String>, default: bool) -> bool {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}
