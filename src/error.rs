use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Error taxonomy shared by every handler and service.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or out-of-range input.
    #[error("{0}")]
    Validation(String),

    /// Duplicate email, username, provider identity or ISBN.
    #[error("{0}")]
    Conflict(String),

    /// Bad credentials, missing/invalid/expired token or inactive account.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but lacking the required role.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Identity provider exchange or user-info failure.
    #[error("{0}")]
    UpstreamAuth(String),

    /// Missing or invalid process configuration.
    #[error("{0}")]
    Configuration(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Debug, Serialize)]
struct ErrorDetail<'a> {
    kind: &'a str,
    message: String,
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::Conflict(_) => "conflict_error",
            AppError::Unauthorized(_) => "unauthorized_error",
            AppError::Forbidden(_) => "forbidden_error",
            AppError::NotFound(_) => "not_found_error",
            AppError::UpstreamAuth(_) => "upstream_auth_error",
            AppError::Configuration(_) => "configuration_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::UpstreamAuth(_) => StatusCode::BAD_GATEWAY,
            AppError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to the caller. Internal chains stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Internal(e) => error!(error = %format!("{e:#}"), "internal error"),
            AppError::Configuration(msg) => error!(%msg, "configuration error"),
            AppError::UpstreamAuth(msg) => warn!(%msg, "identity provider error"),
            AppError::Conflict(msg) => warn!(%msg, "conflict"),
            AppError::Unauthorized(msg) | AppError::Forbidden(msg) => {
                info!(%msg, kind = self.kind(), "authorization error")
            }
            AppError::Validation(msg) | AppError::NotFound(msg) => debug!(%msg, "client error"),
        }

        let status = self.status_code();
        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.kind(),
                message: self.user_message(),
            },
        };
        let mut res = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            res.headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        res
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_hide_their_chain() {
        let err = AppError::Internal(anyhow::anyhow!("connection refused on 10.0.0.4"));
        assert_eq!(err.user_message(), "Internal server error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unauthorized_response_carries_bearer_challenge() {
        let res = AppError::unauthorized("Could not validate credentials").into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
    }

    #[test]
    fn kinds_map_to_statuses() {
        assert_eq!(AppError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::UpstreamAuth("x".into()).kind(), "upstream_auth_error");
        assert_eq!(
            AppError::Configuration("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
