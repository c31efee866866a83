use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::proxy::upstream::UpstreamError;
use crate::session;

/// Field name → human readable messages, serialized under `errors`.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("session expired")]
    SessionExpired,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("upstream token unavailable")]
    UpstreamTokenUnavailable,

    #[error("missing api token")]
    MissingApiToken,

    #[error("invalid or inactive api token")]
    InvalidApiToken,

    #[error("ip {0} not whitelisted")]
    IpNotAllowed(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("no record found: {0}")]
    NoRecord(String),

    #[error("verification failed: {0}")]
    VerificationFailed(String),

    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn field(name: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(name.to_string(), vec![message.into()]);
        AppError::Validation(errors)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::field("body", rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            AppError::Validation(errors) => {
                let body = Json(json!({
                    "success": false,
                    "message": "Validation failed",
                    "errors": errors,
                }));
                return (StatusCode::UNPROCESSABLE_ENTITY, body).into_response();
            }
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "Unauthenticated.".to_string(),
            ),
            AppError::SessionExpired => (
                StatusCode::UNAUTHORIZED,
                "Session expired. Please log in again.".to_string(),
            ),
            AppError::InvalidCredentials => {
                let mut errors = FieldErrors::new();
                errors.insert(
                    "email".into(),
                    vec!["These credentials do not match our records.".into()],
                );
                return AppError::Validation(errors).into_response();
            }
            AppError::UpstreamTokenUnavailable => (
                StatusCode::UNAUTHORIZED,
                "Failed to generate JTB token. Try again later.".to_string(),
            ),
            AppError::MissingApiToken => (
                StatusCode::UNAUTHORIZED,
                "Authorization token missing or invalid.".to_string(),
            ),
            AppError::InvalidApiToken => (
                StatusCode::UNAUTHORIZED,
                "Invalid or inactive token.".to_string(),
            ),
            AppError::IpNotAllowed(_) => (
                StatusCode::FORBIDDEN,
                "Your IP address is not whitelisted.".to_string(),
            ),
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found.", what)),
            AppError::NoRecord(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::VerificationFailed(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            // Upstream and internal failures surface their message to the caller.
            AppError::Upstream(e) => {
                tracing::warn!("upstream call failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("An error occurred: {}", e),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("An error occurred: {}", e),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("An error occurred: {}", e),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "message": msg,
        }));

        let mut response = (status, body).into_response();

        // The browser must drop a session that no longer exists server-side.
        if matches!(self, AppError::SessionExpired) {
            response
                .headers_mut()
                .insert(header::SET_COOKIE, session::clear_cookie());
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_envelope() {
        let resp = AppError::field("tin", "The tin field is required.").into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(resp).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["errors"]["tin"][0], "The tin field is required.");
    }

    #[tokio::test]
    async fn test_session_expired_clears_cookie() {
        let resp = AppError::SessionExpired.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let cookie = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_internal_message_is_surfaced() {
        let resp = AppError::Internal(anyhow::anyhow!("disk on fire")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert_eq!(json["message"], "An error occurred: disk on fire");
    }

    #[tokio::test]
    async fn test_gate_statuses() {
        assert_eq!(
            AppError::MissingApiToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::IpNotAllowed("10.0.0.3".into()).into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::NoRecord("no record".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
    }
}
