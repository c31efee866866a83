//! Staff login and the session's upstream token.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::{AppError, FieldErrors};
use crate::models::upstream_token::{mask, TokenCache};
use crate::session::{self, SessionData, StaffSession};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl LoginRequest {
    fn validate(self) -> Result<(String, String), AppError> {
        let mut errors = FieldErrors::new();
        let email = self.email.map(|e| e.trim().to_string()).unwrap_or_default();
        let password = self.password.unwrap_or_default();
        if email.is_empty() {
            errors.insert("email".into(), vec!["The email field is required.".into()]);
        }
        if password.is_empty() {
            errors.insert("password".into(), vec!["The password field is required.".into()]);
        }
        if errors.is_empty() {
            Ok((email, password))
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

/// POST /login
///
/// The administrative account also needs a registry token. If the registry
/// refuses one, the login is rejected and no session is created.
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(req) = payload?;
    let (email, password) = req.validate()?;

    let user = match state.store.find_user_by_email(&email).await? {
        Some(user) if user.verify_password(&password) => user,
        _ => {
            tracing::warn!(email = %email, "login rejected: bad credentials");
            return Err(AppError::InvalidCredentials);
        }
    };

    let mut upstream = TokenCache::default();
    if state.config.is_admin(&user.email) {
        tracing::info!(email = %user.email, "admin login, requesting JTB token");
        let token = state
            .jtb
            .request_token()
            .await
            .ok_or(AppError::UpstreamTokenUnavailable)?;
        upstream.store(token, state.config.upstream_token_ttl_secs);
    }

    // A fresh id on every login; any session the browser still carries is dropped.
    if let Some(old) = session::session_id_from_headers(&headers) {
        state.sessions.destroy(&old).await;
    }

    let data = SessionData {
        user_id: user.id,
        name: user.name,
        email: user.email,
        upstream,
    };
    let id = state.sessions.create(&data).await?;
    tracing::info!(user_id = data.user_id, "staff login");

    let cookie = session::session_cookie(
        &id,
        state.sessions.ttl_secs(),
        state.config.secure_cookies,
    );
    let body = Json(json!({
        "success": true,
        "message": "Login successful.",
        "data": profile(&data),
    }));
    Ok(([(header::SET_COOKIE, cookie)], body).into_response())
}

/// POST /logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    session: Option<StaffSession>,
) -> Response {
    if let Some(mut session) = session {
        session.data.upstream.clear();
        state.sessions.destroy(&session.id).await;
        tracing::info!(user_id = session.data.user_id, "staff logout");
    }

    let body = Json(json!({"success": true, "message": "Logged out."}));
    ([(header::SET_COOKIE, session::clear_cookie())], body).into_response()
}

/// GET /me
pub async fn me(session: StaffSession) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": profile(&session.data),
    }))
}

/// GET /jtb/token: requests a new registry token into the current session.
pub async fn refresh_jtb_token(
    State(state): State<Arc<AppState>>,
    mut session: StaffSession,
) -> Result<Json<Value>, AppError> {
    let token = match state.jtb.request_token().await {
        Some(token) => token,
        None => {
            tracing::warn!(user_id = session.data.user_id, "manual JTB token refresh failed");
            return Err(AppError::UpstreamTokenUnavailable);
        }
    };
    tracing::info!(
        user_id = session.data.user_id,
        token = %mask(&token),
        "JTB token stored in session"
    );

    session
        .data
        .upstream
        .store(token, state.config.upstream_token_ttl_secs);
    state.sessions.save(&session.id, &session.data).await?;

    Ok(Json(json!({
        "success": true,
        "message": "JTB token generated successfully.",
        "data": {
            "expires_at": session.data.upstream.get().map(|t| t.expires_at),
        },
    })))
}

fn profile(data: &SessionData) -> Value {
    json!({
        "id": data.user_id,
        "name": data.name,
        "email": data.email,
        "jtb_token": {
            "valid": data.upstream.is_valid(),
            "expires_at": data.upstream.get().map(|t| t.expires_at),
        },
    })
}
