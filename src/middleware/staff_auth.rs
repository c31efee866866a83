use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::errors::AppError;
use crate::session::session_id_from_headers;
use crate::AppState;

/// Middleware: the AuthApp admin routes require a logged-in staff session.
pub async fn require_staff(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let id = session_id_from_headers(req.headers()).ok_or_else(|| {
        tracing::warn!(path = %req.uri().path(), "admin API: no session cookie");
        AppError::Unauthenticated
    })?;

    if state.sessions.load(&id).await.is_none() {
        tracing::warn!(path = %req.uri().path(), "admin API: unknown or expired session");
        return Err(AppError::Unauthenticated);
    }

    Ok(next.run(req).await)
}
