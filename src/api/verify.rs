use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::{Extension, Json};

use crate::errors::AppError;
use crate::middleware::access_gate::AuthorizedApp;
use crate::models::submission::GatedVerifyRequest;
use crate::proxy::handler::verification_response;
use crate::AppState;

/// POST /v1/verify-tin
///
/// Machine clients have no session, so every call acquires its own registry
/// token before the single validation request.
pub async fn verify_tin(
    State(state): State<Arc<AppState>>,
    Extension(app): Extension<AuthorizedApp>,
    payload: Result<Json<GatedVerifyRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(req) = payload?;
    let (kind, tin) = req.validate()?;

    let token = match state.jtb.request_token().await {
        Some(token) => token,
        None => {
            tracing::error!(app = %app.app_name, "no JTB token for gated verification");
            return Err(AppError::UpstreamTokenUnavailable);
        }
    };

    tracing::info!(app_id = app.id, app = %app.app_name, kind = kind.as_str(), "verifying TIN");
    let reply = state.jtb.verify_tin(kind, &tin, &token).await?;
    verification_response(&reply.body)
}
