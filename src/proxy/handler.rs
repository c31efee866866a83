//! Session-scoped registry endpoints behind the staff dashboard.
//!
//! Every handler runs the same pipeline: validate the body, require a live
//! upstream token in the session, make one registry call, shape the reply.
//! A missing or expired token ends the session before anything leaves the
//! process.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::errors::AppError;
use crate::models::submission::{
    AssetSubmission, ListTaxpayersRequest, TaxRecordSubmission, VerifyTinRequest,
};
use crate::models::taxpayer::{TaxpayerKind, TinOutcome};
use crate::proxy::upstream::UpstreamReply;
use crate::session::StaffSession;
use crate::AppState;

pub async fn list_individuals(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    payload: Result<Json<ListTaxpayersRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    list_taxpayers(&state, &session, TaxpayerKind::Individual, payload).await
}

pub async fn list_non_individuals(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    payload: Result<Json<ListTaxpayersRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    list_taxpayers(&state, &session, TaxpayerKind::NonIndividual, payload).await
}

async fn list_taxpayers(
    state: &AppState,
    session: &StaffSession,
    kind: TaxpayerKind,
    payload: Result<Json<ListTaxpayersRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(req) = payload?;
    let (from, to) = req.validate()?;
    let token = require_upstream_token(state, session).await?;

    let reply = state.jtb.list_taxpayers(kind, &token, from, to).await?;
    Ok(forward(kind.as_str(), reply))
}

pub async fn add_tax_record(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = payload?;
    let record = TaxRecordSubmission::from_json(body)?;
    let token = require_upstream_token(&state, &session).await?;

    let reply = state.jtb.submit_tax_record(&record, &token).await?;
    Ok(forward("add-tax-record", reply))
}

pub async fn submit_asset(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = payload?;
    let asset = AssetSubmission::from_json(body)?;
    let token = require_upstream_token(&state, &session).await?;

    let reply = state.jtb.submit_asset(&asset, &token).await?;
    Ok(forward("submit-asset", reply))
}

pub async fn verify_individual_tin(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    payload: Result<Json<VerifyTinRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    verify_tin(&state, &session, TaxpayerKind::Individual, payload).await
}

pub async fn verify_non_individual_tin(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    payload: Result<Json<VerifyTinRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    verify_tin(&state, &session, TaxpayerKind::NonIndividual, payload).await
}

async fn verify_tin(
    state: &AppState,
    session: &StaffSession,
    kind: TaxpayerKind,
    payload: Result<Json<VerifyTinRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(req) = payload?;
    let tin = req.validate()?;
    let token = require_upstream_token(state, session).await?;

    let reply = state.jtb.verify_tin(kind, &tin, &token).await?;
    verification_response(&reply.body)
}

/// Returns the session's upstream token, or ends the session.
async fn require_upstream_token(
    state: &AppState,
    session: &StaffSession,
) -> Result<String, AppError> {
    if let Some(token) = session.data.upstream.valid_value_at(Utc::now()) {
        return Ok(token.to_string());
    }

    tracing::warn!(
        user = %session.data.email,
        "JTB token missing or expired, ending session"
    );
    state.sessions.destroy(&session.id).await;
    Err(AppError::SessionExpired)
}

/// Lists and submissions hand the registry's status and body back untouched.
fn forward(action: &str, reply: UpstreamReply) -> Response {
    if !reply.status.is_success() {
        tracing::warn!(
            action,
            status = reply.status.as_u16(),
            body = %reply.body,
            "registry returned non-success status"
        );
    }
    let status = StatusCode::from_u16(reply.status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    (status, Json(reply.body)).into_response()
}

/// Maps a TIN validation reply to 200 / 404 / 400.
pub(crate) fn verification_response(body: &Value) -> Result<Response, AppError> {
    match TinOutcome::from_upstream(body) {
        TinOutcome::Verified(profile) => Ok(Json(json!({
            "success": true,
            "message": "TIN verified successfully.",
            "data": profile,
        }))
        .into_response()),
        TinOutcome::NoRecord(message) => Err(AppError::NoRecord(message)),
        TinOutcome::Failed(message) => Err(AppError::VerificationFailed(message)),
    }
}
