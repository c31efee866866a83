use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::models::auth_app::{generate_token, AuthAppRequest, NewAuthApp};
use crate::AppState;

/// GET /auth-apps, newest first.
pub async fn list_apps(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let apps = state.store.list_auth_apps().await?;
    Ok(Json(json!({
        "success": true,
        "message": "Apps retrieved successfully.",
        "data": apps,
    })))
}

/// POST /auth-apps: registers an app and issues its token.
pub async fn create_app(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AuthAppRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(req) = payload?;
    let fields = req.validate()?;

    let app = state
        .store
        .insert_auth_app(&NewAuthApp {
            app_name: fields.app_name,
            token: generate_token(),
            whitelisted_ips: fields.whitelisted_ips,
            description: fields.description,
        })
        .await?;
    tracing::info!(app_id = app.id, app = %app.app_name, "auth app created");

    let body = Json(json!({
        "success": true,
        "message": "Token generated successfully.",
        "data": app,
    }));
    Ok((StatusCode::CREATED, body).into_response())
}

/// PUT /auth-apps/:id. The token is never rotated here.
pub async fn update_app(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<AuthAppRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let id = app_id(id)?;
    let Json(req) = payload?;
    let update = req.validate()?;

    let app = state
        .store
        .update_auth_app(id, &update)
        .await?
        .ok_or(AppError::NotFound("App"))?;
    tracing::info!(app_id = app.id, "auth app updated");

    Ok(Json(json!({
        "success": true,
        "message": "App updated successfully.",
        "data": app,
    })))
}

/// DELETE /auth-apps/:id
pub async fn delete_app(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let id = app_id(id)?;
    if !state.store.delete_auth_app(id).await? {
        return Err(AppError::NotFound("App"));
    }
    tracing::info!(app_id = id, "auth app deleted");

    Ok(Json(json!({
        "success": true,
        "message": "App deleted successfully.",
    })))
}

/// PATCH /auth-apps/:id/toggle-status
pub async fn toggle_status(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let id = app_id(id)?;
    let status = state
        .store
        .toggle_auth_app_status(id)
        .await?
        .ok_or(AppError::NotFound("App"))?;
    tracing::info!(app_id = id, active = status, "auth app status toggled");

    Ok(Json(json!({
        "success": true,
        "message": "App status updated.",
        "data": {"id": id, "status": status},
    })))
}

// Non-numeric ids cannot name an app.
fn app_id(id: Result<Path<i64>, PathRejection>) -> Result<i64, AppError> {
    id.map(|Path(id)| id).map_err(|_| AppError::NotFound("App"))
}
