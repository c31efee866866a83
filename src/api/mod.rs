use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use crate::errors::AppError;
use crate::middleware::access_gate::access_gate;
use crate::middleware::staff_auth::require_staff;
use crate::proxy::handler;
use crate::AppState;

pub mod auth;
pub mod auth_apps;
pub mod verify;

/// Every portal route. Layers that apply to the whole app are added by
/// `crate::app_router`.
pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Staff dashboard: registry proxy, session token comes from login.
    let jtb = Router::new()
        .route("/jtb/token", get(auth::refresh_jtb_token))
        .route("/jtb/individuals", post(handler::list_individuals))
        .route("/jtb/non-individuals", post(handler::list_non_individuals))
        .route("/jtb/add-tax-record", post(handler::add_tax_record))
        .route("/jtb/submit-asset", post(handler::submit_asset))
        .route(
            "/jtb/verify-individual-tin",
            post(handler::verify_individual_tin),
        )
        .route(
            "/jtb/verify-non-individual-tin",
            post(handler::verify_non_individual_tin),
        );

    // AuthApp registry management
    let admin = Router::new()
        .route(
            "/auth-apps",
            get(auth_apps::list_apps).post(auth_apps::create_app),
        )
        .route(
            "/auth-apps/:id",
            put(auth_apps::update_app).delete(auth_apps::delete_app),
        )
        .route("/auth-apps/:id/toggle-status", patch(auth_apps::toggle_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_staff));

    // Machine clients behind the Access Gate
    let gated = Router::new()
        .route("/v1/verify-tin", post(verify::verify_tin))
        .route_layer(middleware::from_fn_with_state(state, access_gate));

    Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .merge(jtb)
        .merge(admin)
        .merge(gated)
        .fallback(fallback_404)
}

async fn fallback_404() -> AppError {
    AppError::NotFound("Route")
}
