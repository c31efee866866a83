//! SBIR Portal: staff dashboard backend and token-gated API in front of the
//! JTB tax registry.
//!
//! The binary in `main.rs` wires configuration and storage; everything else
//! lives here so integration tests in `tests/` can drive the real router.

use std::sync::Arc;

use axum::http::{HeaderName, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod proxy;
pub mod session;
pub mod store;

use proxy::upstream::JtbClient;
use session::SessionStore;
use store::PortalStore;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub store: Arc<dyn PortalStore>,
    pub sessions: SessionStore,
    pub jtb: JtbClient,
    pub config: config::Config,
}

/// The complete HTTP surface with its cross-cutting layers.
pub fn app_router(state: Arc<AppState>) -> Router {
    let dashboard_origin = state.config.dashboard_origin.clone();
    let allow_local = !state.config.production;
    Router::new()
        .route("/healthz", axum::routing::get(|| async { "ok" }))
        .route("/readyz", axum::routing::get(readiness_check))
        .merge(api::router(state.clone()))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors(dashboard_origin, allow_local))
        .layer(axum::middleware::from_fn(middleware::headers::request_id))
        .layer(axum::middleware::from_fn(middleware::headers::security_headers))
}

async fn readiness_check() -> &'static str {
    "ok"
}

// The dashboard authenticates with a cookie, so origins must be explicit.
// Local dev servers are only admitted outside production.
fn cors(dashboard_origin: String, allow_local: bool) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            origin_str == dashboard_origin || (allow_local && is_local_origin(origin_str))
        }))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
            HeaderName::from_static("x-request-id"),
        ])
        .allow_credentials(true)
}

fn is_local_origin(origin: &str) -> bool {
    origin.starts_with("http://localhost:") || origin.starts_with("http://127.0.0.1:")
}
