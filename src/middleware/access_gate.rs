//! Access Gate for machine clients of `/v1/*`.
//!
//! Two gates, in order: an active AuthApp owning the bearer token (401), then
//! the caller IP on that app's whitelist (403). A request that passes both is
//! counted before the handler runs, whatever the handler later returns.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;

use crate::errors::AppError;
use crate::models::auth_app::canonical_ip;
use crate::models::upstream_token::mask;
use crate::AppState;

/// The AuthApp that let the current request through.
#[derive(Debug, Clone)]
pub struct AuthorizedApp {
    pub id: i64,
    pub app_name: String,
}

pub async fn access_gate(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client_ip = client_ip(&req, state.config.trust_forwarded_for);

    let token = bearer_token(req.headers()).ok_or_else(|| {
        tracing::warn!(ip = ?client_ip, path = %req.uri().path(), "access gate: missing bearer token");
        AppError::MissingApiToken
    })?;

    tracing::info!(
        ip = ?client_ip,
        token = %mask(&token),
        method = %req.method(),
        path = %req.uri().path(),
        "incoming API request"
    );

    let app = match state.store.find_active_auth_app(&token).await? {
        Some(app) => app,
        None => {
            tracing::warn!(token = %mask(&token), "access gate: unknown or inactive token");
            return Err(AppError::InvalidApiToken);
        }
    };

    let ip = client_ip.unwrap_or_else(|| "unknown".to_string());
    if !app.allows_ip(&ip) {
        tracing::warn!(app = %app.app_name, ip = %ip, "access gate: IP not whitelisted");
        return Err(AppError::IpNotAllowed(ip));
    }

    state.store.record_auth_app_access(app.id).await?;

    req.extensions_mut().insert(AuthorizedApp {
        id: app.id,
        app_name: app.app_name,
    });
    Ok(next.run(req).await)
}

/// `Authorization: Bearer <token>`; any other shape counts as missing.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
}

/// Canonical textual caller IP. The first `X-Forwarded-For` hop is only
/// honoured behind a trusted proxy.
pub fn client_ip(req: &Request, trust_forwarded_for: bool) -> Option<String> {
    if trust_forwarded_for {
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|hop| hop.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return Some(canonical_ip(ip).to_string());
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| canonical_ip(addr.ip()).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("abc123"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_client_ip_from_socket() {
        let mut req = Request::new(Body::empty());
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 5123))));
        assert_eq!(client_ip(&req, false).as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_forwarded_for_only_when_trusted() {
        let mut req = Request::new(Body::empty());
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 5123))));
        req.headers_mut().insert(
            "x-forwarded-for",
            HeaderValue::from_static("10.0.0.2, 172.16.0.1"),
        );
        assert_eq!(client_ip(&req, false).as_deref(), Some("127.0.0.1"));
        assert_eq!(client_ip(&req, true).as_deref(), Some("10.0.0.2"));
    }

    #[test]
    fn test_mapped_ipv6_is_canonicalised() {
        let ip: IpAddr = "::ffff:10.0.0.1".parse().unwrap();
        assert_eq!(canonical_ip(ip).to_string(), "10.0.0.1");
    }
}
