//! Shared harness: the real router over the in-memory store, the local
//! session tier, and a wiremock stand-in for the JTB registry.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::Value;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use portal::config;
use portal::models::upstream_token::TokenCache;
use portal::models::user::{hash_password, NewStaffUser};
use portal::proxy::upstream::JtbClient;
use portal::session::{SessionData, SessionStore, COOKIE_NAME};
use portal::store::memory::MemoryStore;
use portal::store::PortalStore;
use portal::AppState;

pub const ADMIN_EMAIL: &str = "admin@jtb.oyostate.gov.ng";
pub const ADMIN_PASSWORD: &str = "correct-horse";

pub struct Harness {
    pub app: Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub jtb: MockServer,
}

pub async fn harness() -> Harness {
    harness_with(&[]).await
}

/// Extra `(key, value)` pairs override the config defaults.
pub async fn harness_with(extra: &[(&str, &str)]) -> Harness {
    let jtb = MockServer::start().await;
    let mut vars: Vec<(String, String)> = vec![
        ("JTB_BASE_URL".into(), jtb.uri()),
        ("JTB_EMAIL".into(), "svc@jtb.oyostate.gov.ng".into()),
        ("JTB_PASSWORD".into(), "svc-secret".into()),
        ("JTB_TIMEOUT_SECS".into(), "2".into()),
    ];
    vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));

    let cfg = config::from_lookup(|key| {
        vars.iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    })
    .unwrap();

    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(AppState {
        store: store.clone(),
        sessions: SessionStore::in_memory(cfg.session_ttl_secs),
        jtb: JtbClient::new(&cfg.jtb).unwrap(),
        config: cfg,
    });

    Harness {
        app: portal::app_router(state.clone()),
        state,
        store,
        jtb,
    }
}

impl Harness {
    pub async fn seed_staff(&self, email: &str, password: &str) -> i64 {
        self.store
            .upsert_user(&NewStaffUser {
                name: "Staff".into(),
                email: email.into(),
                password_hash: hash_password(password).unwrap(),
            })
            .await
            .unwrap()
    }

    /// A logged-in session. `token_age` is how long ago the upstream token
    /// was issued; `None` leaves the slot empty.
    pub async fn session_cookie(&self, token_age: Option<Duration>) -> (String, String) {
        let mut upstream = TokenCache::default();
        if let Some(age) = token_age {
            upstream.store_at("jtb-session-token".into(), Utc::now() - age, 3540);
        }
        let id = self
            .state
            .sessions
            .create(&SessionData {
                user_id: 1,
                name: "Admin".into(),
                email: ADMIN_EMAIL.into(),
                upstream,
            })
            .await
            .unwrap();
        (id.clone(), format!("{}={}", COOKIE_NAME, id))
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, headers, json)
    }

    pub async fn mock_token(&self, body: Value) {
        Mock::given(method("POST"))
            .and(path("/GetTokenID"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.jtb)
            .await;
    }
}

pub fn json_request(
    verb: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(verb).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let body = match body {
        Some(v) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).unwrap()
}

/// A gated request from `ip` carrying `Authorization: Bearer <token>`.
pub fn gated_request(token: Option<&str>, ip: [u8; 4], body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/v1/verify-tin")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let mut req = builder.body(Body::from(body.to_string())).unwrap();
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((ip, 40123))));
    req
}
