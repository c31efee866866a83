//! Server-side portal sessions.
//!
//! The browser only holds an opaque id in the `sbir_session` cookie. Session
//! records, including the upstream token slot, live in Redis when it is
//! configured so every instance reads the same copy. Without Redis they live
//! in a process-local `DashMap`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderValue};
use cookie::{Cookie, SameSite};
use dashmap::DashMap;
use rand::RngCore;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::upstream_token::TokenCache;
use crate::AppState;

pub const COOKIE_NAME: &str = "sbir_session";

/// Everything the portal remembers about a logged-in staff member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub upstream: TokenCache,
}

#[derive(Clone)]
pub(crate) struct SessionEntry {
    value: String,
    pub(crate) expires_at: Instant,
}

/// Session store backed by Redis, or by an in-memory DashMap when no Redis
/// is configured.
///
/// With Redis every read goes to Redis, so a logout or token refresh on one
/// instance is seen by all of them. Local entries honour the session TTL and
/// are evicted lazily on read or by `evict_expired()` from the sweep job.
#[derive(Clone)]
pub struct SessionStore {
    pub(crate) local: Arc<DashMap<String, SessionEntry>>,
    redis: Option<ConnectionManager>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_secs: u64, redis: Option<ConnectionManager>) -> Self {
        Self {
            local: Arc::new(DashMap::new()),
            redis,
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    /// Local tier only.
    pub fn in_memory(ttl_secs: u64) -> Self {
        Self::new(ttl_secs, None)
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs()
    }

    /// Persists a new session and returns its id.
    pub async fn create(&self, data: &SessionData) -> anyhow::Result<String> {
        let id = new_session_id();
        self.save(&id, data).await?;
        Ok(id)
    }

    pub async fn load(&self, id: &str) -> Option<SessionData> {
        let Some(mut conn) = self.redis.clone() else {
            return self.load_local(id);
        };
        match conn.get::<_, Option<String>>(redis_key(id)).await {
            Ok(Some(v)) => serde_json::from_str(&v).ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("session lookup in redis failed: {}", e);
                None
            }
        }
    }

    fn load_local(&self, id: &str) -> Option<SessionData> {
        let entry = self.local.get(id)?;
        if Instant::now() < entry.expires_at {
            return serde_json::from_str(&entry.value).ok();
        }
        // expired: drop the ref before removing
        drop(entry);
        self.local.remove(id);
        None
    }

    /// Writes the session and restarts its lifetime.
    pub async fn save(&self, id: &str, data: &SessionData) -> anyhow::Result<()> {
        let json = serde_json::to_string(data)?;
        match self.redis.clone() {
            Some(mut conn) => {
                conn.set_ex::<_, _, ()>(redis_key(id), json, self.ttl.as_secs())
                    .await?;
            }
            None => {
                self.local.insert(
                    id.to_string(),
                    SessionEntry {
                        value: json,
                        expires_at: Instant::now() + self.ttl,
                    },
                );
            }
        }
        Ok(())
    }

    pub async fn destroy(&self, id: &str) {
        match self.redis.clone() {
            Some(mut conn) => {
                if let Err(e) = conn.del::<_, ()>(redis_key(id)).await {
                    tracing::warn!("failed to delete session from redis: {}", e);
                }
            }
            None => {
                self.local.remove(id);
            }
        }
    }

    /// Remove all locally-expired sessions. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut evicted = 0;
        self.local.retain(|_, entry| {
            let keep = entry.expires_at > now;
            if !keep {
                evicted += 1;
            }
            keep
        });
        evicted
    }

    pub fn local_len(&self) -> usize {
        self.local.len()
    }
}

fn redis_key(id: &str) -> String {
    format!("sbir:session:{}", id)
}

/// 256 random bits, hex encoded.
pub fn new_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Reads the session id from the `Cookie` header, ignoring malformed ids.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|id| id.len() == 64 && id.chars().all(|c| c.is_ascii_hexdigit()))
}

fn build_cookie(value: &str, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, value.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(cookie::time::Duration::seconds(max_age_secs))
        .build()
}

fn to_header(cookie: &Cookie<'_>) -> HeaderValue {
    // name, hex id and attributes are all visible ASCII
    HeaderValue::from_str(&cookie.to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("sbir_session=; Path=/; Max-Age=0"))
}

/// `Set-Cookie` value carrying a freshly issued session id.
pub fn session_cookie(id: &str, max_age_secs: u64, secure: bool) -> HeaderValue {
    let max_age = i64::try_from(max_age_secs).unwrap_or(i64::MAX);
    to_header(&build_cookie(id, max_age, secure))
}

/// `Set-Cookie` value that makes the browser drop the session cookie.
pub fn clear_cookie() -> HeaderValue {
    to_header(&build_cookie("", 0, false))
}

/// The authenticated staff session of the current request.
#[derive(Debug, Clone)]
pub struct StaffSession {
    pub id: String,
    pub data: SessionData,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for StaffSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let id = session_id_from_headers(&parts.headers).ok_or(AppError::Unauthenticated)?;
        let data = state
            .sessions
            .load(&id)
            .await
            .ok_or(AppError::Unauthenticated)?;
        Ok(StaffSession { id, data })
    }
}
