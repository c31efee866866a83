use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A short-lived credential issued by the JTB registry.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpstreamToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl UpstreamToken {
    pub fn issued_at(value: String, now: DateTime<Utc>, ttl_secs: u64) -> Self {
        let ttl = Duration::seconds(ttl_secs.min(u64::from(u32::MAX)) as i64);
        Self {
            value,
            expires_at: now + ttl,
        }
    }

    /// Expiry exactly equal to `now` is already invalid.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl std::fmt::Debug for UpstreamToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamToken")
            .field("value", &mask(&self.value))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// The single upstream token slot carried by a portal session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenCache {
    token: Option<UpstreamToken>,
}

impl TokenCache {
    pub fn store(&mut self, value: String, ttl_secs: u64) {
        self.store_at(value, Utc::now(), ttl_secs);
    }

    pub fn store_at(&mut self, value: String, now: DateTime<Utc>, ttl_secs: u64) {
        self.token = Some(UpstreamToken::issued_at(value, now, ttl_secs));
    }

    pub fn get(&self) -> Option<&UpstreamToken> {
        self.token.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.token.as_ref().is_some_and(|t| t.is_valid_at(now))
    }

    /// Token value, only while still valid.
    pub fn valid_value_at(&self, now: DateTime<Utc>) -> Option<&str> {
        self.token
            .as_ref()
            .filter(|t| t.is_valid_at(now))
            .map(|t| t.value.as_str())
    }

    pub fn clear(&mut self) {
        self.token = None;
    }
}

/// `abcd…wxyz` for logs; short values are fully hidden.
pub fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}…{}", head, tail)
    } else {
        "****".to_string()
    }
}
