use std::net::IpAddr;

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, FieldErrors};

pub const TOKEN_LEN: usize = 64;

/// A client application allowed to call `POST /v1/verify-tin`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuthApp {
    pub id: i64,
    pub app_name: String,
    pub token: String,
    pub whitelisted_ips: Vec<String>,
    pub request_count: i64,
    pub status: bool,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AuthApp {
    pub fn allows_ip(&self, ip: &str) -> bool {
        self.whitelisted_ips.iter().any(|allowed| allowed == ip)
    }
}

#[derive(Debug, Clone)]
pub struct NewAuthApp {
    pub app_name: String,
    pub token: String,
    pub whitelisted_ips: Vec<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthAppUpdate {
    pub app_name: String,
    pub whitelisted_ips: Vec<String>,
    pub description: Option<String>,
}

/// Accepts `"10.0.0.1, 10.0.0.2"` or `["10.0.0.1", "10.0.0.2"]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IpListInput {
    Csv(String),
    List(Vec<String>),
}

/// Body of the create and update admin calls.
#[derive(Debug, Default, Deserialize)]
pub struct AuthAppRequest {
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub whitelisted_ips: Option<IpListInput>,
    #[serde(default)]
    pub description: Option<String>,
}

impl AuthAppRequest {
    pub fn validate(self) -> Result<AuthAppUpdate, AppError> {
        let mut errors = FieldErrors::new();

        let app_name = self.app_name.map(|s| s.trim().to_string()).unwrap_or_default();
        if app_name.is_empty() {
            errors.insert("app_name".into(), vec!["The app_name field is required.".into()]);
        } else if app_name.chars().count() > 255 {
            errors.insert(
                "app_name".into(),
                vec!["The app_name may not be greater than 255 characters.".into()],
            );
        }

        let whitelisted_ips = match self.whitelisted_ips {
            Some(input) => match parse_ip_list(input) {
                Ok(ips) if !ips.is_empty() => ips,
                Ok(_) => {
                    errors.insert(
                        "whitelisted_ips".into(),
                        vec!["The whitelisted_ips field is required.".into()],
                    );
                    Vec::new()
                }
                Err(bad) => {
                    errors.insert(
                        "whitelisted_ips".into(),
                        vec![format!("'{}' is not a valid IP address.", bad)],
                    );
                    Vec::new()
                }
            },
            None => {
                errors.insert(
                    "whitelisted_ips".into(),
                    vec!["The whitelisted_ips field is required.".into()],
                );
                Vec::new()
            }
        };

        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        Ok(AuthAppUpdate {
            app_name,
            whitelisted_ips,
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
        })
    }
}

/// Canonical textual form, duplicates removed, order kept.
/// Returns the first entry that is not an IP address as the error.
pub fn parse_ip_list(input: IpListInput) -> Result<Vec<String>, String> {
    let raw: Vec<String> = match input {
        IpListInput::Csv(s) => s.split(',').map(String::from).collect(),
        IpListInput::List(v) => v,
    };

    let mut ips: Vec<String> = Vec::new();
    for entry in raw.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let ip: IpAddr = entry.parse().map_err(|_| entry.to_string())?;
        let text = canonical_ip(ip).to_string();
        if !ips.contains(&text) {
            ips.push(text);
        }
    }
    Ok(ips)
}

/// IPv4-mapped IPv6 addresses (dual-stack listeners) compare as plain IPv4.
pub fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    }
}

/// Fresh opaque token: 64 random alphanumeric characters.
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}
