use serde::Deserialize;

pub const DEFAULT_ADMIN_EMAIL: &str = "admin@jtb.oyostate.gov.ng";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Unset means the in-memory store (local development only).
    pub database_url: Option<String>,
    /// Optional second session tier shared between instances.
    pub redis_url: Option<String>,
    pub jtb: JtbConfig,
    /// Staff account whose login triggers upstream token acquisition.
    pub admin_email: String,
    /// Lifetime of an upstream token once stored in a session. Default: 3540.
    pub upstream_token_ttl_secs: u64,
    /// Lifetime of a portal session. Default: 7200.
    pub session_ttl_secs: u64,
    /// Mark the session cookie `Secure`.
    pub secure_cookies: bool,
    /// Take the caller IP from the first `X-Forwarded-For` hop instead of the socket.
    pub trust_forwarded_for: bool,
    /// Browser origin allowed to call the API with credentials.
    pub dashboard_origin: String,
    /// `SBIR_ENV` (or `RUST_ENV`) is `production`. Local dev origins are refused.
    pub production: bool,
}

/// Connection settings for the external JTB tax registry.
#[derive(Clone, Deserialize)]
pub struct JtbConfig {
    pub base_url: String,
    /// Host of the TIN validation endpoints. Falls back to `base_url`.
    pub tin_base_url: String,
    pub email: String,
    pub password: String,
    pub client_name: String,
    /// Applied to every upstream call. Default: 15.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for JtbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JtbConfig")
            .field("base_url", &self.base_url)
            .field("tin_base_url", &self.tin_base_url)
            .field("email", &self.email)
            .field("password", &"****")
            .field("client_name", &self.client_name)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Config {
    pub fn is_admin(&self, email: &str) -> bool {
        self.admin_email.eq_ignore_ascii_case(email.trim())
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Builds the config from an arbitrary variable source.
pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let flag = |key: &str| {
        var(key)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false)
    };

    let env_mode = var("SBIR_ENV").or_else(|| var("RUST_ENV")).unwrap_or_default();
    let production = env_mode == "production";

    let email = var("JTB_EMAIL").unwrap_or_default();
    let password = var("JTB_PASSWORD").unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        if production {
            anyhow::bail!(
                "JTB_EMAIL and JTB_PASSWORD must be set before running in production."
            );
        }
        eprintln!("⚠️  JTB_EMAIL / JTB_PASSWORD not set; upstream token requests will fail.");
    }

    let base_url = var("JTB_BASE_URL")
        .unwrap_or_else(|| "https://api.jtb.gov.ng:9000/api".into())
        .trim_end_matches('/')
        .to_string();
    let tin_base_url = var("JTB_TIN_BASE_URL")
        .map(|v| v.trim_end_matches('/').to_string())
        .unwrap_or_else(|| base_url.clone());

    Ok(Config {
        port: var("SBIR_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080),
        database_url: var("DATABASE_URL"),
        redis_url: var("REDIS_URL"),
        jtb: JtbConfig {
            base_url,
            tin_base_url,
            email,
            password,
            client_name: var("JTB_CLIENT_NAME").unwrap_or_else(|| "SBIR".into()),
            timeout_secs: var("JTB_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
        },
        admin_email: var("SBIR_ADMIN_EMAIL").unwrap_or_else(|| DEFAULT_ADMIN_EMAIL.into()),
        upstream_token_ttl_secs: var("JTB_TOKEN_TTL_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(3540),
        session_ttl_secs: var("SBIR_SESSION_TTL_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(7200),
        secure_cookies: flag("SBIR_SECURE_COOKIES"),
        trust_forwarded_for: flag("SBIR_TRUST_PROXY"),
        dashboard_origin: var("DASHBOARD_ORIGIN")
            .unwrap_or_else(|| "http://localhost:3000".into()),
        production,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.upstream_token_ttl_secs, 3540);
        assert_eq!(cfg.jtb.timeout_secs, 15);
        assert_eq!(cfg.admin_email, DEFAULT_ADMIN_EMAIL);
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.jtb.tin_base_url, cfg.jtb.base_url);
    }

    #[test]
    fn test_tin_base_falls_back_and_trims() {
        let cfg = from_lookup(lookup(&[
            ("JTB_BASE_URL", "http://jtb.local/api/"),
            ("JTB_TIN_BASE_URL", "http://tin.local/"),
            ("SBIR_TRUST_PROXY", "true"),
        ]))
        .unwrap();
        assert_eq!(cfg.jtb.base_url, "http://jtb.local/api");
        assert_eq!(cfg.jtb.tin_base_url, "http://tin.local");
        assert!(cfg.trust_forwarded_for);
    }

    #[test]
    fn test_production_requires_credentials() {
        assert!(from_lookup(lookup(&[("SBIR_ENV", "production")])).is_err());
        assert!(from_lookup(lookup(&[
            ("SBIR_ENV", "production"),
            ("JTB_EMAIL", "svc@board.gov"),
            ("JTB_PASSWORD", "secret"),
        ]))
        .is_ok());
    }

    #[test]
    fn test_env_mode_sets_production() {
        assert!(!from_lookup(lookup(&[])).unwrap().production);
        let cfg = from_lookup(lookup(&[
            ("RUST_ENV", "production"),
            ("JTB_EMAIL", "svc@board.gov"),
            ("JTB_PASSWORD", "secret"),
        ]))
        .unwrap();
        assert!(cfg.production);
    }

    #[test]
    fn test_admin_match_ignores_case() {
        let cfg = from_lookup(lookup(&[])).unwrap();
        assert!(cfg.is_admin("Admin@JTB.oyostate.gov.ng"));
        assert!(!cfg.is_admin("clerk@jtb.oyostate.gov.ng"));
    }

    #[test]
    fn test_debug_masks_password() {
        let cfg = from_lookup(lookup(&[("JTB_PASSWORD", "hunter2")])).unwrap();
        assert!(!format!("{:?}", cfg).contains("hunter2"));
    }
}
