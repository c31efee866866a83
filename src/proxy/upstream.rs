//! HTTP client for the JTB tax registry.
//! Single attempt per call; every call shares the configured timeout.
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::config::JtbConfig;
use crate::models::submission::{AssetSubmission, TaxRecordSubmission};
use crate::models::taxpayer::TaxpayerKind;
use crate::models::upstream_token::mask;
use crate::proxy::dates::DateStyle;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid response from registry (HTTP {status}): {reason}")]
    Decode { status: u16, reason: String },
}

/// Status and JSON body exactly as the registry returned them.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub body: Value,
}

pub struct JtbClient {
    client: reqwest::Client,
    base_url: String,
    tin_base_url: String,
    email: String,
    password: String,
    client_name: String,
}

impl JtbClient {
    pub fn new(cfg: &JtbConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .connect_timeout(Duration::from_secs(cfg.timeout_secs.min(5)))
            .build()?;

        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            tin_base_url: cfg.tin_base_url.trim_end_matches('/').to_string(),
            email: cfg.email.clone(),
            password: cfg.password.clone(),
            client_name: cfg.client_name.clone(),
        })
    }

    /// Fetches a fresh registry token. Every failure mode yields `None`.
    pub async fn request_token(&self) -> Option<String> {
        let url = format!("{}/GetTokenID", self.base_url);
        tracing::info!(url = %url, client = %self.client_name, "JTB token request initiated");

        let resp = match self
            .client
            .post(&url)
            .json(&json!({
                "email": self.email,
                "password": self.password,
                "clientname": self.client_name,
            }))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::error!("JTB token request failed: {}", e);
                return None;
            }
        };

        let status = resp.status();
        let body: Value = match resp.json().await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(status = status.as_u16(), "JTB token response unreadable: {}", e);
                return None;
            }
        };

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), body = %body, "JTB token request rejected");
            return None;
        }

        match token_from_reply(&body) {
            Some(token) => {
                tracing::info!(token = %mask(&token), "JTB token received");
                Some(token)
            }
            None => {
                tracing::error!(body = %body, "failed to get valid token from JTB");
                None
            }
        }
    }

    pub async fn list_taxpayers(
        &self,
        kind: TaxpayerKind,
        token: &str,
        from: chrono::NaiveDate,
        to: chrono::NaiveDate,
    ) -> Result<UpstreamReply, UpstreamError> {
        let path = match kind {
            TaxpayerKind::Individual => "SBIR/Individual",
            TaxpayerKind::NonIndividual => "SBIR/NonIndividual",
        };
        let body = json!({
            "fromdate": DateStyle::Dashed.format(from),
            "todate": DateStyle::Dashed.format(to),
        });
        tracing::debug!(kind = kind.as_str(), body = %body, "listing taxpayers");

        let req = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .query(&[("tokenid", token)])
            .json(&body);
        send(req).await
    }

    pub async fn submit_tax_record(
        &self,
        record: &TaxRecordSubmission,
        token: &str,
    ) -> Result<UpstreamReply, UpstreamError> {
        self.post_json("SBIR/AddTaxRecord", token, record.to_upstream_body())
            .await
    }

    pub async fn submit_asset(
        &self,
        asset: &AssetSubmission,
        token: &str,
    ) -> Result<UpstreamReply, UpstreamError> {
        self.post_json("SBIR/AddAssetDetails", token, asset.to_upstream_body())
            .await
    }

    pub async fn verify_tin(
        &self,
        kind: TaxpayerKind,
        tin: &str,
        token: &str,
    ) -> Result<UpstreamReply, UpstreamError> {
        let path = match kind {
            TaxpayerKind::Individual => "individualtinvalidation",
            TaxpayerKind::NonIndividual => "nonindividualtinvalidation",
        };
        tracing::debug!(kind = kind.as_str(), "verifying TIN");

        let req = self
            .client
            .post(format!("{}/{}", self.tin_base_url, path))
            .query(&[("tokenid", token)])
            .form(&[("tin", tin)]);
        send(req).await
    }

    async fn post_json(
        &self,
        path: &str,
        token: &str,
        body: Map<String, Value>,
    ) -> Result<UpstreamReply, UpstreamError> {
        let req = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .query(&[("tokenid", token)])
            .json(&body);
        send(req).await
    }
}

async fn send(req: reqwest::RequestBuilder) -> Result<UpstreamReply, UpstreamError> {
    let resp = req.send().await?;
    let status = resp.status();
    let bytes = resp.bytes().await?;
    let body = serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Decode {
        status: status.as_u16(),
        reason: e.to_string(),
    })?;
    Ok(UpstreamReply { status, body })
}

/// `success` must be `"true"` (or `true`) and `tokenId`/`tokenid` non-empty.
fn token_from_reply(body: &Value) -> Option<String> {
    let ok = match body.get("success") {
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        Some(Value::Bool(b)) => *b,
        _ => false,
    };
    if !ok {
        return None;
    }
    body.get("tokenId")
        .or_else(|| body.get("tokenid"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
}
