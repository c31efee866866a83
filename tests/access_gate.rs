//! Access Gate on `POST /v1/verify-tin`: token and IP checks, counters, and
//! the per-request registry token.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use portal::models::auth_app::{generate_token, AuthApp, NewAuthApp};
use portal::store::PortalStore;

use common::{gated_request, harness, harness_with, Harness};

async fn register(h: &Harness, ips: &[&str]) -> AuthApp {
    h.store
        .insert_auth_app(&NewAuthApp {
            app_name: "payroll".into(),
            token: generate_token(),
            whitelisted_ips: ips.iter().map(|ip| ip.to_string()).collect(),
            description: None,
        })
        .await
        .unwrap()
}

async fn mock_verified(h: &Harness) {
    h.mock_token(json!({"success": "true", "tokenId": "fresh-token"}))
        .await;
    Mock::given(method("POST"))
        .and(path("/individualtinvalidation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ResponseCode": "001",
            "Taxpayer": {"tin": "123", "first_name": "A"}
        })))
        .mount(&h.jtb)
        .await;
}

fn body() -> serde_json::Value {
    json!({"tin": "123", "type": "individual"})
}

mod token_checks {
    use super::*;

    #[tokio::test]
    async fn test_missing_header_is_401() {
        let h = harness().await;
        let (status, _, resp) = h.send(gated_request(None, [10, 0, 0, 1], body())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(resp["success"], false);
    }

    #[tokio::test]
    async fn test_unknown_token_is_401() {
        let h = harness().await;
        let (status, _, resp) = h
            .send(gated_request(Some("nope"), [10, 0, 0, 1], body()))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(resp["message"], "Invalid or inactive token.");
    }

    #[tokio::test]
    async fn test_inactive_app_is_401_and_counters_untouched() {
        let h = harness().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&h.jtb)
            .await;

        let app = register(&h, &["10.0.0.1"]).await;
        h.store.toggle_auth_app_status(app.id).await.unwrap();

        let (status, _, _) = h
            .send(gated_request(Some(&app.token), [10, 0, 0, 1], body()))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let after = h.store.get_auth_app(app.id).await.unwrap().unwrap();
        assert_eq!(after.request_count, 0);
        assert!(after.last_accessed_at.is_none());
    }
}

mod ip_checks {
    use super::*;

    #[tokio::test]
    async fn test_whitelist_rejects_and_accepts() {
        let h = harness().await;
        mock_verified(&h).await;
        let app = register(&h, &["10.0.0.1", "10.0.0.2"]).await;

        let (status, _, resp) = h
            .send(gated_request(Some(&app.token), [10, 0, 0, 3], body()))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(resp["message"], "Your IP address is not whitelisted.");
        let after = h.store.get_auth_app(app.id).await.unwrap().unwrap();
        assert_eq!(after.request_count, 0);

        let (status, _, resp) = h
            .send(gated_request(Some(&app.token), [10, 0, 0, 1], body()))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["data"]["first_name"], "A");
    }

    #[tokio::test]
    async fn test_forwarded_for_honoured_behind_trusted_proxy() {
        let h = harness_with(&[("SBIR_TRUST_PROXY", "true")]).await;
        mock_verified(&h).await;
        let app = register(&h, &["10.0.0.2"]).await;

        let mut req = gated_request(Some(&app.token), [127, 0, 0, 1], body());
        req.headers_mut()
            .insert("x-forwarded-for", "10.0.0.2, 172.16.0.9".parse().unwrap());
        let (status, _, _) = h.send(req).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_forwarded_for_ignored_by_default() {
        let h = harness().await;
        let app = register(&h, &["10.0.0.2"]).await;

        let mut req = gated_request(Some(&app.token), [127, 0, 0, 1], body());
        req.headers_mut()
            .insert("x-forwarded-for", "10.0.0.2".parse().unwrap());
        let (status, _, _) = h.send(req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}

mod pass_through {
    use super::*;

    #[tokio::test]
    async fn test_pass_counts_once_and_stamps_access() {
        let h = harness().await;
        mock_verified(&h).await;
        let app = register(&h, &["10.0.0.1"]).await;

        let (status, _, _) = h
            .send(gated_request(Some(&app.token), [10, 0, 0, 1], body()))
            .await;
        assert_eq!(status, StatusCode::OK);

        let after = h.store.get_auth_app(app.id).await.unwrap().unwrap();
        assert_eq!(after.request_count, app.request_count + 1);
        assert!(after.last_accessed_at.is_some());
    }

    #[tokio::test]
    async fn test_counted_even_when_handler_fails() {
        let h = harness().await;
        h.mock_token(json!({"success": "true", "tokenId": "fresh-token"}))
            .await;
        Mock::given(method("POST"))
            .and(path("/nonindividualtinvalidation"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ResponseCode": "004",
                "ResponseDescription": "TIN not found"
            })))
            .mount(&h.jtb)
            .await;
        let app = register(&h, &["10.0.0.1"]).await;

        let (status, _, resp) = h
            .send(gated_request(
                Some(&app.token),
                [10, 0, 0, 1],
                json!({"tin": "9", "type": "non-individual"}),
            ))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(resp["message"], "TIN not found");

        let after = h.store.get_auth_app(app.id).await.unwrap().unwrap();
        assert_eq!(after.request_count, 1);
    }

    #[tokio::test]
    async fn test_invalid_body_is_422_after_counting() {
        let h = harness().await;
        let app = register(&h, &["10.0.0.1"]).await;

        let (status, _, resp) = h
            .send(gated_request(
                Some(&app.token),
                [10, 0, 0, 1],
                json!({"tin": "9", "type": "company"}),
            ))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(resp["errors"]["type"][0], "The selected type is invalid.");

        let after = h.store.get_auth_app(app.id).await.unwrap().unwrap();
        assert_eq!(after.request_count, 1);
    }

    #[tokio::test]
    async fn test_registry_token_failure_is_401() {
        let h = harness().await;
        h.mock_token(json!({"success": "false", "message": "bad credentials"}))
            .await;
        let app = register(&h, &["10.0.0.1"]).await;

        let (status, _, resp) = h
            .send(gated_request(Some(&app.token), [10, 0, 0, 1], body()))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(resp["message"], "Failed to generate JTB token. Try again later.");
    }
}
