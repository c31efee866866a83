//! AuthApp admin CRUD behind the staff session.

mod common;

use axum::http::{Method, StatusCode};
use chrono::Duration;
use serde_json::json;

use common::{gated_request, harness, json_request, Harness};

async fn staff_cookie(h: &Harness) -> String {
    h.session_cookie(Some(Duration::minutes(1))).await.1
}

#[tokio::test]
async fn test_requires_staff_session() {
    let h = harness().await;
    let (status, _, body) = h
        .send(json_request(Method::GET, "/auth-apps", None, None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthenticated.");

    let (status, _, _) = h
        .send(json_request(
            Method::POST,
            "/auth-apps",
            Some("sbir_session=0000"),
            Some(json!({"app_name": "x", "whitelisted_ips": "10.0.0.1"})),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_issues_token_and_parses_csv_ips() {
    let h = harness().await;
    let cookie = staff_cookie(&h).await;

    let (status, _, body) = h
        .send(json_request(
            Method::POST,
            "/auth-apps",
            Some(&cookie),
            Some(json!({
                "app_name": "Payroll",
                "whitelisted_ips": "10.0.0.1, 10.0.0.2, 10.0.0.1",
                "description": "monthly checks"
            })),
        ))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Token generated successfully.");
    let data = &body["data"];
    assert_eq!(data["token"].as_str().unwrap().len(), 64);
    assert_eq!(data["whitelisted_ips"], json!(["10.0.0.1", "10.0.0.2"]));
    assert_eq!(data["status"], true);
    assert_eq!(data["request_count"], 0);
}

#[tokio::test]
async fn test_mapped_ipv6_whitelist_entry_admits_ipv4_caller() {
    let h = harness().await;
    let cookie = staff_cookie(&h).await;

    let (status, _, body) = h
        .send(json_request(
            Method::POST,
            "/auth-apps",
            Some(&cookie),
            Some(json!({"app_name": "Dual stack", "whitelisted_ips": "::ffff:10.0.0.7"})),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["whitelisted_ips"], json!(["10.0.0.7"]));
    let token = body["data"]["token"].as_str().unwrap().to_string();

    // Past the gate, the empty body fails validation instead of the IP check.
    let (status, _, resp) = h
        .send(gated_request(Some(&token), [10, 0, 0, 7], json!({})))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(resp["errors"]["tin"][0], "The tin field is required.");
}

#[tokio::test]
async fn test_create_validates_fields() {
    let h = harness().await;
    let cookie = staff_cookie(&h).await;

    let (status, _, body) = h
        .send(json_request(
            Method::POST,
            "/auth-apps",
            Some(&cookie),
            Some(json!({"whitelisted_ips": ["10.0.0.1", "not-an-ip"]})),
        ))
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["app_name"][0], "The app_name field is required.");
    assert_eq!(
        body["errors"]["whitelisted_ips"][0],
        "'not-an-ip' is not a valid IP address."
    );
}

#[tokio::test]
async fn test_update_toggle_delete_cycle() {
    let h = harness().await;
    let cookie = staff_cookie(&h).await;

    let (_, _, created) = h
        .send(json_request(
            Method::POST,
            "/auth-apps",
            Some(&cookie),
            Some(json!({"app_name": "Payroll", "whitelisted_ips": ["10.0.0.1"]})),
        ))
        .await;
    let id = created["data"]["id"].as_i64().unwrap();
    let token = created["data"]["token"].clone();

    let (status, _, body) = h
        .send(json_request(
            Method::PUT,
            &format!("/auth-apps/{}", id),
            Some(&cookie),
            Some(json!({"app_name": "Payroll v2", "whitelisted_ips": ["10.0.0.9"]})),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "App updated successfully.");
    assert_eq!(body["data"]["app_name"], "Payroll v2");
    assert_eq!(body["data"]["token"], token);

    let (status, _, body) = h
        .send(json_request(
            Method::PATCH,
            &format!("/auth-apps/{}/toggle-status", id),
            Some(&cookie),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "App status updated.");
    assert_eq!(body["data"], json!({"id": id, "status": false}));

    let (status, _, body) = h
        .send(json_request(
            Method::DELETE,
            &format!("/auth-apps/{}", id),
            Some(&cookie),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "App deleted successfully.");

    let (status, _, body) = h
        .send(json_request(
            Method::DELETE,
            &format!("/auth-apps/{}", id),
            Some(&cookie),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "App not found.");
}

#[tokio::test]
async fn test_unknown_and_malformed_ids_are_404() {
    let h = harness().await;
    let cookie = staff_cookie(&h).await;

    for uri in ["/auth-apps/999/toggle-status", "/auth-apps/abc/toggle-status"] {
        let (status, _, body) = h
            .send(json_request(Method::PATCH, uri, Some(&cookie), None))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["message"], "App not found.");
    }
}

#[tokio::test]
async fn test_list_is_newest_first() {
    let h = harness().await;
    let cookie = staff_cookie(&h).await;

    for name in ["first", "second"] {
        h.send(json_request(
            Method::POST,
            "/auth-apps",
            Some(&cookie),
            Some(json!({"app_name": name, "whitelisted_ips": "10.0.0.1"})),
        ))
        .await;
    }

    let (status, _, body) = h
        .send(json_request(Method::GET, "/auth-apps", Some(&cookie), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["app_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["second", "first"]);
}
