mod common;

use common::*;
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
async fn registration_lifecycle() {
    let server = start_server(test_config()).await;

    // Metadata without redirect URIs is rejected.
    let resp = server
        .http
        .post(server.url("/register"))
        .json(&json!({ "client_name": "No Redirects" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "invalid_client_metadata");

    let resp = server
        .http
        .post(server.url("/register"))
        .json(&json!({
            "client_name": "Registered App",
            "redirect_uris": ["https://registered.example.com/cb"],
            "grant_types": ["authorization_code", "refresh_token"],
            "scope": "openid profile"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(resp.headers()["cache-control"], "no-store");
    let registered: Value = resp.json().await.unwrap();

    let client_id = registered["client_id"].as_str().unwrap().to_string();
    let rat = registered["registration_access_token"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(registered["client_secret"].is_string());
    assert_eq!(registered["client_secret_expires_at"], 0);
    assert_eq!(registered["token_endpoint_auth_method"], "client_secret_basic");
    assert_eq!(
        registered["registration_client_uri"],
        format!("{}/register/{client_id}", server.base)
    );

    // Read back; secrets are not repeated.
    let config_uri = server.url(&format!("/register/{client_id}"));
    let resp = server
        .http
        .get(&config_uri)
        .bearer_auth(&rat)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let read: Value = resp.json().await.unwrap();
    assert_eq!(read["client_name"], "Registered App");
    assert!(read.get("client_secret").is_none());
    assert!(read.get("registration_access_token").is_none());

    // A wrong registration access token is rejected.
    let resp = server
        .http
        .get(&config_uri)
        .bearer_auth("not-the-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Update replaces the metadata.
    let resp = server
        .http
        .put(&config_uri)
        .bearer_auth(&rat)
        .json(&json!({
            "client_id": client_id,
            "client_name": "Renamed App",
            "redirect_uris": ["https://registered.example.com/cb2"]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["client_name"], "Renamed App");
    assert_eq!(updated["redirect_uris"], json!(["https://registered.example.com/cb2"]));

    // Delete, then the configuration endpoint no longer knows the client.
    let resp = server
        .http
        .delete(&config_uri)
        .bearer_auth(&rat)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = server
        .http
        .get(&config_uri)
        .bearer_auth(&rat)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    server.stop().await;
}

#[tokio::test]
async fn initial_access_token_is_single_use() {
    let mut cfg = test_config();
    cfg.idp.registration.require_initial_access_token = true;
    cfg.initial_access_tokens = vec!["iat-secret".into()];
    let server = start_server(cfg).await;

    let metadata = json!({ "redirect_uris": ["https://registered.example.com/cb"] });

    let resp = server
        .http
        .post(server.url("/register"))
        .json(&metadata)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "invalid_token");

    let resp = server
        .http
        .post(server.url("/register"))
        .bearer_auth("iat-secret")
        .json(&metadata)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = server
        .http
        .post(server.url("/register"))
        .bearer_auth("iat-secret")
        .json(&metadata)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    server.stop().await;
}

#[tokio::test]
async fn registration_can_be_disabled() {
    let mut cfg = test_config();
    cfg.idp.registration.enabled = false;
    let server = start_server(cfg).await;

    let resp = server
        .http
        .post(server.url("/register"))
        .json(&json!({ "redirect_uris": ["https://registered.example.com/cb"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let metadata: Value = server
        .http
        .get(server.url("/.well-known/openid-configuration"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(metadata.get("registration_endpoint").is_none());

    server.stop().await;
}

#[tokio::test]
async fn registered_client_without_scope_can_request_profile() {
    let server = start_server(test_config()).await;

    let registered: Value = server
        .http
        .post(server.url("/register"))
        .json(&json!({ "redirect_uris": ["https://rp.example.com/cb"] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let client_id = registered["client_id"].as_str().unwrap().to_string();
    let scope = registered["scope"].as_str().unwrap();
    assert!(scope.split_whitespace().any(|s| s == "profile"));

    let (_, challenge) = pkce_pair();
    let (callback, _) = login_and_consent(
        &server,
        &[
            ("response_type", "code"),
            ("client_id", client_id.as_str()),
            ("redirect_uri", "https://rp.example.com/cb"),
            ("scope", "openid profile"),
            ("state", "s"),
            ("code_challenge", challenge.as_str()),
            ("code_challenge_method", "S256"),
        ],
    )
    .await;
    assert_eq!(callback.host_str(), Some("rp.example.com"));
    assert!(query_param(&callback, "error").is_none());
    assert!(query_param(&callback, "code").is_some());
    assert_eq!(query_param(&callback, "state").as_deref(), Some("s"));

    server.stop().await;
}
