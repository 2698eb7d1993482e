#![allow(dead_code)]

use std::net::Ipv4Addr;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use octofhir_idp_server::config::{AppConfig, StaticClient, StaticUser};
use octofhir_idp_server::ServerBuilder;
use octofhir_idp::types::{ApplicationType, GrantType, ResponseType};
use reqwest::header::{COOKIE, LOCATION, SET_COOKIE};
use reqwest::{Response, StatusCode, redirect};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use url::Url;

pub const REDIRECT_URI: &str = "https://app.example.com/callback";
pub const CLIENT_ID: &str = "web-app";
pub const CLIENT_SECRET: &str = "web-app-secret";
pub const SPA_CLIENT_ID: &str = "spa";
pub const USERNAME: &str = "alice";
pub const PASSWORD: &str = "wonderland";

pub struct TestServer {
    pub base: String,
    pub http: reqwest::Client,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.await;
    }
}

/// Default test configuration: one confidential code-flow client, one public
/// implicit client, and one user.
pub fn test_config() -> AppConfig {
    AppConfig {
        clients: vec![
            StaticClient {
                client_id: CLIENT_ID.into(),
                client_secret: Some(CLIENT_SECRET.into()),
                client_name: Some("Web App".into()),
                redirect_uris: vec![REDIRECT_URI.into()],
                grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
                response_types: vec![ResponseType::Code],
                scope: "openid profile email offline_access".into(),
                token_endpoint_auth_method: None,
                application_type: ApplicationType::Web,
            },
            StaticClient {
                client_id: SPA_CLIENT_ID.into(),
                client_secret: None,
                client_name: Some("Single Page App".into()),
                redirect_uris: vec![REDIRECT_URI.into()],
                grant_types: vec![GrantType::Implicit],
                response_types: vec![ResponseType::IdToken, ResponseType::TokenIdToken],
                scope: "openid profile".into(),
                token_endpoint_auth_method: None,
                application_type: ApplicationType::Web,
            },
        ],
        users: vec![StaticUser {
            id: Some("user-1".into()),
            username: USERNAME.into(),
            password: PASSWORD.into(),
            name: Some("Alice Liddell".into()),
            given_name: Some("Alice".into()),
            family_name: Some("Liddell".into()),
            picture: None,
            email: Some("alice@example.com".into()),
            email_verified: true,
        }],
        ..Default::default()
    }
}

/// Binds an ephemeral port, points the issuer at it, and serves `cfg`.
pub async fn start_server(mut cfg: AppConfig) -> TestServer {
    let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    cfg.idp.issuer = format!("http://{addr}");
    cfg.idp.cookies.secure = false;
    cfg.idp.signing.key_size_bits = 1024;

    let server = ServerBuilder::new()
        .with_config(cfg)
        .build()
        .await
        .expect("build server");

    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        let _ = server
            .serve(listener, async move {
                let _ = rx.await;
            })
            .await;
    });

    let http = reqwest::Client::builder()
        .redirect(redirect::Policy::none())
        .build()
        .expect("http client");

    TestServer {
        base: format!("http://{addr}"),
        http,
        shutdown: tx,
        handle,
    }
}

/// Resolves the `Location` header of a redirect against `base`.
pub fn location(resp: &Response, base: &str) -> Url {
    assert!(
        resp.status().is_redirection(),
        "expected redirect, got {}",
        resp.status()
    );
    let raw = resp
        .headers()
        .get(LOCATION)
        .expect("location header")
        .to_str()
        .unwrap();
    Url::parse(base).unwrap().join(raw).unwrap()
}

pub fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

pub fn fragment_param(url: &Url, name: &str) -> Option<String> {
    url::form_urlencoded::parse(url.fragment().unwrap_or_default().as_bytes())
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

pub fn pkce_pair() -> (String, String) {
    let verifier = format!("pkce-verifier-{}", "x".repeat(40));
    let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
    (verifier, challenge)
}

/// Decodes the payload of a compact JWS without verifying it.
pub fn jwt_claims(token: &str) -> Value {
    let payload = token.split('.').nth(1).expect("jwt payload");
    serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap()
}

pub fn jwt_header(token: &str) -> Value {
    let header = token.split('.').next().expect("jwt header");
    serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header).unwrap()).unwrap()
}

/// Drives `/authorize` through login and consent, returning the final
/// redirect to the client and the browser session cookie.
pub async fn login_and_consent(server: &TestServer, params: &[(&str, &str)]) -> (Url, String) {
    let resp = server
        .http
        .get(server.url("/authorize"))
        .query(params)
        .send()
        .await
        .unwrap();
    let login = location(&resp, &server.url("/authorize"));
    assert_eq!(login.path(), "/login");
    let session_id = query_param(&login, "session_id").expect("session_id");

    let page = server.http.get(login.as_str()).send().await.unwrap();
    assert_eq!(page.status(), StatusCode::OK);
    assert!(page.text().await.unwrap().contains("name=\"password\""));

    let resp = server
        .http
        .post(server.url("/login"))
        .form(&[
            ("session_id", session_id.as_str()),
            ("username", USERNAME),
            ("password", PASSWORD),
        ])
        .send()
        .await
        .unwrap();
    let cookie = session_cookie(&resp);
    let consent = location(&resp, &server.url("/login"));
    assert_eq!(consent.path(), "/consent");

    let page = server
        .http
        .get(consent.as_str())
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(page.status(), StatusCode::OK);
    assert!(page.text().await.unwrap().contains("value=\"approve\""));

    let resp = server
        .http
        .post(server.url("/consent"))
        .header(COOKIE, &cookie)
        .form(&[("session_id", session_id.as_str()), ("action", "approve")])
        .send()
        .await
        .unwrap();
    (location(&resp, &server.url("/consent")), cookie)
}

/// `name=value` of the session cookie set by a response.
pub fn session_cookie(resp: &Response) -> String {
    let raw = resp
        .headers()
        .get(SET_COOKIE)
        .expect("set-cookie header")
        .to_str()
        .unwrap();
    raw.split(';').next().unwrap().to_string()
}
