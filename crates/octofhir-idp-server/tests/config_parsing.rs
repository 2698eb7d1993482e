use std::time::Duration;
use std::{env, fs};

use octofhir_idp::types::{GrantType, ResponseType, TokenEndpointAuthMethod};
use octofhir_idp_server::config::loader::load_config;
use octofhir_idp_server::seed::client_from_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("octofhir-idp.toml");

    let toml_content = r#"
initial_access_tokens = ["bootstrap-token"]

[server]
host = "127.0.0.1"
port = 9090
body_limit_bytes = 4096

[logging]
level = "debug"

[housekeeping]
interval = "30s"

[idp]
issuer = "https://id.example.com/"

[idp.oauth]
access_token_lifetime = "15m"
refresh_token_lifetime = "7d"

[idp.signing]
key_size_bits = 2048
rotation_interval = "90d"
rotation_grace_period = "7d"

[idp.registration]
require_initial_access_token = true

[idp.cookies]
secure = false

[[clients]]
client_id = "portal"
client_secret = "portal-secret"
client_name = "Portal"
redirect_uris = ["https://portal.example.com/cb"]

[[clients]]
client_id = "spa"
redirect_uris = ["https://spa.example.com/cb"]
grant_types = ["implicit"]
response_types = ["id_token", "token id_token"]
scope = "openid profile"

[[users]]
username = "alice"
password = "wonderland"
email = "alice@example.com"
email_verified = true
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 9090);
    assert_eq!(cfg.addr().to_string(), "127.0.0.1:9090");
    assert_eq!(cfg.logging.level, "debug");
    assert_eq!(cfg.housekeeping.interval, Duration::from_secs(30));
    assert_eq!(cfg.idp.issuer_base(), "https://id.example.com");
    assert_eq!(cfg.idp.oauth.access_token_lifetime, Duration::from_secs(900));
    assert_eq!(
        cfg.idp.signing.rotation_interval,
        Some(Duration::from_secs(90 * 24 * 3600))
    );
    assert!(cfg.idp.registration.require_initial_access_token);
    assert_eq!(cfg.initial_access_tokens, vec!["bootstrap-token".to_string()]);
    // Unset sections keep their defaults.
    assert_eq!(cfg.idp.cookies.session_cookie_name, "idp_session");

    assert_eq!(cfg.clients.len(), 2);
    let portal = client_from_config(&cfg.clients[0]).expect("portal client");
    assert_eq!(
        portal.grant_types,
        vec![GrantType::AuthorizationCode, GrantType::RefreshToken]
    );
    assert_eq!(
        portal.token_endpoint_auth_method,
        TokenEndpointAuthMethod::ClientSecretBasic
    );
    let spa = client_from_config(&cfg.clients[1]).expect("spa client");
    assert_eq!(
        spa.response_types,
        vec![ResponseType::IdToken, ResponseType::TokenIdToken]
    );
    assert_eq!(spa.token_endpoint_auth_method, TokenEndpointAuthMethod::None);

    assert_eq!(cfg.users.len(), 1);
    assert!(cfg.users[0].email_verified);

    // 2) Env override should win over file
    unsafe {
        env::set_var("OCTOFHIR_IDP__SERVER__PORT", "9191");
        env::set_var("OCTOFHIR_IDP__IDP__OAUTH__ACCESS_TOKEN_LIFETIME", "5m");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.server.port, 9191);
    assert_eq!(
        cfg_env.idp.oauth.access_token_lifetime,
        Duration::from_secs(300)
    );
    unsafe {
        env::remove_var("OCTOFHIR_IDP__SERVER__PORT");
        env::remove_var("OCTOFHIR_IDP__IDP__OAUTH__ACCESS_TOKEN_LIFETIME");
    }

    // 3) Invalid configs error
    let invalid_path = dir.path().join("invalid.toml");
    fs::write(
        &invalid_path,
        r#"
[idp]
issuer = "https://id.example.com/?tenant=a"
"#,
    )
    .expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("query or fragment"));

    let duplicate_path = dir.path().join("duplicate.toml");
    fs::write(
        &duplicate_path,
        r#"
[[users]]
username = "bob"
password = "a"

[[users]]
username = "bob"
password = "b"
"#,
    )
    .expect("write duplicate toml");
    let err = load_config(duplicate_path.to_str()).expect_err("expected duplicate error");
    assert!(err.contains("duplicate username 'bob'"));

    // 4) Missing file falls back to defaults
    let cfg = load_config(dir.path().join("absent.toml").to_str()).expect("defaults");
    assert_eq!(cfg.server.port, 8080);
    assert!(cfg.clients.is_empty());
}
