use axum_test::TestServer;
use serde_json::{json, Value};

use oidc_provider_core::config::app::AppConfig;
use oidc_provider_core::config::logging::LoggingConfig;
use oidc_provider_core::config::oauth::{CibaConfig, DiscoveryConfig, EnabledEndpoints, OAuthConfig, SecureHttpFetchConfig};
use oidc_provider_core::config::Config;
use oidc_provider_core::create_app;

fn test_config() -> Config {
    Config {
        app: AppConfig {
            name: "test".into(),
            env: "testing".into(),
            debug: true,
            url: "http://localhost:3000".into(),
            port: 3000,
            key: "test-key".into(),
            templates_path: "resources/views".into(),
        },
        logging: LoggingConfig {
            level: "error".into(),
            channel: "single".into(),
            path: "storage/logs/test.log".into(),
            max_files: 1,
            max_file_size: "1MB".into(),
        },
        oauth: OAuthConfig {
            issuer: "https://issuer.test".into(),
            signing_secret: "test-signing-secret-at-least-32-bytes-long".into(),
            server_salt: "test-server-salt".into(),
            authorization_code_length: 16,
            request_uri_length: 24,
            session_id_length: 16,
            access_token_ttl: 3600,
            refresh_token_ttl: 604_800,
            auth_code_ttl: 60,
            par_ttl: 90,
            require_pushed_authorization_requests: false,
            ciba: CibaConfig { request_id_length: 20, polling_interval: 5 },
            secure_http_fetch: SecureHttpFetchConfig { block_private_networks: true, allowed_schemes: vec!["https".into()] },
            enabled_endpoints: EnabledEndpoints::default(),
            discovery: DiscoveryConfig { allow_endpoint_paths_discovery: true },
        },
    }
}

async fn server() -> TestServer {
    let app = create_app(&test_config()).await.unwrap();
    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn discovery_document_lists_every_enabled_endpoint() {
    let server = server().await;
    let response = server.get("/.well-known/openid-configuration").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["issuer"], "https://issuer.test");
    assert_eq!(body["authorization_endpoint"], "https://issuer.test/connect/authorize");
    assert_eq!(body["token_endpoint"], "https://issuer.test/connect/token");
    assert_eq!(body["jwks_uri"], "https://issuer.test/.well-known/jwks");
}

#[tokio::test]
async fn jwks_endpoint_reports_no_public_keys_for_hmac_signer() {
    let server = server().await;
    let response = server.get("/.well-known/jwks").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["keys"], json!([]));
}

#[tokio::test]
async fn authorize_without_a_session_requires_login() {
    let server = server().await;
    let response = server
        .get("/connect/authorize")
        .add_query_params(&[
            ("response_type", "code"),
            ("client_id", "demo-public-client"),
            ("redirect_uri", "https://client.example/callback"),
            ("scope", "openid profile"),
            ("code_challenge", "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"),
            ("code_challenge_method", "S256"),
        ])
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["interaction"], "login");
}

#[tokio::test]
async fn authorize_for_unknown_client_is_rejected() {
    let server = server().await;
    let response = server.get("/connect/authorize").add_query_params(&[("response_type", "code"), ("client_id", "nope")]).await;

    response.assert_status_unauthorized();
    let body: Value = response.json();
    assert_eq!(body["error"], "invalid_client");
}

#[tokio::test]
async fn client_credentials_grant_issues_and_introspects_a_token() {
    let server = server().await;

    let token_response = server
        .post("/connect/token")
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", "demo-confidential-client"),
            ("client_secret", "demo-secret"),
            ("scope", "api:read"),
        ])
        .await;
    token_response.assert_status_ok();
    let tokens: Value = token_response.json();
    let access_token = tokens["access_token"].as_str().unwrap().to_string();
    assert_eq!(tokens["token_type"], "Bearer");

    let introspect_response = server
        .post("/connect/introspect")
        .form(&[("token", access_token.as_str()), ("client_id", "demo-confidential-client"), ("client_secret", "demo-secret")])
        .await;
    introspect_response.assert_status_ok();
    let introspection: Value = introspect_response.json();
    assert_eq!(introspection["active"], true);
    assert_eq!(introspection["client_id"], "demo-confidential-client");

    let revoke_response = server
        .post("/connect/revocation")
        .form(&[("token", access_token.as_str()), ("client_id", "demo-confidential-client"), ("client_secret", "demo-secret")])
        .await;
    revoke_response.assert_status_ok();

    let after_revoke = server
        .post("/connect/introspect")
        .form(&[("token", access_token.as_str()), ("client_id", "demo-confidential-client"), ("client_secret", "demo-secret")])
        .await;
    let after_revoke_body: Value = after_revoke.json();
    assert_eq!(after_revoke_body["active"], false);
}

#[tokio::test]
async fn token_endpoint_rejects_unknown_client() {
    let server = server().await;
    let response = server
        .post("/connect/token")
        .form(&[("grant_type", "client_credentials"), ("client_id", "nonexistent"), ("client_secret", "whatever")])
        .await;

    response.assert_status_unauthorized();
    let body: Value = response.json();
    assert_eq!(body["error"], "invalid_client");
}

#[tokio::test]
async fn introspection_of_a_malformed_token_reports_inactive() {
    let server = server().await;
    let response = server
        .post("/connect/introspect")
        .form(&[("token", "not-a-real-token"), ("client_id", "demo-confidential-client"), ("client_secret", "demo-secret")])
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["active"], false);
}

#[tokio::test]
async fn end_session_without_post_logout_redirect_shows_confirmation() {
    let server = server().await;
    let response = server.get("/connect/endsession").await;
    response.assert_status_ok();
    let body = response.text();
    assert!(body.contains("signed out"));
}

#[tokio::test]
async fn health_check_reports_ok() {
    let server = server().await;
    let response = server.get("/health").await;
    response.assert_status_ok();
}
