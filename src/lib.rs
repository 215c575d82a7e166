pub mod app;
pub mod config;
pub mod result;
pub mod routes;
pub mod time;

use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use app::http::collaborator::NoInteractionCollaborator;
use app::http::state::AppState;
use app::models::oauth::{ClientAuthMethod, ClientInfo, ClientSecret, SubjectType};
use app::services::oauth::client_auth_service::hash_client_secret;
use app::services::oauth::{
    authorize_chain, AuthorizationCodeGrant, AuthorizationCodeService, AuthorizationHandler, CibaCoordinator,
    CibaGrant, ClientAuthenticator, ClientCredentialsGrant, DefaultClientAuthenticator, EndSessionService,
    GrantHandler, InMemoryClientRegistry, IntrospectionService, JwtBearerGrant, ParService, RefreshTokenGrant,
    RevocationService, SecureHttpFetcher, TokenHandler, TokenRegistry, TokenService, TrustedIssuerDirectory,
};
use config::Config;

/// Wires the full dependency graph a running server needs from a loaded
/// [`Config`]. Kept separate from [`create_app`] so tests can build the
/// state without binding a socket.
pub fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let oauth = &config.oauth;

    let client_registry = Arc::new(InMemoryClientRegistry::new());
    seed_demo_clients(&client_registry)?;

    let token_registry = Arc::new(TokenRegistry::new());
    let token_service = Arc::new(TokenService::new(oauth.issuer.clone(), &oauth.signing_secret, oauth.server_salt.clone()));
    let auth_codes = Arc::new(AuthorizationCodeService::new());
    let par_service = Arc::new(ParService::new());
    let http_fetcher = Arc::new(SecureHttpFetcher::new(
        oauth.secure_http_fetch.allowed_schemes.clone(),
        oauth.secure_http_fetch.block_private_networks,
    ));
    let ciba = Arc::new(CibaCoordinator::new(token_service.clone(), http_fetcher.clone()));

    let authenticator: Arc<dyn ClientAuthenticator> =
        Arc::new(DefaultClientAuthenticator::new(client_registry.clone(), token_registry.clone()));

    let grants: Vec<Arc<dyn GrantHandler>> = vec![
        Arc::new(AuthorizationCodeGrant { codes: auth_codes.clone(), token_registry: token_registry.clone() }),
        Arc::new(RefreshTokenGrant { tokens: token_service.clone(), token_registry: token_registry.clone() }),
        Arc::new(ClientCredentialsGrant),
        Arc::new(CibaGrant { coordinator: ciba.clone() }),
        Arc::new(JwtBearerGrant { issuers: Arc::new(TrustedIssuerDirectory::new()), token_registry: token_registry.clone() }),
    ];

    let token_handler = Arc::new(TokenHandler::new(
        authenticator.clone(),
        grants,
        token_service.clone(),
        token_registry.clone(),
        auth_codes.clone(),
    ));

    let chain = authorize_chain(client_registry.clone());
    let authorization_handler = Arc::new(AuthorizationHandler::new(
        chain,
        auth_codes.clone(),
        token_service.clone(),
        par_service.clone(),
        Arc::new(NoInteractionCollaborator),
    ));

    let revocation = Arc::new(RevocationService::new(token_service.clone(), token_registry.clone()));
    let introspection = Arc::new(IntrospectionService::new(token_service.clone(), token_registry.clone()));
    let end_session = Arc::new(EndSessionService::new());

    Ok(AppState {
        config: Arc::new(oauth.clone()),
        client_registry,
        token_service,
        token_registry,
        auth_codes,
        par_service,
        http_fetcher,
        authenticator,
        authorization_handler,
        token_handler,
        revocation,
        introspection,
        end_session,
        ciba,
    })
}

/// Registers the handful of clients a reader needs to exercise every
/// grant type against a freshly started server. Production deployments
/// replace [`InMemoryClientRegistry`] with a persisted one (spec §1
/// "persistence back-end implementations") rather than seed it.
fn seed_demo_clients(registry: &InMemoryClientRegistry) -> anyhow::Result<()> {
    let now = chrono::Utc::now();

    registry.register(ClientInfo {
        client_id: "demo-public-client".into(),
        auth_methods: vec![ClientAuthMethod::None],
        secrets: vec![],
        keys: None,
        redirect_uris: vec!["https://client.example/callback".into()],
        post_logout_redirect_uris: vec!["https://client.example/logged-out".into()],
        notification_endpoint: None,
        token_delivery_mode: None,
        allowed_grant_types: vec!["authorization_code".into(), "refresh_token".into()],
        allowed_response_types: vec!["code".into()],
        allowed_scopes: vec!["openid".into(), "profile".into(), "offline_access".into()],
        allowed_resources: vec![],
        pkce_required: true,
        allow_plain_pkce: false,
        access_token_ttl_seconds: 3600,
        refresh_token_ttl_seconds: Some(604_800),
        authorization_code_ttl_seconds: 60,
        refresh_token_reuse_allowed: false,
        subject_type: SubjectType::Public,
        sector_identifier: None,
        id_token_signing_alg: "HS256".into(),
        offline_access_allowed: true,
        revoked: false,
        created_at: now,
        updated_at: now,
    });

    registry.register(ClientInfo {
        client_id: "demo-confidential-client".into(),
        auth_methods: vec![ClientAuthMethod::ClientSecretBasic, ClientAuthMethod::ClientSecretPost],
        secrets: vec![ClientSecret {
            hash: hash_client_secret("demo-secret")?,
            hmac_key: b"demo-secret".to_vec(),
            not_before: None,
            not_after: None,
        }],
        keys: None,
        redirect_uris: vec!["https://service.example/callback".into()],
        post_logout_redirect_uris: vec![],
        notification_endpoint: None,
        token_delivery_mode: None,
        allowed_grant_types: vec!["client_credentials".into(), "authorization_code".into()],
        allowed_response_types: vec!["code".into()],
        allowed_scopes: vec!["api:read".into(), "api:write".into()],
        allowed_resources: vec!["https://api.example/".into()],
        pkce_required: false,
        allow_plain_pkce: false,
        access_token_ttl_seconds: 3600,
        refresh_token_ttl_seconds: None,
        authorization_code_ttl_seconds: 60,
        refresh_token_reuse_allowed: false,
        subject_type: SubjectType::Public,
        sector_identifier: None,
        id_token_signing_alg: "HS256".into(),
        offline_access_allowed: false,
        revoked: false,
        created_at: now,
        updated_at: now,
    });

    Ok(())
}

pub async fn create_app(config: &Config) -> anyhow::Result<Router> {
    let state = build_state(config)?;

    let app = Router::new()
        .merge(routes::oauth::routes(state))
        .merge(routes::web::routes())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()));

    Ok(app)
}
