use std::sync::Arc;

use crate::app::services::oauth::{
    AuthorizationCodeService, AuthorizationHandler, CibaCoordinator, ClientAuthenticator, EndSessionService,
    InMemoryClientRegistry, IntrospectionService, ParService, RevocationService, SecureHttpFetcher, TokenHandler,
    TokenRegistry, TokenService,
};
use crate::config::oauth::OAuthConfig;

/// Everything a controller needs, cloned cheaply per request. Built once
/// in `main.rs`/`lib.rs` from the dependency graph the core's
/// constructors describe; no controller constructs a service itself.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<OAuthConfig>,
    pub client_registry: Arc<InMemoryClientRegistry>,
    pub token_service: Arc<TokenService>,
    pub token_registry: Arc<TokenRegistry>,
    pub auth_codes: Arc<AuthorizationCodeService>,
    pub par_service: Arc<ParService>,
    pub http_fetcher: Arc<SecureHttpFetcher>,
    pub authenticator: Arc<dyn ClientAuthenticator>,
    pub authorization_handler: Arc<AuthorizationHandler>,
    pub token_handler: Arc<TokenHandler>,
    pub revocation: Arc<RevocationService>,
    pub introspection: Arc<IntrospectionService>,
    pub end_session: Arc<EndSessionService>,
    pub ciba: Arc<CibaCoordinator>,
}
