pub mod auth_code_service;
pub mod authorization_handler;
pub mod ciba_service;
pub mod client_auth_service;
pub mod client_registry;
pub mod end_session_service;
pub mod fetchers;
pub mod grants;
pub mod http_fetcher;
pub mod introspection_service;
pub mod mtls_service;
pub mod par_service;
pub mod response_builder;
pub mod revocation_service;
pub mod storage;
pub mod token_handler;
pub mod token_registry;
pub mod token_service;
pub mod validators;

pub use auth_code_service::AuthorizationCodeService;
pub use authorization_handler::{AuthenticationCollaborator, AuthorizationHandler, AuthorizationOutcome, AuthorizationResponse, InteractionRequired, ParResponse};
pub use ciba_service::CibaCoordinator;
pub use client_auth_service::{ClientAuthOutcome, ClientAuthRequest, ClientAuthenticator, DefaultClientAuthenticator};
pub use client_registry::{ClientRegistry, InMemoryClientRegistry};
pub use end_session_service::{EndSessionOutcome, EndSessionRequest, EndSessionService};
pub use fetchers::{CompositeFetcher, PushedRequestFetcher, RequestFetcher, RequestObjectFetcher, RequestUriFetcher};
pub use grants::authorization_code::AuthorizationCodeGrant;
pub use grants::ciba::CibaGrant;
pub use grants::client_credentials::ClientCredentialsGrant;
pub use grants::jwt_bearer::{JwtBearerGrant, TrustedIssuer, TrustedIssuerDirectory};
pub use grants::refresh_token::RefreshTokenGrant;
pub use grants::{GrantHandler, TokenRequest};
pub use http_fetcher::SecureHttpFetcher;
pub use introspection_service::{IntrospectionResponse, IntrospectionService};
pub use mtls_service::MtlsService;
pub use par_service::ParService;
pub use response_builder::{render_redirectable_error, render_success, RenderedAuthorizationResponse};
pub use revocation_service::RevocationService;
pub use token_handler::{TokenHandler, TokenResponse};
pub use token_registry::TokenRegistry;
pub use token_service::TokenService;
pub use validators::{authorize_chain, ContextValidator, ValidationContext, ValidatorChain};
