use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app::models::oauth::{
    AuthSession, AuthorizationCodeRecord, AuthorizationContext, AuthorizeRequestParams, AuthorizedGrant, ClientInfo,
    PushedAuthorizationRequest,
};
use crate::result::{OidcError, OidcResult, ResponseMode};

use super::auth_code_service::AuthorizationCodeService;
use super::par_service::ParService;
use super::token_service::TokenService;
use super::validators::{ValidationContext, ValidatorChain};

/// Out-of-band collaborator for session resolution and consent, external
/// to the core by design (spec §1 "user-device UI" is an external
/// collaborator). Production deployments back this with a login/consent
/// UI and a persisted consent grant table.
pub trait AuthenticationCollaborator: Send + Sync {
    fn resolve_session(&self, params: &AuthorizeRequestParams, now: DateTime<Utc>) -> Option<AuthSession>;
    fn has_consented(&self, session: &AuthSession, client_id: &str, scopes: &HashSet<String>) -> bool;
}

/// What the transport layer renders when interaction with the resource
/// owner is required before the authorize pipeline can continue (spec
/// §4.5 `REDIRECT_TO_LOGIN` / `REDIRECT_TO_CONSENT`). Carries the
/// resolved request so the caller can stash it and resume once the user
/// has interacted.
#[derive(Debug, Clone)]
pub enum InteractionRequired {
    Login { params: AuthorizeRequestParams },
    Consent { session: AuthSession, params: AuthorizeRequestParams, scopes: HashSet<String> },
}

/// A loosely-typed set of response parameters, rendered by C17 into
/// `query`, `fragment`, or `form_post` according to `response_mode`
/// (spec §4.5).
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationResponse {
    pub redirect_uri: String,
    pub response_mode: ResponseMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

pub enum AuthorizationOutcome {
    Issued(AuthorizationResponse),
    Interaction(InteractionRequired),
    Error(OidcError),
}

pub struct ParResponse {
    pub request_uri: String,
    pub expires_in: i64,
}

/// C10: orchestrates C9 validation and the prompt/consent loop, then
/// issues codes and/or tokens directly (spec §4.5).
pub struct AuthorizationHandler {
    chain: ValidatorChain,
    codes: Arc<AuthorizationCodeService>,
    tokens: Arc<TokenService>,
    par: Arc<ParService>,
    collaborator: Arc<dyn AuthenticationCollaborator>,
}

impl AuthorizationHandler {
    pub fn new(
        chain: ValidatorChain,
        codes: Arc<AuthorizationCodeService>,
        tokens: Arc<TokenService>,
        par: Arc<ParService>,
        collaborator: Arc<dyn AuthenticationCollaborator>,
    ) -> Self {
        Self { chain, codes, tokens, par, collaborator }
    }

    pub fn handle(&self, params: AuthorizeRequestParams, now: DateTime<Utc>) -> AuthorizationOutcome {
        let mut ctx = ValidationContext::new(params);
        if let Err(err) = self.chain.run(&mut ctx) {
            return AuthorizationOutcome::Error(err);
        }

        let prompts: Vec<&str> = ctx.params.prompt.as_deref().map(|p| p.split_whitespace().collect()).unwrap_or_default();
        let prompt_none = prompts.contains(&"none");
        let forced_consent = prompts.contains(&"consent");

        let Some(session) = self.collaborator.resolve_session(&ctx.params, now) else {
            return if prompt_none {
                AuthorizationOutcome::Error(self.login_required(&ctx))
            } else {
                AuthorizationOutcome::Interaction(InteractionRequired::Login { params: ctx.params.clone() })
            };
        };

        let client = ctx.client.clone().expect("client resolved by the validator chain");
        let needs_consent = forced_consent || !self.collaborator.has_consented(&session, &client.client_id, &ctx.scopes);
        if needs_consent {
            return if prompt_none {
                AuthorizationOutcome::Error(self.consent_required(&ctx))
            } else {
                AuthorizationOutcome::Interaction(InteractionRequired::Consent {
                    session,
                    params: ctx.params.clone(),
                    scopes: ctx.scopes.clone(),
                })
            };
        }

        self.issue(ctx, session, &client, now)
    }

    /// Same pipeline, terminating at VALIDATED: the validated request is
    /// stashed under a fresh URN instead of proceeding to interaction or
    /// issuance (spec §4.5 "Pushed Authorization Request").
    pub fn handle_par(&self, params: AuthorizeRequestParams, now: DateTime<Utc>) -> OidcResult<ParResponse> {
        let mut ctx = ValidationContext::new(params);
        self.chain.run(&mut ctx)?;
        let client_id = ctx.client.as_ref().expect("client resolved by the validator chain").client_id.clone();
        let ttl_seconds = super::par_service::DEFAULT_PAR_TTL_SECONDS;
        let record = PushedAuthorizationRequest::new(client_id, ctx.params, now, chrono::Duration::seconds(ttl_seconds));
        let request_uri = self.par.push(record, now);
        Ok(ParResponse { request_uri, expires_in: ttl_seconds })
    }

    fn login_required(&self, ctx: &ValidationContext) -> OidcError {
        self.attach_redirect(ctx, OidcError::login_required("user is not authenticated and prompt=none was requested"))
    }

    fn consent_required(&self, ctx: &ValidationContext) -> OidcError {
        self.attach_redirect(ctx, OidcError::consent_required("consent is required and prompt=none was requested"))
    }

    fn attach_redirect(&self, ctx: &ValidationContext, err: OidcError) -> OidcError {
        match (&ctx.redirect_uri, ctx.response_mode) {
            (Some(uri), Some(mode)) => err.with_redirect(uri.clone(), mode),
            _ => err,
        }
    }

    fn issue(&self, ctx: ValidationContext, mut session: AuthSession, client: &ClientInfo, now: DateTime<Utc>) -> AuthorizationOutcome {
        session.record_affected_client(client.client_id.clone());
        let response_types = ctx.response_types.clone();
        let redirect_uri = ctx.redirect_uri.clone().expect("redirect_uri resolved by the validator chain");
        let response_mode = ctx.response_mode.expect("response_mode resolved by the validator chain");
        let state = ctx.params.state.clone();
        let code_challenge = ctx.params.code_challenge.clone();
        let code_challenge_method = ctx.code_challenge_method;

        let context: AuthorizationContext = match ctx.into_authorization_context() {
            Ok(context) => context,
            Err(err) => return AuthorizationOutcome::Error(err),
        };

        let subject = self.tokens.effective_subject(context.sector_identifier.as_deref(), context.pairwise, &session.subject);

        let mut response = AuthorizationResponse {
            redirect_uri,
            response_mode,
            code: None,
            access_token: None,
            token_type: None,
            expires_in: None,
            id_token: None,
            state,
        };

        if response_types.iter().any(|t| t == "code") {
            let grant = AuthorizedGrant::new(session.clone(), context.clone());
            let mut record = AuthorizationCodeRecord::new(grant);
            if let (Some(challenge), Some(method)) = (code_challenge, code_challenge_method) {
                record = record.with_pkce(challenge, method);
            }
            let code = self.codes.issue(record, now, client.authorization_code_ttl_seconds);
            response.code = Some(code);
        }

        let wants_access_token = response_types.iter().any(|t| t == "token");
        let wants_id_token = response_types.iter().any(|t| t == "id_token");

        if wants_access_token {
            let access_jti = TokenService::new_jti();
            let aud = if context.resources.is_empty() { vec![client.client_id.clone()] } else { context.resources.clone() };
            match self.tokens.issue_access_token(
                &subject,
                &client.client_id,
                &context.scope_string(),
                aud,
                &access_jti,
                now,
                client.access_token_ttl_seconds,
            ) {
                Ok(token) => {
                    response.access_token = Some(token);
                    response.token_type = Some("Bearer");
                    response.expires_in = Some(client.access_token_ttl_seconds);
                }
                Err(err) => return AuthorizationOutcome::Error(err),
            }
        }

        if wants_id_token {
            match self.tokens.issue_id_token(
                &subject,
                &client.client_id,
                now,
                session.authenticated_at,
                client.access_token_ttl_seconds,
                context.nonce.clone(),
                session.acr.clone(),
                session.amr.clone(),
                response.code.as_deref(),
                response.access_token.as_deref(),
            ) {
                Ok(token) => response.id_token = Some(token),
                Err(err) => return AuthorizationOutcome::Error(err),
            }
        }

        AuthorizationOutcome::Issued(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::oauth::{ClientAuthMethod, SubjectType};
    use crate::app::services::oauth::client_registry::InMemoryClientRegistry;
    use crate::app::services::oauth::validators::authorize_chain;
    use std::sync::Mutex;

    fn sample_client() -> ClientInfo {
        let now = Utc::now();
        ClientInfo {
            client_id: "client-1".into(),
            auth_methods: vec![ClientAuthMethod::None],
            secrets: vec![],
            keys: None,
            redirect_uris: vec!["https://client.example/cb".into()],
            post_logout_redirect_uris: vec![],
            notification_endpoint: None,
            token_delivery_mode: None,
            allowed_grant_types: vec!["authorization_code".into()],
            allowed_response_types: vec!["code".into()],
            allowed_scopes: vec!["openid".into(), "profile".into()],
            allowed_resources: vec![],
            pkce_required: true,
            allow_plain_pkce: false,
            access_token_ttl_seconds: 3600,
            refresh_token_ttl_seconds: Some(86400),
            authorization_code_ttl_seconds: 60,
            refresh_token_reuse_allowed: false,
            subject_type: SubjectType::Public,
            sector_identifier: None,
            id_token_signing_alg: "RS256".into(),
            offline_access_allowed: true,
            revoked: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn base_params() -> AuthorizeRequestParams {
        AuthorizeRequestParams {
            response_type: Some("code".into()),
            client_id: Some("client-1".into()),
            redirect_uri: Some("https://client.example/cb".into()),
            scope: Some("openid".into()),
            code_challenge: Some("x".repeat(43)),
            code_challenge_method: Some("S256".into()),
            ..Default::default()
        }
    }

    struct AlwaysAnonymous;
    impl AuthenticationCollaborator for AlwaysAnonymous {
        fn resolve_session(&self, _params: &AuthorizeRequestParams, _now: DateTime<Utc>) -> Option<AuthSession> {
            None
        }
        fn has_consented(&self, _session: &AuthSession, _client_id: &str, _scopes: &HashSet<String>) -> bool {
            false
        }
    }

    struct AuthenticatedNoConsent {
        session: AuthSession,
        consented: Mutex<bool>,
    }
    impl AuthenticationCollaborator for AuthenticatedNoConsent {
        fn resolve_session(&self, _params: &AuthorizeRequestParams, _now: DateTime<Utc>) -> Option<AuthSession> {
            Some(self.session.clone())
        }
        fn has_consented(&self, _session: &AuthSession, _client_id: &str, _scopes: &HashSet<String>) -> bool {
            *self.consented.lock().unwrap()
        }
    }

    fn handler(collaborator: Arc<dyn AuthenticationCollaborator>) -> AuthorizationHandler {
        let registry = Arc::new(InMemoryClientRegistry::default());
        registry.register(sample_client());
        let chain = authorize_chain(registry);
        AuthorizationHandler::new(
            chain,
            Arc::new(AuthorizationCodeService::new()),
            Arc::new(TokenService::new("https://issuer.example", "test-signing-secret", "server-salt")),
            Arc::new(ParService::new()),
            collaborator,
        )
    }

    #[test]
    fn unauthenticated_user_is_redirected_to_login() {
        let h = handler(Arc::new(AlwaysAnonymous));
        let outcome = h.handle(base_params(), Utc::now());
        assert!(matches!(outcome, AuthorizationOutcome::Interaction(InteractionRequired::Login { .. })));
    }

    #[test]
    fn prompt_none_without_session_is_login_required_error() {
        let h = handler(Arc::new(AlwaysAnonymous));
        let mut params = base_params();
        params.prompt = Some("none".into());
        let outcome = h.handle(params, Utc::now());
        match outcome {
            AuthorizationOutcome::Error(err) => {
                assert_eq!(err.error_code.as_str(), crate::result::ErrorCode::LOGIN_REQUIRED);
                assert!(err.is_redirectable());
            }
            _ => panic!("expected an error outcome"),
        }
    }

    #[test]
    fn missing_consent_is_redirected_to_consent() {
        let now = Utc::now();
        let session = AuthSession::new("alice", "sess-1", now, "idp");
        let collaborator = Arc::new(AuthenticatedNoConsent { session, consented: Mutex::new(false) });
        let h = handler(collaborator);
        let outcome = h.handle(base_params(), now);
        assert!(matches!(outcome, AuthorizationOutcome::Interaction(InteractionRequired::Consent { .. })));
    }

    #[test]
    fn fully_satisfied_request_issues_a_code() {
        let now = Utc::now();
        let session = AuthSession::new("alice", "sess-1", now, "idp");
        let collaborator = Arc::new(AuthenticatedNoConsent { session, consented: Mutex::new(true) });
        let h = handler(collaborator);
        let outcome = h.handle(base_params(), now);
        match outcome {
            AuthorizationOutcome::Issued(response) => {
                assert!(response.code.is_some());
                assert!(response.access_token.is_none());
                assert_eq!(response.response_mode, ResponseMode::Query);
            }
            _ => panic!("expected the request to be issued"),
        }
    }

    #[test]
    fn par_stashes_a_validated_request_under_a_single_use_urn() {
        let now = Utc::now();
        let h = handler(Arc::new(AlwaysAnonymous));
        let par = h.handle_par(base_params(), now).unwrap();
        assert!(crate::app::models::oauth::is_par_request_uri(&par.request_uri));
    }
}
