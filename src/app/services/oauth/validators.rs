use std::collections::HashSet;

use crate::app::models::oauth::{
    parse_scopes, AuthorizeRequestParams, AuthorizationContext, ClientInfo, PkceMethod,
};
use crate::result::{ErrorCode, OidcError, OidcResult, ResponseMode};

use super::client_registry::ClientRegistry;

/// C9: a mutable `ValidationContext` widened by each validator in turn
/// (spec §4.4). Validators never remove information already resolved
/// by an earlier step.
pub struct ValidationContext {
    pub params: AuthorizeRequestParams,
    pub client: Option<ClientInfo>,
    pub redirect_uri: Option<String>,
    pub response_mode: Option<ResponseMode>,
    pub response_types: Vec<String>,
    pub scopes: HashSet<String>,
    pub resources: Vec<String>,
    pub code_challenge_method: Option<PkceMethod>,
    pub claims: Option<serde_json::Value>,
}

impl ValidationContext {
    pub fn new(params: AuthorizeRequestParams) -> Self {
        Self {
            params,
            client: None,
            redirect_uri: None,
            response_mode: None,
            response_types: Vec::new(),
            scopes: HashSet::new(),
            resources: Vec::new(),
            code_challenge_method: None,
            claims: None,
        }
    }

    /// Once the redirect URI and response mode are resolved, a later
    /// failure is rendered as a redirect rather than a direct error
    /// (spec §4.4 "the error carries them").
    fn attach_redirect(&self, err: OidcError) -> OidcError {
        match (&self.redirect_uri, self.response_mode) {
            (Some(uri), Some(mode)) => err.with_redirect(uri.clone(), mode),
            _ => err,
        }
    }
}

pub trait ContextValidator: Send + Sync {
    fn validate(&self, ctx: &mut ValidationContext) -> OidcResult<()>;
}

pub struct ValidatorChain {
    validators: Vec<Box<dyn ContextValidator>>,
}

impl ValidatorChain {
    pub fn new(validators: Vec<Box<dyn ContextValidator>>) -> Self {
        Self { validators }
    }

    pub fn run(&self, ctx: &mut ValidationContext) -> OidcResult<()> {
        for validator in &self.validators {
            if let Err(err) = validator.validate(ctx) {
                return Err(ctx.attach_redirect(err));
            }
        }
        Ok(())
    }
}

/// Builds the canonical nine-step authorize chain (spec §4.4).
pub fn authorize_chain<R: ClientRegistry + 'static>(registry: std::sync::Arc<R>) -> ValidatorChain {
    ValidatorChain::new(vec![
        Box::new(ClientResolutionValidator { registry }),
        Box::new(RedirectUriValidator),
        Box::new(ResponseTypeValidator),
        Box::new(ScopeValidator),
        Box::new(ResourceValidator),
        Box::new(PkceValidator),
        Box::new(NonceAndPromptValidator),
        Box::new(ClaimsValidator),
        Box::new(AcrAndMaxAgeValidator),
    ])
}

/// Step 1: resolves and attaches `ClientInfo`.
pub struct ClientResolutionValidator<R: ClientRegistry> {
    pub registry: std::sync::Arc<R>,
}

impl<R: ClientRegistry> ContextValidator for ClientResolutionValidator<R> {
    fn validate(&self, ctx: &mut ValidationContext) -> OidcResult<()> {
        let client_id = ctx
            .params
            .client_id
            .clone()
            .ok_or_else(|| OidcError::invalid_request("client_id is required"))?;
        let client = self
            .registry
            .find_by_id(&client_id)
            .ok_or_else(|| OidcError::invalid_client("unknown client"))?;
        if !client.is_usable() {
            return Err(OidcError::invalid_client("client is revoked"));
        }
        ctx.client = Some(client);
        Ok(())
    }
}

/// Step 2: exact-match redirect URI, so every subsequent error can be
/// rendered as a redirect.
pub struct RedirectUriValidator;

impl ContextValidator for RedirectUriValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> OidcResult<()> {
        let client = ctx.client.as_ref().expect("client resolved before redirect_uri validation");
        let candidate = ctx
            .params
            .redirect_uri
            .clone()
            .ok_or_else(|| OidcError::invalid_request("redirect_uri is required"))?;
        if !client.is_valid_redirect_uri(&candidate) {
            return Err(OidcError::invalid_request("redirect_uri does not match a registered URI"));
        }
        ctx.redirect_uri = Some(candidate);
        Ok(())
    }
}

/// Step 3: response-type/response-mode reconciliation (defaults:
/// `code` → `query`, `token`/`id_token` → `fragment`).
pub struct ResponseTypeValidator;

impl ContextValidator for ResponseTypeValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> OidcResult<()> {
        let client = ctx.client.as_ref().expect("client resolved before response_type validation");
        let raw = ctx
            .params
            .response_type
            .clone()
            .ok_or_else(|| OidcError::invalid_request("response_type is required"))?;
        let types: Vec<String> = raw.split_whitespace().map(String::from).collect();
        if types.is_empty() {
            return Err(OidcError::invalid_request("response_type must not be empty"));
        }
        for t in &types {
            if !client.supports_response_type(t) {
                return Err(OidcError::unauthorized_client(format!("client is not allowed response_type {t}")));
            }
        }

        let requested_mode = ctx.params.response_mode.as_deref();
        let mode = match requested_mode {
            Some("query") => ResponseMode::Query,
            Some("fragment") => ResponseMode::Fragment,
            Some("form_post") => ResponseMode::FormPost,
            Some(other) => return Err(OidcError::invalid_request(format!("unsupported response_mode {other}"))),
            None if types.iter().any(|t| t == "token" || t == "id_token") => ResponseMode::Fragment,
            None => ResponseMode::Query,
        };

        ctx.response_types = types;
        ctx.response_mode = Some(mode);
        Ok(())
    }
}

/// Step 4: scope must be a subset of what the client is allowed; an
/// ID-token-bearing response type requires `openid`.
pub struct ScopeValidator;

impl ContextValidator for ScopeValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> OidcResult<()> {
        let client = ctx.client.as_ref().expect("client resolved before scope validation");
        let requested = parse_scopes(ctx.params.scope.as_deref().unwrap_or_default());
        let allowed = client.allowed_scope_set();
        if !requested.is_subset(&allowed) {
            return Err(OidcError::invalid_scope("requested scope exceeds what this client is allowed"));
        }
        let needs_openid = ctx.response_types.iter().any(|t| t == "id_token");
        if needs_openid && !requested.contains("openid") {
            return Err(OidcError::invalid_scope("openid scope is required for this response_type"));
        }
        ctx.scopes = requested;
        Ok(())
    }
}

/// Step 5: resource indicators (RFC 8707) — absolute URI, no fragment,
/// subset of client-allowed resources.
pub struct ResourceValidator;

impl ContextValidator for ResourceValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> OidcResult<()> {
        let client = ctx.client.as_ref().expect("client resolved before resource validation");
        for resource in &ctx.params.resource {
            let parsed = url::Url::parse(resource).map_err(|_| OidcError::invalid_target("resource must be an absolute URI"))?;
            if parsed.fragment().is_some() {
                return Err(OidcError::invalid_target("resource must not contain a fragment"));
            }
            if !client.allowed_resources.is_empty() && !client.allowed_resources.iter().any(|r| r == resource) {
                return Err(OidcError::invalid_target("resource is not allowed for this client"));
            }
        }
        ctx.resources = ctx.params.resource.clone();
        Ok(())
    }
}

/// Step 6: PKCE — required by client policy or when `code` is
/// requested; `plain` disallowed unless the client opts in.
pub struct PkceValidator;

impl ContextValidator for PkceValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> OidcResult<()> {
        let client = ctx.client.as_ref().expect("client resolved before PKCE validation");
        let requests_code = ctx.response_types.iter().any(|t| t == "code");
        let required = client.pkce_required || requests_code;

        match &ctx.params.code_challenge {
            Some(_challenge) => {
                let method = match ctx.params.code_challenge_method.as_deref() {
                    Some("S256") => PkceMethod::S256,
                    Some("plain") if client.allow_plain_pkce => PkceMethod::Plain,
                    Some("plain") => {
                        return Err(OidcError::invalid_request("plain PKCE transform is not allowed for this client"))
                    }
                    Some(other) => return Err(OidcError::invalid_request(format!("unsupported code_challenge_method {other}"))),
                    None => PkceMethod::S256,
                };
                ctx.code_challenge_method = Some(method);
            }
            None if required => return Err(OidcError::invalid_request("code_challenge is required")),
            None => {}
        }
        Ok(())
    }
}

/// Step 7: nonce for implicit/hybrid flows; `prompt` value set.
pub struct NonceAndPromptValidator;

const VALID_PROMPTS: &[&str] = &["none", "login", "consent", "select_account"];

impl ContextValidator for NonceAndPromptValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> OidcResult<()> {
        let needs_nonce = ctx.response_types.iter().any(|t| t == "token" || t == "id_token");
        if needs_nonce && ctx.params.nonce.is_none() {
            return Err(OidcError::invalid_request("nonce is required for implicit or hybrid flows"));
        }

        if let Some(prompt) = &ctx.params.prompt {
            let values: Vec<&str> = prompt.split_whitespace().collect();
            if values.is_empty() {
                return Err(OidcError::invalid_request("prompt must not be empty"));
            }
            for v in &values {
                if !VALID_PROMPTS.contains(v) {
                    return Err(OidcError::invalid_request(format!("unsupported prompt value {v}")));
                }
            }
            if values.contains(&"none") && values.len() > 1 {
                return Err(OidcError::invalid_request("prompt=none is mutually exclusive with other values"));
            }
        }
        Ok(())
    }
}

/// Step 8: `claims` parsed as JSON, unknown top-level keys rejected.
pub struct ClaimsValidator;

const KNOWN_CLAIMS_KEYS: &[&str] = &["userinfo", "id_token"];

impl ContextValidator for ClaimsValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> OidcResult<()> {
        let Some(claims) = &ctx.params.claims else { return Ok(()) };
        let object = claims
            .as_object()
            .ok_or_else(|| OidcError::invalid_request("claims must be a JSON object"))?;
        for key in object.keys() {
            if !KNOWN_CLAIMS_KEYS.contains(&key.as_str()) {
                return Err(OidcError::invalid_request(format!("unknown claims key {key}")));
            }
        }
        ctx.claims = Some(claims.clone());
        Ok(())
    }
}

/// Step 9: ACR values and `max_age` sanity.
pub struct AcrAndMaxAgeValidator;

impl ContextValidator for AcrAndMaxAgeValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> OidcResult<()> {
        if let Some(max_age) = ctx.params.max_age {
            if max_age < 0 {
                return Err(OidcError::invalid_request("max_age must not be negative"));
            }
        }
        if let Some(acr_values) = &ctx.params.acr_values {
            if acr_values.trim().is_empty() {
                return Err(OidcError::invalid_request("acr_values must not be blank when present"));
            }
        }
        Ok(())
    }
}

impl ValidationContext {
    pub fn into_authorization_context(self) -> OidcResult<AuthorizationContext> {
        let client = self.client.ok_or_else(|| OidcError::new(ErrorCode::SERVER_ERROR, "client not resolved"))?;
        let redirect_uri = self.redirect_uri.ok_or_else(|| OidcError::new(ErrorCode::SERVER_ERROR, "redirect_uri not resolved"))?;
        let mut context = AuthorizationContext::new(client.client_id.clone(), self.scopes, redirect_uri);
        context.resources = self.resources;
        context.claims = self.claims;
        context.nonce = self.params.nonce;
        context.pairwise = matches!(client.subject_type, crate::app::models::oauth::SubjectType::Pairwise);
        context.sector_identifier = client.sector_identifier;
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::oauth::{ClientAuthMethod, ClientInfo, SubjectType};
    use crate::app::services::oauth::client_registry::InMemoryClientRegistry;
    use std::sync::Arc;

    fn sample_client() -> ClientInfo {
        let now = chrono::Utc::now();
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

    fn registry_with(client: ClientInfo) -> Arc<InMemoryClientRegistry> {
        let registry = Arc::new(InMemoryClientRegistry::default());
        registry.register(client);
        registry
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

    #[test]
    fn full_chain_succeeds_for_well_formed_request() {
        let registry = registry_with(sample_client());
        let chain = authorize_chain(registry);
        let mut ctx = ValidationContext::new(base_params());
        assert!(chain.run(&mut ctx).is_ok());
        assert!(ctx.into_authorization_context().is_ok());
    }

    #[test]
    fn missing_pkce_is_rejected_when_required() {
        let registry = registry_with(sample_client());
        let chain = authorize_chain(registry);
        let mut params = base_params();
        params.code_challenge = None;
        let mut ctx = ValidationContext::new(params);
        let err = chain.run(&mut ctx).unwrap_err();
        assert_eq!(err.error_code.as_str(), ErrorCode::INVALID_REQUEST);
        assert!(err.is_redirectable());
    }

    #[test]
    fn unknown_scope_is_rejected() {
        let registry = registry_with(sample_client());
        let chain = authorize_chain(registry);
        let mut params = base_params();
        params.scope = Some("openid admin".into());
        let mut ctx = ValidationContext::new(params);
        let err = chain.run(&mut ctx).unwrap_err();
        assert_eq!(err.error_code.as_str(), ErrorCode::INVALID_SCOPE);
    }

    #[test]
    fn prompt_none_combined_with_other_values_is_rejected() {
        let registry = registry_with(sample_client());
        let chain = authorize_chain(registry);
        let mut params = base_params();
        params.prompt = Some("none login".into());
        let mut ctx = ValidationContext::new(params);
        assert!(chain.run(&mut ctx).is_err());
    }
}
