use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app::models::oauth::{intersect, parse_scopes, AuthorizedGrant, ClientInfo, TokenFingerprint};
use crate::result::{OidcError, OidcResult};

use super::auth_code_service::AuthorizationCodeService;
use super::client_auth_service::{ClientAuthRequest, ClientAuthenticator};
use super::grants::{GrantHandler, TokenRequest};
use super::token_registry::TokenRegistry;
use super::token_service::TokenService;

/// Retention window for the authorization-code reuse-prevention
/// decorator's second lookup (spec §4.11's "exactly one more lookup").
/// Chosen short enough that it cannot itself be mistaken for a valid
/// code lifetime, long enough to catch a client retry racing the
/// original request.
pub const REUSE_DETECTION_RETENTION_SECONDS: i64 = 30;

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

/// C11: `tokenHandler.handle` — authenticate, dispatch, reconcile,
/// issue (spec §4.6).
pub struct TokenHandler {
    authenticator: Arc<dyn ClientAuthenticator>,
    grants: HashMap<&'static str, Arc<dyn GrantHandler>>,
    tokens: Arc<TokenService>,
    token_registry: Arc<TokenRegistry>,
    codes: Arc<AuthorizationCodeService>,
}

impl TokenHandler {
    pub fn new(
        authenticator: Arc<dyn ClientAuthenticator>,
        grants: Vec<Arc<dyn GrantHandler>>,
        tokens: Arc<TokenService>,
        token_registry: Arc<TokenRegistry>,
        codes: Arc<AuthorizationCodeService>,
    ) -> Self {
        let grants = grants.into_iter().map(|g| (g.grant_type(), g)).collect();
        Self { authenticator, grants, tokens, token_registry, codes }
    }

    pub fn handle(&self, auth_request: &ClientAuthRequest, request: &TokenRequest, now: DateTime<Utc>) -> OidcResult<TokenResponse> {
        for resource in &request.resource {
            let parsed = url::Url::parse(resource).map_err(|_| OidcError::invalid_target("resource must be an absolute URI"))?;
            if parsed.fragment().is_some() {
                return Err(OidcError::invalid_target("resource must not contain a fragment"));
            }
        }

        let (client, _outcome) = self.authenticator.authenticate(auth_request, now)?;

        let handler = self
            .grants
            .get(request.grant_type.as_str())
            .ok_or_else(|| OidcError::unsupported_grant_type("this server does not support that grant_type"))?;
        if !client.supports_grant_type(&request.grant_type) {
            return Err(OidcError::unauthorized_client("client is not allowed this grant_type"));
        }

        let grant = handler.authorize(request, &client, now)?;

        if !grant.context.redirect_uri.is_empty() {
            if let Some(redirect_uri) = &request.redirect_uri {
                if &grant.context.redirect_uri != redirect_uri {
                    return Err(OidcError::invalid_grant("redirect_uri does not match the authorization request"));
                }
            }
        }

        let scopes = reconcile_scopes(&request.scope, &grant, &client)?;
        let resources = reconcile_resources(&request.resource, &grant);

        let response = self.issue(request, &client, &grant, &scopes, &resources, now)?;
        Ok(response)
    }

    fn issue(
        &self,
        request: &TokenRequest,
        client: &ClientInfo,
        grant: &AuthorizedGrant,
        scopes: &std::collections::HashSet<String>,
        resources: &[String],
        now: DateTime<Utc>,
    ) -> OidcResult<TokenResponse> {
        let scope_string = crate::app::models::oauth::format_scopes(scopes);
        let subject = self.tokens.effective_subject(grant.context.sector_identifier.as_deref(), grant.context.pairwise, &grant.session.subject);

        let access_jti = TokenService::new_jti();
        let aud = if resources.is_empty() { vec![client.client_id.clone()] } else { resources.to_vec() };
        let access_token = self.tokens.issue_access_token(
            &subject,
            &client.client_id,
            &scope_string,
            aud,
            &access_jti,
            now,
            client.access_token_ttl_seconds,
        )?;

        let issue_refresh = scopes.contains("offline_access") && client.offline_access_allowed;
        let issue_id_token = scopes.contains("openid");

        let is_reused_refresh = request.grant_type == "refresh_token" && client.refresh_token_reuse_allowed;
        let refresh_token = if is_reused_refresh {
            // Reuse allowed: the same refresh token is returned unchanged
            // rather than rotated (spec §4.6 "Refresh-token rotation").
            request.refresh_token.clone()
        } else if issue_refresh {
            let ttl = client.refresh_token_ttl_seconds.unwrap_or(client.access_token_ttl_seconds * 24);
            let refresh_jti = TokenService::new_jti();
            Some(self.tokens.issue_refresh_token(&subject, &client.client_id, &scope_string, &grant.session.session_id, &refresh_jti, now, ttl)?)
        } else {
            None
        };

        let code_for_hash = request.code.as_deref();
        let id_token = if issue_id_token {
            Some(self.tokens.issue_id_token(
                &subject,
                &client.client_id,
                now,
                grant.session.authenticated_at,
                client.access_token_ttl_seconds,
                grant.context.nonce.clone(),
                grant.session.acr.clone(),
                grant.session.amr.clone(),
                code_for_hash,
                Some(&access_token),
            )?)
        } else {
            None
        };

        self.apply_post_issuance_bookkeeping(request, client, grant, &access_jti, is_reused_refresh, now);

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer",
            expires_in: client.access_token_ttl_seconds,
            scope: scope_string,
            refresh_token,
            id_token,
        })
    }

    /// Authorization-code reuse-prevention decorator's write-back, and
    /// refresh-token rotation, both happen here once issuance has
    /// succeeded (spec §4.6).
    fn apply_post_issuance_bookkeeping(
        &self,
        request: &TokenRequest,
        client: &ClientInfo,
        grant: &AuthorizedGrant,
        access_jti: &str,
        is_reused_refresh: bool,
        now: DateTime<Utc>,
    ) {
        if request.grant_type == "authorization_code" {
            if let Some(code) = &request.code {
                let mut retained = grant.clone();
                retained.record_issued_tokens([TokenFingerprint {
                    jti: access_jti.to_string(),
                    expires_at: now + chrono::Duration::seconds(client.access_token_ttl_seconds),
                }]);
                self.codes.retain_for_reuse_detection(
                    code,
                    crate::app::models::oauth::AuthorizationCodeRecord::new(retained),
                    now,
                    chrono::Duration::seconds(REUSE_DETECTION_RETENTION_SECONDS),
                );
            }
        }

        if request.grant_type == "refresh_token" && !is_reused_refresh {
            if let Some(old) = grant.issued_tokens.first() {
                self.token_registry.mark_revoked(&old.jti, old.expires_at, now);
            }
        }
    }
}

fn reconcile_scopes(requested: &Option<String>, grant: &AuthorizedGrant, client: &ClientInfo) -> OidcResult<std::collections::HashSet<String>> {
    let allowed = client.allowed_scope_set();
    let final_scopes = match requested {
        Some(raw) => {
            let requested = parse_scopes(raw);
            let reconciled = intersect(&requested, &grant.context.scopes);
            if reconciled.is_empty() && !requested.is_empty() {
                return Err(OidcError::invalid_scope("requested scope was not previously granted"));
            }
            reconciled
        }
        None => grant.context.scopes.clone(),
    };
    if !final_scopes.is_subset(&allowed) {
        return Err(OidcError::invalid_scope("granted scope exceeds what this client is allowed"));
    }
    Ok(final_scopes)
}

fn reconcile_resources(requested: &[String], grant: &AuthorizedGrant) -> Vec<String> {
    if requested.is_empty() {
        return grant.context.resources.clone();
    }
    if grant.context.resources.is_empty() {
        return requested.to_vec();
    }
    requested.iter().filter(|r| grant.context.resources.contains(r)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::oauth::{AuthSession, AuthorizationContext};
    use std::collections::HashSet;

    #[test]
    fn reconcile_scopes_rejects_scope_not_previously_granted() {
        let session = AuthSession::new("sub-1", "sess-1", Utc::now(), "idp");
        let mut context = AuthorizationContext::new("client-1", HashSet::from(["openid".to_string()]), "");
        context.scopes = HashSet::from(["openid".to_string()]);
        let grant = AuthorizedGrant::new(session, context);

        let client = sample_client();
        let err = reconcile_scopes(&Some("openid admin".to_string()), &grant, &client).unwrap_err();
        assert_eq!(err.error_code.as_str(), crate::result::ErrorCode::INVALID_SCOPE);
    }

    fn sample_client() -> ClientInfo {
        let now = Utc::now();
        ClientInfo {
            client_id: "client-1".into(),
            auth_methods: vec![crate::app::models::oauth::ClientAuthMethod::None],
            secrets: vec![],
            keys: None,
            redirect_uris: vec![],
            post_logout_redirect_uris: vec![],
            notification_endpoint: None,
            token_delivery_mode: None,
            allowed_grant_types: vec!["authorization_code".into()],
            allowed_response_types: vec!["code".into()],
            allowed_scopes: vec!["openid".into()],
            allowed_resources: vec![],
            pkce_required: false,
            allow_plain_pkce: false,
            access_token_ttl_seconds: 3600,
            refresh_token_ttl_seconds: None,
            authorization_code_ttl_seconds: 60,
            refresh_token_reuse_allowed: false,
            subject_type: crate::app::models::oauth::SubjectType::Public,
            sector_identifier: None,
            id_token_signing_alg: "RS256".into(),
            offline_access_allowed: false,
            revoked: false,
            created_at: now,
            updated_at: now,
        }
    }
}
