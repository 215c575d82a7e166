use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::app::models::oauth::{AuthorizedGrant, ClientInfo};
use crate::result::{OidcError, OidcResult};

use super::super::auth_code_service::AuthorizationCodeService;
use super::super::token_registry::TokenRegistry;
use super::{GrantHandler, TokenRequest};

/// `authorization_code` (spec §4.7). The reuse-prevention decorator
/// (spec §4.6, §4.11) lives here rather than in the generic token
/// handler: a record coming back from C7 that already carries issued
/// tokens means this code has been consumed once already, so every
/// token it produced is revoked and the replay is rejected.
pub struct AuthorizationCodeGrant {
    pub codes: Arc<AuthorizationCodeService>,
    pub token_registry: Arc<TokenRegistry>,
}

impl GrantHandler for AuthorizationCodeGrant {
    fn grant_type(&self) -> &'static str {
        "authorization_code"
    }

    fn authorize(&self, request: &TokenRequest, client: &ClientInfo, now: DateTime<Utc>) -> OidcResult<AuthorizedGrant> {
        let code = request
            .code
            .as_deref()
            .ok_or_else(|| OidcError::invalid_request("code is required"))?;
        let redirect_uri = request
            .redirect_uri
            .as_deref()
            .ok_or_else(|| OidcError::invalid_request("redirect_uri is required"))?;

        let record = self.codes.consume(code, now)?;

        if record.grant.has_issued_tokens() {
            for fingerprint in &record.grant.issued_tokens {
                self.token_registry.mark_revoked(&fingerprint.jti, fingerprint.expires_at, now);
            }
            return Err(OidcError::invalid_grant("authorization code has already been used"));
        }

        if record.grant.context.redirect_uri != redirect_uri {
            return Err(OidcError::invalid_grant("redirect_uri does not match the authorization request"));
        }

        if record.requires_pkce() {
            let verifier = request
                .code_verifier
                .as_deref()
                .ok_or_else(|| OidcError::invalid_grant("code_verifier is required"))?;
            if !record.verify_pkce(verifier) {
                return Err(OidcError::invalid_grant("code_verifier does not match code_challenge"));
            }
        }

        if record.grant.context.client_id != client.client_id {
            return Err(OidcError::invalid_grant("authorization code was not issued to this client"));
        }

        Ok(record.grant)
    }
}
