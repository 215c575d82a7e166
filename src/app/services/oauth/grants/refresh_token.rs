use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::app::models::oauth::{parse_scopes, AuthSession, AuthorizationContext, AuthorizedGrant};
use crate::result::{OidcError, OidcResult};

use super::super::token_registry::TokenRegistry;
use super::super::token_service::TokenService;
use super::{GrantHandler, TokenRequest};
use crate::app::models::oauth::ClientInfo;

/// `refresh_token` (spec §4.7). Rotation is handled by the token
/// handler (C11) once this grant hands back a fresh `AuthorizedGrant`;
/// this handler is only responsible for validating the presented token.
pub struct RefreshTokenGrant {
    pub tokens: Arc<TokenService>,
    pub token_registry: Arc<TokenRegistry>,
}

impl GrantHandler for RefreshTokenGrant {
    fn grant_type(&self) -> &'static str {
        "refresh_token"
    }

    fn authorize(&self, request: &TokenRequest, client: &ClientInfo, now: DateTime<Utc>) -> OidcResult<AuthorizedGrant> {
        let token = request
            .refresh_token
            .as_deref()
            .ok_or_else(|| OidcError::invalid_request("refresh_token is required"))?;

        let claims = self.tokens.decode_refresh_token(token)?;

        if claims.client_id != client.client_id {
            return Err(OidcError::invalid_grant("refresh token was not issued to this client"));
        }
        if !self.token_registry.is_active(&claims.jti, now) {
            return Err(OidcError::invalid_grant("refresh token has been revoked or already used"));
        }
        if now.timestamp() >= claims.exp {
            return Err(OidcError::invalid_grant("refresh token has expired"));
        }

        let session = AuthSession::new(&claims.sub, &claims.grant_fingerprint, now, "refresh_token");
        let scopes = parse_scopes(&claims.scope);
        let context = AuthorizationContext::new(claims.client_id.clone(), scopes, String::new());
        let mut grant = AuthorizedGrant::new(session, context);
        // Carries the presented token's own fingerprint back to the token
        // handler's rotation decorator (spec §4.6 "Refresh-token
        // rotation") — unrelated to the authorization_code decorator's
        // replay-detection use of this same list.
        grant.issued_tokens.push(crate::app::models::oauth::TokenFingerprint {
            jti: claims.jti,
            expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or(now),
        });
        Ok(grant)
    }
}
