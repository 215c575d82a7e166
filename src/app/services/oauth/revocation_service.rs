use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::result::OidcResult;

use super::token_registry::TokenRegistry;
use super::token_service::TokenService;

/// RFC 7009: accepts any token; if it parses as a known access or
/// refresh token issued to the calling client, its `jti` is marked
/// Revoked with TTL = remaining lifetime. Anything else — a malformed
/// token, or one issued to a different client — is silently accepted
/// per the RFC's "already invalid" guidance (spec §4.10).
pub struct RevocationService {
    tokens: Arc<TokenService>,
    registry: Arc<TokenRegistry>,
}

impl RevocationService {
    pub fn new(tokens: Arc<TokenService>, registry: Arc<TokenRegistry>) -> Self {
        Self { tokens, registry }
    }

    pub fn revoke(&self, token: &str, requesting_client_id: &str, now: DateTime<Utc>) -> OidcResult<()> {
        if let Ok(claims) = self.tokens.decode_access_token(token) {
            if claims.client_id == requesting_client_id {
                let expires_at = DateTime::from_timestamp(claims.exp, 0).unwrap_or(now);
                self.registry.mark_revoked(&claims.jti, expires_at, now);
            }
            return Ok(());
        }
        if let Ok(claims) = self.tokens.decode_refresh_token(token) {
            if claims.client_id == requesting_client_id {
                let expires_at = DateTime::from_timestamp(claims.exp, 0).unwrap_or(now);
                self.registry.mark_revoked(&claims.jti, expires_at, now);
            }
            return Ok(());
        }
        Ok(())
    }
}
