use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::token_registry::TokenRegistry;
use super::token_service::TokenService;

/// RFC 7662 `{active, scope, client_id, sub, exp, iat, aud, token_type}`,
/// or `{active: false}` with no further detail (spec §4.10).
#[derive(Debug, Clone, Serialize)]
pub struct IntrospectionResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<&'static str>,
}

impl IntrospectionResponse {
    fn inactive() -> Self {
        Self { active: false, scope: None, client_id: None, sub: None, exp: None, iat: None, aud: None, token_type: None }
    }
}

/// C14: caller authentication (confidential client / resource server)
/// is the transport layer's job; this service only ever needs the
/// already-parsed token (spec §4.10).
pub struct IntrospectionService {
    tokens: Arc<TokenService>,
    registry: Arc<TokenRegistry>,
}

impl IntrospectionService {
    pub fn new(tokens: Arc<TokenService>, registry: Arc<TokenRegistry>) -> Self {
        Self { tokens, registry }
    }

    pub fn introspect(&self, token: &str, now: DateTime<Utc>) -> IntrospectionResponse {
        if let Ok(claims) = self.tokens.decode_access_token(token) {
            if !self.is_live(&claims.jti, claims.exp, now) {
                return IntrospectionResponse::inactive();
            }
            return IntrospectionResponse {
                active: true,
                scope: Some(claims.scope),
                client_id: Some(claims.client_id),
                sub: Some(claims.sub),
                exp: Some(claims.exp),
                iat: Some(claims.iat),
                aud: Some(claims.aud),
                token_type: Some("access_token"),
            };
        }

        if let Ok(claims) = self.tokens.decode_refresh_token(token) {
            if !self.is_live(&claims.jti, claims.exp, now) {
                return IntrospectionResponse::inactive();
            }
            return IntrospectionResponse {
                active: true,
                scope: Some(claims.scope),
                client_id: Some(claims.client_id),
                sub: Some(claims.sub),
                exp: Some(claims.exp),
                iat: Some(claims.iat),
                aud: None,
                token_type: Some("refresh_token"),
            };
        }

        IntrospectionResponse::inactive()
    }

    fn is_live(&self, jti: &str, exp: i64, now: DateTime<Utc>) -> bool {
        now.timestamp() < exp && self.registry.is_active(jti, now)
    }
}
