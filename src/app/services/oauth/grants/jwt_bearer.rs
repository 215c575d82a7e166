use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::app::models::oauth::{parse_scopes, AuthSession, AuthorizationContext, AuthorizedGrant, ClientInfo};
use crate::result::{OidcError, OidcResult};

use super::super::token_registry::TokenRegistry;
use super::{GrantHandler, TokenRequest};

/// A single trusted issuer the JWT-bearer grant will accept assertions
/// from, with the scopes that issuer is allowed to vouch for (spec
/// §4.7 "validate assertion against a trusted-issuer directory ...
/// scopes limited by issuer-config").
#[derive(Clone)]
pub struct TrustedIssuer {
    pub decoding_key: DecodingKey,
    pub algorithm: Algorithm,
    pub allowed_scopes: Vec<String>,
}

impl std::fmt::Debug for TrustedIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustedIssuer")
            .field("algorithm", &self.algorithm)
            .field("allowed_scopes", &self.allowed_scopes)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct TrustedIssuerDirectory {
    issuers: HashMap<String, TrustedIssuer>,
}

impl TrustedIssuerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, issuer: impl Into<String>, config: TrustedIssuer) {
        self.issuers.insert(issuer.into(), config);
    }

    pub fn get(&self, issuer: &str) -> Option<&TrustedIssuer> {
        self.issuers.get(issuer)
    }
}

#[derive(Debug, Deserialize)]
struct BearerAssertionClaims {
    iss: String,
    sub: String,
    jti: String,
    exp: i64,
    #[serde(default)]
    scope: Option<String>,
}

/// `urn:ietf:params:oauth:grant-type:jwt-bearer` (spec §4.7).
pub struct JwtBearerGrant {
    pub issuers: Arc<TrustedIssuerDirectory>,
    pub token_registry: Arc<TokenRegistry>,
}

impl GrantHandler for JwtBearerGrant {
    fn grant_type(&self) -> &'static str {
        "urn:ietf:params:oauth:grant-type:jwt-bearer"
    }

    fn authorize(&self, request: &TokenRequest, client: &ClientInfo, now: DateTime<Utc>) -> OidcResult<AuthorizedGrant> {
        let assertion = request
            .assertion
            .as_deref()
            .ok_or_else(|| OidcError::invalid_request("assertion is required"))?;

        let unverified_issuer = unverified_claim(assertion, "iss")
            .ok_or_else(|| OidcError::invalid_grant("assertion is missing iss"))?;
        let trusted = self
            .issuers
            .get(&unverified_issuer)
            .ok_or_else(|| OidcError::invalid_grant("assertion issuer is not trusted"))?;

        let mut validation = Validation::new(trusted.algorithm);
        validation.validate_aud = false;
        let claims = decode::<BearerAssertionClaims>(assertion, &trusted.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| OidcError::invalid_grant("assertion signature did not verify"))?;

        if now.timestamp() >= claims.exp {
            return Err(OidcError::invalid_grant("assertion has expired"));
        }
        if !self.token_registry.consume_assertion_jti(&claims.jti, DateTime::from_timestamp(claims.exp, 0).unwrap_or(now), now) {
            return Err(OidcError::invalid_grant("assertion has already been used"));
        }

        let requested = request.scope.as_deref().or(claims.scope.as_deref()).map(parse_scopes).unwrap_or_default();
        let issuer_allowed: std::collections::HashSet<String> = trusted.allowed_scopes.iter().cloned().collect();
        let scopes = if requested.is_empty() { issuer_allowed } else { requested.intersection(&issuer_allowed).cloned().collect() };

        let session = AuthSession::new(claims.sub, format!("jwt-bearer:{}", claims.jti), now, claims.iss);
        let context = AuthorizationContext::new(client.client_id.clone(), scopes, String::new());
        Ok(AuthorizedGrant::new(session, context))
    }
}

/// Reads a single claim without verifying the signature, only to select
/// which trusted issuer's key should verify it next.
fn unverified_claim(jwt: &str, claim: &str) -> Option<String> {
    let payload = jwt.split('.').nth(1)?;
    let bytes = base64::Engine::decode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, payload).ok()?;
    let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    value.get(claim)?.as_str().map(String::from)
}
