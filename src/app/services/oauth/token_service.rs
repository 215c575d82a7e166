use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sha2::{Digest, Sha256, Sha384, Sha512};
use uuid::Uuid;

use crate::app::models::oauth::{AccessTokenClaims, IdTokenClaims, RefreshTokenClaims};
use crate::result::{OidcError, OidcResult};

/// C5: mints and verifies the three JWT families the core issues
/// (spec §4.9). Signing is HMAC-backed in this reference
/// implementation — the server's symmetric signing secret, not a
/// per-client key; client-presented `id_token_signing_alg` only governs
/// what algorithm family an RP asked for at registration and is
/// reconciled by the discovery surface, outside this service.
pub struct TokenService {
    issuer: String,
    signing_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    server_salt: String,
}

impl TokenService {
    pub fn new(issuer: impl Into<String>, signing_secret: &str, server_salt: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            signing_key: EncodingKey::from_secret(signing_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(signing_secret.as_bytes()),
            algorithm: Algorithm::HS256,
            server_salt: server_salt.into(),
        }
    }

    pub fn new_jti() -> String {
        Uuid::new_v4().to_string()
    }

    /// Stable pairwise subject: hash(sector identifier, subject, server
    /// salt), per spec §4.9.
    pub fn pairwise_subject(&self, sector_identifier: &str, subject: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(sector_identifier.as_bytes());
        hasher.update(b"|");
        hasher.update(subject.as_bytes());
        hasher.update(b"|");
        hasher.update(self.server_salt.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }

    pub fn effective_subject(&self, sector_identifier: Option<&str>, pairwise: bool, subject: &str) -> String {
        match (pairwise, sector_identifier) {
            (true, Some(sector)) => self.pairwise_subject(sector, subject),
            _ => subject.to_string(),
        }
    }

    pub fn issue_access_token(
        &self,
        subject: &str,
        client_id: &str,
        scope: &str,
        aud: Vec<String>,
        jti: &str,
        now: DateTime<Utc>,
        ttl_seconds: i64,
    ) -> OidcResult<String> {
        let claims = AccessTokenClaims {
            iss: self.issuer.clone(),
            sub: subject.to_string(),
            aud,
            client_id: client_id.to_string(),
            scope: scope.to_string(),
            jti: jti.to_string(),
            iat: now.timestamp(),
            exp: (now + chrono::Duration::seconds(ttl_seconds)).timestamp(),
        };
        self.encode(&claims)
    }

    pub fn issue_refresh_token(
        &self,
        subject: &str,
        client_id: &str,
        scope: &str,
        grant_fingerprint: &str,
        jti: &str,
        now: DateTime<Utc>,
        ttl_seconds: i64,
    ) -> OidcResult<String> {
        let claims = RefreshTokenClaims {
            iss: self.issuer.clone(),
            sub: subject.to_string(),
            client_id: client_id.to_string(),
            scope: scope.to_string(),
            grant_fingerprint: grant_fingerprint.to_string(),
            jti: jti.to_string(),
            iat: now.timestamp(),
            exp: (now + chrono::Duration::seconds(ttl_seconds)).timestamp(),
            typ: RefreshTokenClaims::TOKEN_TYPE.to_string(),
        };
        self.encode(&claims)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn issue_id_token(
        &self,
        subject: &str,
        client_id: &str,
        now: DateTime<Utc>,
        auth_time: DateTime<Utc>,
        ttl_seconds: i64,
        nonce: Option<String>,
        acr: Option<String>,
        amr: Vec<String>,
        code: Option<&str>,
        access_token: Option<&str>,
    ) -> OidcResult<String> {
        let claims = IdTokenClaims {
            iss: self.issuer.clone(),
            sub: subject.to_string(),
            aud: client_id.to_string(),
            iat: now.timestamp(),
            exp: (now + chrono::Duration::seconds(ttl_seconds)).timestamp(),
            auth_time: auth_time.timestamp(),
            nonce,
            acr,
            amr,
            at_hash: access_token.map(|t| self.left_half_hash(t)),
            c_hash: code.map(|c| self.left_half_hash(c)),
            extra_claims: serde_json::Map::new(),
        };
        self.encode(&claims)
    }

    /// Base64url of the leftmost half of the digest matching the signing
    /// algorithm's bit-length, per OpenID Core `at_hash`/`c_hash`.
    fn left_half_hash(&self, value: &str) -> String {
        let digest: Vec<u8> = match self.algorithm {
            Algorithm::HS384 | Algorithm::RS384 | Algorithm::ES384 | Algorithm::PS384 => {
                Sha384::digest(value.as_bytes()).to_vec()
            }
            Algorithm::HS512 | Algorithm::RS512 | Algorithm::PS512 => Sha512::digest(value.as_bytes()).to_vec(),
            _ => Sha256::digest(value.as_bytes()).to_vec(),
        };
        let half = &digest[..digest.len() / 2];
        URL_SAFE_NO_PAD.encode(half)
    }

    fn encode<T: serde::Serialize>(&self, claims: &T) -> OidcResult<String> {
        encode(&Header::new(self.algorithm), claims, &self.signing_key)
            .map_err(|e| OidcError::server_error(format!("token signing failed: {e}")))
    }

    pub fn decode_access_token(&self, token: &str) -> OidcResult<AccessTokenClaims> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_aud = false;
        decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| OidcError::invalid_grant("access token is malformed or has an invalid signature"))
    }

    pub fn decode_refresh_token(&self, token: &str) -> OidcResult<RefreshTokenClaims> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_aud = false;
        let claims = decode::<RefreshTokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| OidcError::invalid_grant("refresh token is malformed or has an invalid signature"))?;
        if !claims.is_refresh_token() {
            return Err(OidcError::invalid_grant("token is not a refresh token"));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("https://issuer.example", "test-signing-secret", "server-salt")
    }

    #[test]
    fn access_token_round_trips_through_decode() {
        let svc = service();
        let now = Utc::now();
        let token = svc
            .issue_access_token("sub-1", "client-1", "openid profile", vec!["https://api.example".into()], "jti-1", now, 3600)
            .unwrap();
        let claims = svc.decode_access_token(&token).unwrap();
        assert_eq!(claims.sub, "sub-1");
        assert_eq!(claims.jti, "jti-1");
    }

    #[test]
    fn refresh_token_rejects_non_refresh_typ() {
        let svc = service();
        let now = Utc::now();
        let access = svc
            .issue_access_token("sub-1", "client-1", "openid", vec![], "jti-1", now, 3600)
            .unwrap();
        assert!(svc.decode_refresh_token(&access).is_err());
    }

    #[test]
    fn pairwise_subject_is_stable_for_same_inputs() {
        let svc = service();
        let a = svc.pairwise_subject("sector-1", "sub-1");
        let b = svc.pairwise_subject("sector-1", "sub-1");
        let c = svc.pairwise_subject("sector-2", "sub-1");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn at_hash_is_leftmost_half_of_sha256_digest() {
        let svc = service();
        let hash = svc.left_half_hash("an-access-token-value");
        let expected = URL_SAFE_NO_PAD.encode(&Sha256::digest("an-access-token-value".as_bytes())[..16]);
        assert_eq!(hash, expected);
    }
}
