use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::app::models::oauth::{ClientAuthMethod, ClientInfo, ClientKeySource};
use crate::result::{OidcError, OidcResult};

use super::client_registry::ClientRegistry;
use super::mtls_service::{ClientCertificate, MtlsService};
use super::token_registry::TokenRegistry;

/// Inbound material an endpoint gathers off the wire before handing it
/// to C2 (spec §4.2). `resolved_jwks` is filled in by the caller after
/// running the client's `jwks_uri` through the SSRF-guarded fetcher
/// (C16); this service never performs its own outbound HTTP.
#[derive(Debug, Default)]
pub struct ClientAuthRequest {
    pub client_id: Option<String>,
    pub basic_auth_secret: Option<String>,
    pub client_secret: Option<String>,
    pub client_assertion_type: Option<String>,
    pub client_assertion: Option<String>,
    pub mtls_certificate: Option<ClientCertificate>,
    pub resolved_jwks: Option<serde_json::Value>,
    pub token_endpoint: String,
}

impl ClientAuthRequest {
    fn methods_attempted(&self) -> usize {
        [
            self.basic_auth_secret.is_some(),
            self.client_secret.is_some(),
            self.client_assertion.is_some(),
            self.mtls_certificate.is_some(),
        ]
        .into_iter()
        .filter(|b| *b)
        .count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientAuthOutcome {
    pub client_id: String,
    pub method: ClientAuthMethod,
}

pub trait ClientAuthenticator: Send + Sync {
    fn authenticate(&self, request: &ClientAuthRequest, now: DateTime<Utc>) -> OidcResult<(ClientInfo, ClientAuthOutcome)>;
}

/// C2: `authenticate(request) -> Result<ClientInfo, OidcError>`,
/// generalizing the host app's `ClientAuthService` static-method shape
/// onto a registry trait instead of a raw `DbPool`.
pub struct DefaultClientAuthenticator<R: ClientRegistry> {
    registry: R,
    token_registry: std::sync::Arc<TokenRegistry>,
}

impl<R: ClientRegistry> DefaultClientAuthenticator<R> {
    pub fn new(registry: R, token_registry: std::sync::Arc<TokenRegistry>) -> Self {
        Self { registry, token_registry }
    }

    fn resolve_client(&self, client_id: &str) -> OidcResult<ClientInfo> {
        let client = self
            .registry
            .find_by_id(client_id)
            .ok_or_else(|| OidcError::invalid_client("unknown client"))?;
        if !client.is_usable() {
            return Err(OidcError::invalid_client("client is revoked"));
        }
        Ok(client)
    }

    fn verify_secret(&self, client: &ClientInfo, provided: &str, now: DateTime<Utc>) -> OidcResult<()> {
        use argon2::{
            password_hash::{PasswordHash, PasswordVerifier},
            Argon2,
        };

        let argon2 = Argon2::default();
        let matched = client.active_secrets(now).any(|secret| {
            PasswordHash::new(&secret.hash)
                .map(|parsed| argon2.verify_password(provided.as_bytes(), &parsed).is_ok())
                .unwrap_or(false)
        });

        if matched {
            Ok(())
        } else {
            Err(OidcError::invalid_client("invalid client credentials"))
        }
    }

    fn decoding_keys(&self, client: &ClientInfo, request: &ClientAuthRequest) -> OidcResult<Vec<DecodingKey>> {
        let jwks = match (&request.resolved_jwks, &client.keys) {
            (Some(resolved), _) => resolved.clone(),
            (None, Some(ClientKeySource::Jwks(inline))) => inline.clone(),
            (None, Some(ClientKeySource::JwksUri(_))) => {
                return Err(OidcError::invalid_client("client JWKS was not resolved before authentication"));
            }
            (None, None) => return Err(OidcError::invalid_client("client has no registered keys")),
        };

        let keys = jwks
            .get("keys")
            .and_then(|k| k.as_array())
            .ok_or_else(|| OidcError::invalid_client("malformed client JWKS document"))?;

        keys.iter()
            .filter_map(jwk_to_decoding_key)
            .map(Ok)
            .collect()
    }

    fn verify_jwt_assertion(
        &self,
        client: &ClientInfo,
        assertion: &str,
        keys: Vec<DecodingKey>,
        algorithms: &[Algorithm],
        token_endpoint: &str,
        now: DateTime<Utc>,
    ) -> OidcResult<()> {
        let mut validation = Validation::new(algorithms.first().copied().unwrap_or(Algorithm::RS256));
        validation.algorithms = algorithms.to_vec();
        validation.set_audience(&[token_endpoint]);
        validation.set_required_spec_claims(&["iss", "sub", "aud", "exp", "jti"]);

        let mut last_err = None;
        for key in keys {
            match jsonwebtoken::decode::<serde_json::Value>(assertion, &key, &validation) {
                Ok(token_data) => {
                    let claims = token_data.claims;
                    let iss = claims.get("iss").and_then(|v| v.as_str()).unwrap_or("");
                    let sub = claims.get("sub").and_then(|v| v.as_str()).unwrap_or("");
                    if iss != client.client_id || sub != client.client_id {
                        return Err(OidcError::invalid_client("assertion iss/sub must equal client_id"));
                    }
                    let jti = claims
                        .get("jti")
                        .and_then(|v| v.as_str())
                        .ok_or_else(|| OidcError::invalid_client("assertion missing jti"))?;
                    let exp = claims
                        .get("exp")
                        .and_then(|v| v.as_i64())
                        .ok_or_else(|| OidcError::invalid_client("assertion missing exp"))?;
                    let expires_at = DateTime::from_timestamp(exp, 0).unwrap_or(now);
                    if !self.token_registry.consume_assertion_jti(jti, expires_at, now) {
                        return Err(OidcError::invalid_client("assertion jti has already been used"));
                    }
                    return Ok(());
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(OidcError::invalid_client(format!(
            "client assertion verification failed: {}",
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    fn authenticate_client_secret_jwt(
        &self,
        client: &ClientInfo,
        assertion: &str,
        token_endpoint: &str,
        now: DateTime<Utc>,
    ) -> OidcResult<()> {
        let keys: Vec<DecodingKey> = client
            .active_secrets(now)
            .map(|s| DecodingKey::from_secret(&s.hmac_key))
            .collect();
        if keys.is_empty() {
            return Err(OidcError::invalid_client("client has no active secret for HMAC assertion"));
        }
        self.verify_jwt_assertion(
            client,
            assertion,
            keys,
            &[Algorithm::HS256, Algorithm::HS384, Algorithm::HS512],
            token_endpoint,
            now,
        )
    }
}

impl<R: ClientRegistry> ClientAuthenticator for DefaultClientAuthenticator<R> {
    fn authenticate(&self, request: &ClientAuthRequest, now: DateTime<Utc>) -> OidcResult<(ClientInfo, ClientAuthOutcome)> {
        if request.methods_attempted() > 1 {
            return Err(OidcError::invalid_request("client attempted more than one authentication method"));
        }

        if let Some(assertion) = &request.client_assertion {
            if request.client_assertion_type.as_deref()
                != Some("urn:ietf:params:oauth:client-assertion-type:jwt-bearer")
            {
                return Err(OidcError::invalid_request("unsupported client_assertion_type"));
            }
            let client_id = extract_assertion_subject(assertion)?;
            let client = self.resolve_client(&client_id)?;
            let has_secret_method = client.supports_auth_method(ClientAuthMethod::ClientSecretJwt);
            let has_key_method = client.supports_auth_method(ClientAuthMethod::PrivateKeyJwt);

            if has_secret_method
                && self
                    .authenticate_client_secret_jwt(&client, assertion, &request.token_endpoint, now)
                    .is_ok()
            {
                return Ok((
                    client.clone(),
                    ClientAuthOutcome { client_id: client.client_id.clone(), method: ClientAuthMethod::ClientSecretJwt },
                ));
            }
            if has_key_method {
                let keys = self.decoding_keys(&client, request)?;
                self.verify_jwt_assertion(
                    &client,
                    assertion,
                    keys,
                    &[Algorithm::RS256, Algorithm::ES256, Algorithm::PS256],
                    &request.token_endpoint,
                    now,
                )?;
                return Ok((
                    client.clone(),
                    ClientAuthOutcome { client_id: client.client_id.clone(), method: ClientAuthMethod::PrivateKeyJwt },
                ));
            }
            return Err(OidcError::invalid_client("client is not registered for JWT assertion authentication"));
        }

        if let Some(certificate) = &request.mtls_certificate {
            let client_id = request
                .client_id
                .clone()
                .ok_or_else(|| OidcError::invalid_request("client_id is required for mTLS authentication"))?;
            let client = self.resolve_client(&client_id)?;
            if !MtlsService::client_supports_mtls(&client.auth_methods) {
                return Err(OidcError::invalid_client("client is not registered for mTLS authentication"));
            }
            let method = if client.supports_auth_method(ClientAuthMethod::SelfSignedTlsClientAuth) {
                let registered = client
                    .sector_identifier
                    .as_deref()
                    .unwrap_or_default();
                if !MtlsService::validate_thumbprint(certificate, registered) {
                    return Err(OidcError::invalid_client("client certificate thumbprint mismatch"));
                }
                ClientAuthMethod::SelfSignedTlsClientAuth
            } else {
                ClientAuthMethod::TlsClientAuth
            };
            return Ok((client.clone(), ClientAuthOutcome { client_id: client.client_id.clone(), method }));
        }

        if let Some(secret) = request.basic_auth_secret.as_ref().or(request.client_secret.as_ref()) {
            let client_id = request
                .client_id
                .clone()
                .ok_or_else(|| OidcError::invalid_request("client_id is required"))?;
            let client = self.resolve_client(&client_id)?;
            self.verify_secret(&client, secret, now)?;
            let method = if request.basic_auth_secret.is_some() {
                ClientAuthMethod::ClientSecretBasic
            } else {
                ClientAuthMethod::ClientSecretPost
            };
            if !client.supports_auth_method(method) {
                return Err(OidcError::invalid_client("client is not registered for this authentication method"));
            }
            return Ok((client.clone(), ClientAuthOutcome { client_id: client.client_id.clone(), method }));
        }

        let client_id = request
            .client_id
            .clone()
            .ok_or_else(|| OidcError::invalid_request("client_id is required"))?;
        let client = self.resolve_client(&client_id)?;
        if !client.supports_auth_method(ClientAuthMethod::None) {
            return Err(OidcError::invalid_client("client authentication is required"));
        }
        Ok((client.clone(), ClientAuthOutcome { client_id: client.client_id.clone(), method: ClientAuthMethod::None }))
    }
}

pub fn decode_basic_auth(header_value: &str) -> OidcResult<(String, String)> {
    let encoded = header_value
        .strip_prefix("Basic ")
        .ok_or_else(|| OidcError::invalid_request("Authorization header must use the Basic scheme"))?;
    let decoded = STANDARD
        .decode(encoded)
        .map_err(|_| OidcError::invalid_request("invalid base64 in Basic auth header"))?;
    let credentials = String::from_utf8(decoded)
        .map_err(|_| OidcError::invalid_request("invalid UTF-8 in Basic auth header"))?;
    let mut parts = credentials.splitn(2, ':');
    let client_id = parts.next().unwrap_or_default().to_string();
    let secret = parts.next().unwrap_or_default().to_string();
    Ok((client_id, secret))
}

pub fn hash_client_secret(secret: &str) -> anyhow::Result<String> {
    use argon2::{
        password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
        Argon2,
    };

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("secret hashing failed: {e}"))
}

pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

fn extract_assertion_subject(jwt: &str) -> OidcResult<String> {
    let mut parts = jwt.split('.');
    let _header = parts.next();
    let payload = parts
        .next()
        .ok_or_else(|| OidcError::invalid_client("malformed client assertion"))?;
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| OidcError::invalid_client("malformed client assertion payload"))?;
    let claims: serde_json::Value = serde_json::from_slice(&decoded)
        .map_err(|_| OidcError::invalid_client("client assertion payload is not valid JSON"))?;
    claims
        .get("sub")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| OidcError::invalid_client("client assertion missing sub claim"))
}

fn jwk_to_decoding_key(jwk: &serde_json::Value) -> Option<DecodingKey> {
    let kty = jwk.get("kty")?.as_str()?;
    match kty {
        "RSA" => {
            let n = jwk.get("n")?.as_str()?;
            let e = jwk.get("e")?.as_str()?;
            DecodingKey::from_rsa_components(n, e).ok()
        }
        "EC" => {
            let x = jwk.get("x")?.as_str()?;
            let y = jwk.get("y")?.as_str()?;
            DecodingKey::from_ec_components(x, y).ok()
        }
        _ => None,
    }
}
