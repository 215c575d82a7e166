use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Client authentication methods a registered client may present on the
/// wire (spec §4.2). A client presenting more than one in a single
/// request is rejected by the authenticator with `invalid_request`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
    None,
    ClientSecretBasic,
    ClientSecretPost,
    ClientSecretJwt,
    PrivateKeyJwt,
    TlsClientAuth,
    SelfSignedTlsClientAuth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    Public,
    Pairwise,
}

/// Token-delivery mode a CIBA-enabled client has registered for
/// (spec §4.8, §3 "BackChannelAuthenticationRequest").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CibaDeliveryMode {
    Poll,
    Ping,
    Push,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PkceMethod {
    Plain,
    S256,
}

/// A client secret with a validity window, so rotation does not require
/// invalidating in-flight requests signed with the previous secret.
///
/// `hash` is the Argon2 PHC string checked by `client_secret_basic` and
/// `client_secret_post`. `hmac_key` holds the same secret in the raw,
/// reproducible form `client_secret_jwt` needs: HMAC verification is a
/// symmetric operation, so the key used to check a client's signature
/// must be the exact bytes the client signed with, which a salted
/// one-way hash can never reproduce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSecret {
    pub hash: String,
    pub hmac_key: Vec<u8>,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
}

impl ClientSecret {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        let after_start = match self.not_before {
            Some(nb) => now >= nb,
            None => true,
        };
        let before_end = match self.not_after {
            Some(na) => now < na,
            None => true,
        };
        after_start && before_end
    }
}

/// Where a client's signing/encryption keys live: inline in registration
/// metadata, or behind a JWKS URI the core fetches through the
/// SSRF-guarded HTTP fetcher (C16).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientKeySource {
    Jwks(serde_json::Value),
    JwksUri(String),
}

/// Immutable per-client descriptor (spec §3 "ClientInfo"). Every field
/// here is fixed at registration time; policy decisions at request time
/// only ever read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: String,
    pub auth_methods: Vec<ClientAuthMethod>,
    pub secrets: Vec<ClientSecret>,
    pub keys: Option<ClientKeySource>,
    pub redirect_uris: Vec<String>,
    pub post_logout_redirect_uris: Vec<String>,
    pub notification_endpoint: Option<String>,
    pub token_delivery_mode: Option<CibaDeliveryMode>,
    pub allowed_grant_types: Vec<String>,
    pub allowed_response_types: Vec<String>,
    pub allowed_scopes: Vec<String>,
    pub allowed_resources: Vec<String>,
    pub pkce_required: bool,
    pub allow_plain_pkce: bool,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: Option<i64>,
    pub authorization_code_ttl_seconds: i64,
    pub refresh_token_reuse_allowed: bool,
    pub subject_type: SubjectType,
    pub sector_identifier: Option<String>,
    pub id_token_signing_alg: String,
    pub offline_access_allowed: bool,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClientInfo {
    /// Redirect-URI matching is exact: scheme and host case-insensitive,
    /// path case-sensitive, no trailing-slash relaxation, fragment
    /// ignored (spec §3 invariant).
    pub fn is_valid_redirect_uri(&self, candidate: &str) -> bool {
        self.redirect_uris
            .iter()
            .any(|registered| redirect_uris_match(registered, candidate))
    }

    pub fn is_valid_post_logout_redirect_uri(&self, candidate: &str) -> bool {
        self.post_logout_redirect_uris
            .iter()
            .any(|registered| redirect_uris_match(registered, candidate))
    }

    pub fn supports_grant_type(&self, grant_type: &str) -> bool {
        self.allowed_grant_types.iter().any(|g| g == grant_type)
    }

    pub fn supports_response_type(&self, response_type: &str) -> bool {
        self.allowed_response_types.iter().any(|r| r == response_type)
    }

    pub fn supports_auth_method(&self, method: ClientAuthMethod) -> bool {
        self.auth_methods.contains(&method)
    }

    pub fn allowed_scope_set(&self) -> HashSet<String> {
        self.allowed_scopes.iter().cloned().collect()
    }

    pub fn active_secrets(&self, now: DateTime<Utc>) -> impl Iterator<Item = &ClientSecret> {
        self.secrets.iter().filter(move |s| s.is_active(now))
    }

    pub fn is_usable(&self) -> bool {
        !self.revoked
    }
}

fn redirect_uris_match(registered: &str, candidate: &str) -> bool {
    let (Ok(registered_url), Ok(candidate_url)) = (
        url::Url::parse(strip_fragment(registered)),
        url::Url::parse(strip_fragment(candidate)),
    ) else {
        return registered == candidate;
    };

    registered_url.scheme().eq_ignore_ascii_case(candidate_url.scheme())
        && registered_url.host_str().map(|h| h.to_ascii_lowercase())
            == candidate_url.host_str().map(|h| h.to_ascii_lowercase())
        && registered_url.port_or_known_default() == candidate_url.port_or_known_default()
        && registered_url.path() == candidate_url.path()
        && registered_url.query() == candidate_url.query()
}

fn strip_fragment(uri: &str) -> &str {
    uri.split('#').next().unwrap_or(uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_client() -> ClientInfo {
        let now = Utc::now();
        ClientInfo {
            client_id: "client-1".into(),
            auth_methods: vec![ClientAuthMethod::ClientSecretBasic],
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

    #[test]
    fn redirect_uri_matches_exactly_ignoring_fragment() {
        let client = sample_client();
        assert!(client.is_valid_redirect_uri("https://client.example/cb"));
        assert!(client.is_valid_redirect_uri("https://CLIENT.example/cb#ignored"));
        assert!(!client.is_valid_redirect_uri("https://client.example/cb/"));
        assert!(!client.is_valid_redirect_uri("https://client.example/CB"));
    }

    #[test]
    fn secret_active_only_within_validity_window() {
        let now = Utc::now();
        let secret = ClientSecret {
            hash: "hash".into(),
            hmac_key: b"raw-secret".to_vec(),
            not_before: Some(now + chrono::Duration::hours(1)),
            not_after: None,
        };
        assert!(!secret.is_active(now));
        assert!(secret.is_active(now + chrono::Duration::hours(2)));
    }
}
