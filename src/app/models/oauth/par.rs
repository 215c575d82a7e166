use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::context::AuthorizeRequestParams;

pub const PAR_URN_PREFIX: &str = "urn:ietf:params:oauth:request_uri:";

/// A fully-validated authorization request stashed under an opaque URN
/// for later single-use retrieval by the authorize endpoint (spec §3
/// "PushedAuthorizationRequest", §4.5 "Pushed Authorization Request
/// handler").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushedAuthorizationRequest {
    pub client_id: String,
    pub params: AuthorizeRequestParams,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PushedAuthorizationRequest {
    pub fn new(
        client_id: impl Into<String>,
        params: AuthorizeRequestParams,
        created_at: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            params,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub fn format_request_uri(urn_suffix: &str) -> String {
    format!("{PAR_URN_PREFIX}{urn_suffix}")
}

pub fn is_par_request_uri(candidate: &str) -> bool {
    candidate.starts_with(PAR_URN_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uri_carries_par_prefix() {
        let uri = format_request_uri("abc123");
        assert!(is_par_request_uri(&uri));
        assert_eq!(uri, "urn:ietf:params:oauth:request_uri:abc123");
    }

    #[test]
    fn expiry_follows_ttl() {
        let now = Utc::now();
        let par = PushedAuthorizationRequest::new(
            "client-1",
            AuthorizeRequestParams::default(),
            now,
            chrono::Duration::seconds(90),
        );
        assert!(!par.is_expired(now));
        assert!(par.is_expired(now + chrono::Duration::seconds(91)));
    }
}
