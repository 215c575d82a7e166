use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::client::PkceMethod;
use super::grant::AuthorizedGrant;

/// What C7 stores under the opaque authorization code (spec §3
/// "AuthorizationCode", §4.11). The code string itself is the storage
/// key, never a field here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCodeRecord {
    pub grant: AuthorizedGrant,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<PkceMethod>,
}

impl AuthorizationCodeRecord {
    pub fn new(grant: AuthorizedGrant) -> Self {
        Self {
            grant,
            code_challenge: None,
            code_challenge_method: None,
        }
    }

    pub fn with_pkce(mut self, challenge: String, method: PkceMethod) -> Self {
        self.code_challenge = Some(challenge);
        self.code_challenge_method = Some(method);
        self
    }

    pub fn requires_pkce(&self) -> bool {
        self.code_challenge.is_some()
    }

    /// Verifies `code_verifier` against the stored challenge (spec
    /// §4.7 authorization_code handler).
    pub fn verify_pkce(&self, verifier: &str) -> bool {
        match (&self.code_challenge, self.code_challenge_method) {
            (Some(challenge), Some(PkceMethod::S256)) => {
                let mut hasher = Sha256::new();
                hasher.update(verifier.as_bytes());
                let computed = URL_SAFE_NO_PAD.encode(hasher.finalize());
                computed == *challenge
            }
            (Some(challenge), Some(PkceMethod::Plain)) => verifier == challenge,
            (None, None) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::oauth::{context::AuthorizationContext, session::AuthSession};
    use chrono::Utc;
    use std::collections::HashSet;

    fn sample_record(challenge: String, method: PkceMethod) -> AuthorizationCodeRecord {
        let session = AuthSession::new("sub-1", "sess-1", Utc::now(), "idp");
        let context = AuthorizationContext::new("client-1", HashSet::new(), "https://client.example/cb");
        AuthorizationCodeRecord::new(AuthorizedGrant::new(session, context)).with_pkce(challenge, method)
    }

    #[test]
    fn s256_pkce_verifies_against_sha256_digest() {
        let verifier = "a-very-random-code-verifier-value-0123456789";
        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        let challenge = URL_SAFE_NO_PAD.encode(hasher.finalize());
        let record = sample_record(challenge, PkceMethod::S256);
        assert!(record.verify_pkce(verifier));
        assert!(!record.verify_pkce("wrong-verifier"));
    }

    #[test]
    fn no_challenge_requires_no_verifier() {
        let session = AuthSession::new("sub-1", "sess-1", Utc::now(), "idp");
        let context = AuthorizationContext::new("client-1", HashSet::new(), "https://client.example/cb");
        let record = AuthorizationCodeRecord::new(AuthorizedGrant::new(session, context));
        assert!(!record.requires_pkce());
        assert!(record.verify_pkce("anything"));
    }
}
