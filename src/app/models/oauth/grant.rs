use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::context::AuthorizationContext;
use super::session::AuthSession;

/// A single issued token's identity, tracked so the reuse-prevention
/// decorator (spec §4.6) can revoke every token a replayed code or
/// refresh token ever produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenFingerprint {
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

/// Pair of (AuthSession, AuthorizationContext) plus whichever token
/// fingerprints have been issued against it so far (spec §3
/// "AuthorizedGrant"). Produced at authorization time; consumed and
/// mutated at the token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizedGrant {
    pub session: AuthSession,
    pub context: AuthorizationContext,
    pub issued_tokens: Vec<TokenFingerprint>,
}

impl AuthorizedGrant {
    pub fn new(session: AuthSession, context: AuthorizationContext) -> Self {
        Self {
            session,
            context,
            issued_tokens: Vec::new(),
        }
    }

    pub fn has_issued_tokens(&self) -> bool {
        !self.issued_tokens.is_empty()
    }

    pub fn record_issued_tokens(&mut self, tokens: impl IntoIterator<Item = TokenFingerprint>) {
        self.issued_tokens.extend(tokens);
    }

    pub fn issued_jtis(&self) -> Vec<String> {
        self.issued_tokens.iter().map(|t| t.jti.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn fresh_grant_has_no_issued_tokens() {
        let session = AuthSession::new("sub-1", "sess-1", Utc::now(), "idp");
        let context = AuthorizationContext::new("client-1", HashSet::new(), "https://client.example/cb");
        let grant = AuthorizedGrant::new(session, context);
        assert!(!grant.has_issued_tokens());
    }

    #[test]
    fn recording_tokens_accumulates_jtis() {
        let session = AuthSession::new("sub-1", "sess-1", Utc::now(), "idp");
        let context = AuthorizationContext::new("client-1", HashSet::new(), "https://client.example/cb");
        let mut grant = AuthorizedGrant::new(session, context);
        grant.record_issued_tokens(vec![TokenFingerprint {
            jti: "jti-1".into(),
            expires_at: Utc::now(),
        }]);
        assert_eq!(grant.issued_jtis(), vec!["jti-1".to_string()]);
        assert!(grant.has_issued_tokens());
    }
}
