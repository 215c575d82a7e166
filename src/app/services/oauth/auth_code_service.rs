use chrono::{DateTime, Utc};
use rand::RngCore;

use crate::app::models::oauth::AuthorizationCodeRecord;
use crate::result::{OidcError, OidcResult};

use super::storage::EntityStore;

/// C7: issues an opaque authorization code and stores `{code -> grant}`
/// with TTL = `client.authorizationCodeExpiresIn` (spec §4.11). Lookup
/// is consuming under the normal policy; the reuse-prevention decorator
/// (C11) re-inserts the grant for exactly one more lookup so a replay
/// can be detected.
#[derive(Default)]
pub struct AuthorizationCodeService {
    store: EntityStore<AuthorizationCodeRecord>,
}

/// ≥128 bits of entropy, URL-safe (spec §3 "AuthorizationCode").
const CODE_ENTROPY_BYTES: usize = 32;

impl AuthorizationCodeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, record: AuthorizationCodeRecord, now: DateTime<Utc>, ttl_seconds: i64) -> String {
        let mut bytes = [0u8; CODE_ENTROPY_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let code = base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes);
        self.store.put(code.clone(), record, now, chrono::Duration::seconds(ttl_seconds));
        code
    }

    /// Consuming lookup (spec §4.11 "Lookup MUST be consuming").
    pub fn consume(&self, code: &str, now: DateTime<Utc>) -> OidcResult<AuthorizationCodeRecord> {
        self.store
            .take(code, now)
            .ok_or_else(|| OidcError::invalid_grant("authorization code is unknown, expired, or already used"))
    }

    /// Re-inserts the grant for exactly one more lookup once tokens
    /// have been issued, so a replay of the same code can be detected
    /// and every issued token revoked (spec §4.11, §4.6 "reuse
    /// prevention decorator").
    pub fn retain_for_reuse_detection(
        &self,
        code: &str,
        record: AuthorizationCodeRecord,
        now: DateTime<Utc>,
        retention: chrono::Duration,
    ) {
        self.store.put(code.to_string(), record, now, retention);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::oauth::{AuthorizationContext, AuthorizedGrant, AuthSession};
    use std::collections::HashSet;

    fn sample_record() -> AuthorizationCodeRecord {
        let session = AuthSession::new("sub-1", "sess-1", Utc::now(), "idp");
        let context = AuthorizationContext::new("client-1", HashSet::new(), "https://client.example/cb");
        AuthorizationCodeRecord::new(AuthorizedGrant::new(session, context))
    }

    #[test]
    fn code_is_consumed_exactly_once() {
        let service = AuthorizationCodeService::new();
        let now = Utc::now();
        let code = service.issue(sample_record(), now, 60);
        assert!(service.consume(&code, now).is_ok());
        assert!(service.consume(&code, now).is_err());
    }

    #[test]
    fn retained_code_can_be_consumed_once_more_for_replay_detection() {
        let service = AuthorizationCodeService::new();
        let now = Utc::now();
        let code = service.issue(sample_record(), now, 60);
        let record = service.consume(&code, now).unwrap();
        service.retain_for_reuse_detection(&code, record, now, chrono::Duration::seconds(60));
        assert!(service.consume(&code, now).is_ok());
        assert!(service.consume(&code, now).is_err());
    }
}
