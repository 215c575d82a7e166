use chrono::{DateTime, Utc};

use crate::app::models::oauth::{TokenStatus, TokenStatusRecord};

use super::storage::EntityStore;

/// C4: token status registry keyed by `jti` (spec §3 "Token status
/// record"). Absence of a record means Active. Also doubles as the
/// replay cache for `client_secret_jwt`/`private_key_jwt` assertions and
/// the JWT-bearer grant, both of which mark their assertion `jti` as
/// Used on first sight.
#[derive(Default)]
pub struct TokenRegistry {
    statuses: EntityStore<TokenStatusRecord>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, jti: &str, now: DateTime<Utc>) -> Option<TokenStatus> {
        self.statuses.get(jti, now).map(|r| r.status)
    }

    pub fn is_active(&self, jti: &str, now: DateTime<Utc>) -> bool {
        self.status(jti, now).is_none()
    }

    pub fn mark(&self, jti: &str, status: TokenStatus, expires_at: DateTime<Utc>, now: DateTime<Utc>) {
        let ttl = (expires_at - now).max(chrono::Duration::zero());
        self.statuses
            .put(jti, TokenStatusRecord::new(jti, status, expires_at), now, ttl);
    }

    pub fn mark_used(&self, jti: &str, expires_at: DateTime<Utc>, now: DateTime<Utc>) {
        self.mark(jti, TokenStatus::Used, expires_at, now);
    }

    pub fn mark_revoked(&self, jti: &str, expires_at: DateTime<Utc>, now: DateTime<Utc>) {
        self.mark(jti, TokenStatus::Revoked, expires_at, now);
    }

    /// Records an assertion `jti` as spent, returning `false` if it had
    /// already been seen (replay).
    pub fn consume_assertion_jti(&self, jti: &str, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        if !self.is_active(jti, now) {
            return false;
        }
        self.mark_used(jti, expires_at, now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_jti_is_active_until_marked() {
        let registry = TokenRegistry::new();
        let now = Utc::now();
        assert!(registry.is_active("jti-1", now));
        registry.mark_revoked("jti-1", now + chrono::Duration::hours(1), now);
        assert!(!registry.is_active("jti-1", now));
        assert_eq!(registry.status("jti-1", now), Some(TokenStatus::Revoked));
    }

    #[test]
    fn assertion_jti_can_only_be_consumed_once() {
        let registry = TokenRegistry::new();
        let now = Utc::now();
        let exp = now + chrono::Duration::minutes(5);
        assert!(registry.consume_assertion_jti("assertion-1", exp, now));
        assert!(!registry.consume_assertion_jti("assertion-1", exp, now));
    }
}
