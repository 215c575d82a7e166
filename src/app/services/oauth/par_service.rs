use chrono::{DateTime, Utc};
use rand::RngCore;

use crate::app::models::oauth::{format_request_uri, PushedAuthorizationRequest};
use crate::result::{OidcError, OidcResult};

use super::storage::EntityStore;

/// C6: stores a fully-validated authorize request under a fresh,
/// single-use URN (spec §3 "PushedAuthorizationRequest", §4.5 "Pushed
/// Authorization Request handler").
#[derive(Default)]
pub struct ParService {
    store: EntityStore<PushedAuthorizationRequest>,
}

pub const DEFAULT_PAR_TTL_SECONDS: i64 = 90;

impl ParService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, request: PushedAuthorizationRequest, now: DateTime<Utc>) -> String {
        let mut suffix = [0u8; 24];
        rand::thread_rng().fill_bytes(&mut suffix);
        let urn = format_request_uri(&hex::encode(suffix));
        let ttl = (request.expires_at - now).max(chrono::Duration::zero());
        self.store.put(urn.clone(), request, now, ttl);
        urn
    }

    /// Consumed once from the authorize endpoint (spec §3 "Consumed
    /// once"); the URN is removed whether or not it was expired.
    pub fn consume(&self, request_uri: &str, now: DateTime<Utc>) -> OidcResult<PushedAuthorizationRequest> {
        let record = self
            .store
            .take(request_uri, now)
            .ok_or_else(|| OidcError::invalid_request_uri("request_uri is unknown, expired, or already used"))?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::oauth::AuthorizeRequestParams;

    #[test]
    fn pushed_request_is_consumed_exactly_once() {
        let service = ParService::new();
        let now = Utc::now();
        let request = PushedAuthorizationRequest::new(
            "client-1",
            AuthorizeRequestParams::default(),
            now,
            chrono::Duration::seconds(DEFAULT_PAR_TTL_SECONDS),
        );
        let urn = service.push(request, now);
        assert!(service.consume(&urn, now).is_ok());
        assert!(service.consume(&urn, now).is_err());
    }
}
