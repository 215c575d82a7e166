use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use super::client::CibaDeliveryMode;
use super::grant::AuthorizedGrant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CibaStatus {
    Pending,
    Denied,
    Authenticated,
}

/// The slice of a client's registration a push-mode delivery needs to
/// mint tokens itself, captured at request-creation time so the
/// coordinator never has to look the client back up (spec §4.8 "Push
/// delivery").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CibaTokenParams {
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: Option<i64>,
    pub offline_access_allowed: bool,
}

/// Opaque `auth_req_id` → record (spec §3
/// "BackChannelAuthenticationRequest", §4.8). The grant carried here
/// starts with an empty `issued_tokens` list and is filled in by the
/// out-of-band device-authentication handler once the user
/// authenticates or denies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackChannelAuthenticationRequest {
    pub auth_req_id: String,
    pub grant: AuthorizedGrant,
    pub status: CibaStatus,
    pub expires_at: DateTime<Utc>,
    pub next_poll_at: DateTime<Utc>,
    pub interval_seconds: i64,
    pub notification_endpoint: Option<String>,
    pub notification_token: Option<String>,
    pub delivery_mode: CibaDeliveryMode,
    pub token_params: CibaTokenParams,
}

impl BackChannelAuthenticationRequest {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_before_next_poll(&self, now: DateTime<Utc>) -> bool {
        now < self.next_poll_at
    }

    pub fn advance_next_poll(&mut self, now: DateTime<Utc>) {
        self.next_poll_at = now + chrono::Duration::seconds(self.interval_seconds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::oauth::{context::AuthorizationContext, session::AuthSession};
    use std::collections::HashSet;

    fn sample(now: DateTime<Utc>) -> BackChannelAuthenticationRequest {
        let session = AuthSession::new("sub-1", "sess-1", now, "idp");
        let context = AuthorizationContext::new("client-1", HashSet::new(), "");
        BackChannelAuthenticationRequest {
            auth_req_id: "req-1".into(),
            grant: AuthorizedGrant::new(session, context),
            status: CibaStatus::Pending,
            expires_at: now + chrono::Duration::seconds(120),
            next_poll_at: now + chrono::Duration::seconds(5),
            interval_seconds: 5,
            notification_endpoint: None,
            notification_token: None,
            delivery_mode: CibaDeliveryMode::Poll,
            token_params: CibaTokenParams { access_token_ttl_seconds: 3600, refresh_token_ttl_seconds: None, offline_access_allowed: false },
        }
    }

    #[test]
    fn advancing_next_poll_pushes_out_by_interval() {
        let now = Utc::now();
        let mut req = sample(now);
        let before = req.next_poll_at;
        req.advance_next_poll(now);
        assert_eq!(req.next_poll_at, before);
        req.advance_next_poll(now + chrono::Duration::seconds(1));
        assert!(req.next_poll_at > before);
    }
}
