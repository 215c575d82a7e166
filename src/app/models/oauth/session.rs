use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An authenticated end-user, or a client acting for itself under
/// client-credentials (spec §3 "AuthSession"). Produced by an
/// out-of-band user-device authentication handler external to this
/// crate; mutated only by recording which clients have since relied on
/// it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub subject: String,
    pub session_id: String,
    pub authenticated_at: DateTime<Utc>,
    pub identity_provider: String,
    pub acr: Option<String>,
    pub amr: Vec<String>,
    pub affected_clients: HashSet<String>,
}

impl AuthSession {
    pub fn new(
        subject: impl Into<String>,
        session_id: impl Into<String>,
        authenticated_at: DateTime<Utc>,
        identity_provider: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            session_id: session_id.into(),
            authenticated_at,
            identity_provider: identity_provider.into(),
            acr: None,
            amr: Vec::new(),
            affected_clients: HashSet::new(),
        }
    }

    /// Synthesized session for the `client_credentials` grant: no end
    /// user, subject is the client id itself (spec §4.7).
    pub fn for_client_credentials(client_id: &str, now: DateTime<Utc>) -> Self {
        let mut session = Self::new(client_id, client_id, now, "client_credentials");
        session.affected_clients.insert(client_id.to_string());
        session
    }

    pub fn record_affected_client(&mut self, client_id: impl Into<String>) {
        self.affected_clients.insert(client_id.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_credentials_session_marks_client_as_affected() {
        let session = AuthSession::for_client_credentials("client-1", Utc::now());
        assert_eq!(session.subject, "client-1");
        assert!(session.affected_clients.contains("client-1"));
    }
}
