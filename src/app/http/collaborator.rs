use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::app::models::oauth::{AuthSession, AuthorizeRequestParams};
use crate::app::services::oauth::AuthenticationCollaborator;

/// Stand-in for the login/consent UI this crate deliberately does not
/// ship (spec §1 "user-device UI" is an external collaborator; no
/// end-user consent screens is a non-goal). Every request is treated as
/// unauthenticated, so `/connect/authorize` always resolves to
/// `InteractionRequired::Login` and the caller is responsible for
/// supplying a real collaborator backed by an actual session store.
pub struct NoInteractionCollaborator;

impl AuthenticationCollaborator for NoInteractionCollaborator {
    fn resolve_session(&self, _params: &AuthorizeRequestParams, _now: DateTime<Utc>) -> Option<AuthSession> {
        None
    }

    fn has_consented(&self, _session: &AuthSession, _client_id: &str, _scopes: &HashSet<String>) -> bool {
        false
    }
}
