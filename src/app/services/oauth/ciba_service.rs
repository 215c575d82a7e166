use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::RngCore;
use tokio::sync::broadcast;

use crate::app::models::oauth::{
    AuthSession, AuthorizationContext, AuthorizedGrant, BackChannelAuthenticationRequest, CibaDeliveryMode, CibaStatus,
    CibaTokenParams,
};
use crate::result::{OidcError, OidcResult};

use super::http_fetcher::SecureHttpFetcher;
use super::storage::EntityStore;
use super::token_handler::TokenResponse;
use super::token_service::TokenService;

pub const DEFAULT_REQUESTED_EXPIRY_SECONDS: i64 = 300;
pub const MAX_REQUESTED_EXPIRY_SECONDS: i64 = 1800;
pub const DEFAULT_POLLING_INTERVAL_SECONDS: i64 = 5;
const WAITER_CHANNEL_CAPACITY: usize = 4;

/// Signaled to every long-poll waiter on a Pending→{Authenticated,Denied}
/// transition (spec §4.8 "Long-polling waiters").
#[derive(Debug, Clone, Copy)]
pub struct CibaOutcome {
    pub status: CibaStatus,
}

/// C13: the CIBA coordinator. Owns the `auth_req_id → record` store and
/// the per-request waiter registry used for long-polling (spec §5 "CIBA
/// waiter discipline").
pub struct CibaCoordinator {
    store: EntityStore<BackChannelAuthenticationRequest>,
    waiters: DashMap<String, broadcast::Sender<CibaOutcome>>,
    tokens: Arc<TokenService>,
    http: Arc<SecureHttpFetcher>,
}

impl CibaCoordinator {
    pub fn new(tokens: Arc<TokenService>, http: Arc<SecureHttpFetcher>) -> Self {
        Self {
            store: EntityStore::new(),
            waiters: DashMap::new(),
            tokens,
            http,
        }
    }

    /// Step 3: generates `auth_req_id`, clamps `requested_expiry`, and
    /// stores a Pending record. Out-of-band user-device authentication
    /// is the caller's responsibility once this returns (spec §4.8
    /// step 3 "external collaborator").
    pub fn create(
        &self,
        session: AuthSession,
        context: AuthorizationContext,
        requested_expiry: Option<i64>,
        delivery_mode: CibaDeliveryMode,
        notification_endpoint: Option<String>,
        notification_token: Option<String>,
        token_params: CibaTokenParams,
        now: DateTime<Utc>,
    ) -> BackChannelAuthenticationRequest {
        let mut suffix = [0u8; 20];
        rand::thread_rng().fill_bytes(&mut suffix);
        let auth_req_id = hex::encode(suffix);

        let expiry_seconds = requested_expiry
            .unwrap_or(DEFAULT_REQUESTED_EXPIRY_SECONDS)
            .clamp(1, MAX_REQUESTED_EXPIRY_SECONDS);

        let record = BackChannelAuthenticationRequest {
            auth_req_id: auth_req_id.clone(),
            grant: AuthorizedGrant::new(session, context),
            status: CibaStatus::Pending,
            expires_at: now + chrono::Duration::seconds(expiry_seconds),
            next_poll_at: now + chrono::Duration::seconds(DEFAULT_POLLING_INTERVAL_SECONDS),
            interval_seconds: DEFAULT_POLLING_INTERVAL_SECONDS,
            notification_endpoint,
            notification_token,
            delivery_mode,
            token_params,
        };

        self.store
            .put(auth_req_id, record.clone(), now, chrono::Duration::seconds(expiry_seconds));
        record
    }

    pub fn find(&self, auth_req_id: &str, now: DateTime<Utc>) -> Option<BackChannelAuthenticationRequest> {
        self.store.get(auth_req_id, now)
    }

    /// Called by the external device-authentication collaborator once
    /// the user has responded. Signals any registered waiters and, for
    /// Ping/Push clients, actively notifies the client on Pending→
    /// Authenticated (spec §4.8 "Ping delivery"/"Push delivery") since
    /// those modes never poll the token endpoint themselves.
    pub async fn resolve(&self, auth_req_id: &str, authenticated: bool, now: DateTime<Utc>) -> OidcResult<()> {
        let new_status = if authenticated { CibaStatus::Authenticated } else { CibaStatus::Denied };
        let applied = self.store.mutate(auth_req_id, now, |record| {
            record.status = new_status;
        });
        if !applied {
            return Err(OidcError::invalid_grant("auth_req_id is unknown or expired"));
        }
        if let Some(sender) = self.waiters.get(auth_req_id) {
            let _ = sender.send(CibaOutcome { status: new_status });
        }

        if new_status == CibaStatus::Authenticated {
            if let Some(record) = self.store.get(auth_req_id, now) {
                match record.delivery_mode {
                    CibaDeliveryMode::Poll => {}
                    CibaDeliveryMode::Ping => self.deliver_ping(&record).await,
                    CibaDeliveryMode::Push => {
                        let token_response = self.build_push_token_response(&record, now)?;
                        let _ = self.deliver_push(&record, token_response, now).await;
                    }
                }
            }
        }
        Ok(())
    }

    /// Registers a waiter before re-checking current status, as spec §5
    /// requires to avoid a lost wakeup.
    fn register_waiter(&self, auth_req_id: &str) -> broadcast::Receiver<CibaOutcome> {
        self.waiters
            .entry(auth_req_id.to_string())
            .or_insert_with(|| broadcast::channel(WAITER_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    fn deregister_waiter_if_idle(&self, auth_req_id: &str) {
        if let Some(sender) = self.waiters.get(auth_req_id) {
            if sender.receiver_count() == 0 {
                drop(sender);
                self.waiters.remove(auth_req_id);
            }
        }
    }

    /// Long-polls for a terminal status up to `timeout`, self-expiring
    /// and deregistering promptly either way (spec §4.8, §5).
    pub async fn wait_for_terminal_status(&self, auth_req_id: &str, now: DateTime<Utc>, timeout: std::time::Duration) -> Option<CibaStatus> {
        let mut receiver = self.register_waiter(auth_req_id);
        let already = self.find(auth_req_id, now).map(|r| r.status);
        if let Some(status) = already {
            if status != CibaStatus::Pending {
                self.deregister_waiter_if_idle(auth_req_id);
                return Some(status);
            }
        }

        let result = tokio::select! {
            recv = receiver.recv() => recv.ok().map(|outcome| outcome.status),
            _ = tokio::time::sleep(timeout) => None,
        };
        self.deregister_waiter_if_idle(auth_req_id);
        result
    }

    /// Token-endpoint state table (spec §4.8). Returns the grant on
    /// `Authenticated`, the protocol error otherwise, and always applies
    /// the record mutation/removal the table calls for. `client_id` is
    /// checked before any mutation: unlike an authorization code, a
    /// `auth_req_id` is meant to be pollable repeatedly by its owner, so
    /// a wrong-client poll must not be able to burn the record out from
    /// under the legitimate client.
    pub fn poll_token_endpoint(&self, auth_req_id: &str, client_id: &str, now: DateTime<Utc>) -> OidcResult<AuthorizedGrant> {
        let Some(record) = self.store.get(auth_req_id, now) else {
            return Err(OidcError::invalid_grant("auth_req_id is unknown or expired"));
        };

        if record.grant.context.client_id != client_id {
            return Err(OidcError::invalid_grant("auth_req_id was not issued to this client"));
        }

        if record.is_expired(now) {
            self.store.remove(auth_req_id);
            return Err(OidcError::expired_token("backchannel authentication request has expired"));
        }

        match (record.status, record.delivery_mode) {
            (CibaStatus::Pending, CibaDeliveryMode::Push) => Err(OidcError::invalid_grant("push-mode clients must not poll")),
            (CibaStatus::Pending, _) if record.is_before_next_poll(now) => {
                self.store.mutate(auth_req_id, now, |r| r.advance_next_poll(now));
                Err(OidcError::slow_down("polling too frequently"))
            }
            (CibaStatus::Pending, _) => Err(OidcError::authorization_pending("the end user has not yet completed authentication")),
            (CibaStatus::Denied, _) => {
                self.store.remove(auth_req_id);
                Err(OidcError::access_denied("the end user denied the authentication request"))
            }
            (CibaStatus::Authenticated, CibaDeliveryMode::Poll) => {
                self.store.remove(auth_req_id);
                Ok(record.grant)
            }
            (CibaStatus::Authenticated, CibaDeliveryMode::Ping) => {
                self.store.remove(auth_req_id);
                Ok(record.grant)
            }
            (CibaStatus::Authenticated, CibaDeliveryMode::Push) => {
                Err(OidcError::invalid_grant("push-mode tokens are delivered out of band"))
            }
        }
    }

    /// Ping delivery: best-effort POST of `{auth_req_id}` to the
    /// client's notification endpoint (spec §4.8 "Ping delivery").
    /// Failures are logged but do not block the client from polling.
    pub async fn deliver_ping(&self, record: &BackChannelAuthenticationRequest) {
        let (Some(endpoint), Some(token)) = (&record.notification_endpoint, &record.notification_token) else {
            return;
        };
        let body = serde_json::json!({ "auth_req_id": record.auth_req_id });
        if let Err(err) = self.http.post_json(endpoint, &body, Some(token)).await {
            tracing::warn!(auth_req_id = %record.auth_req_id, error = %err, "CIBA ping delivery failed");
        }
    }

    /// Builds the full token response a push-mode client is owed, using
    /// the client's registration snapshot captured at request-creation
    /// time rather than looking the client back up (spec §4.8 "Push
    /// delivery"). The ID token is mandatory in push per CIBA.
    fn build_push_token_response(&self, record: &BackChannelAuthenticationRequest, now: DateTime<Utc>) -> OidcResult<serde_json::Value> {
        let grant = &record.grant;
        let params = record.token_params;
        let subject = self
            .tokens
            .effective_subject(grant.context.sector_identifier.as_deref(), grant.context.pairwise, &grant.session.subject);
        let scope_string = grant.context.scope_string();
        let aud = if grant.context.resources.is_empty() { vec![grant.context.client_id.clone()] } else { grant.context.resources.clone() };

        let access_jti = TokenService::new_jti();
        let access_token = self.tokens.issue_access_token(&subject, &grant.context.client_id, &scope_string, aud, &access_jti, now, params.access_token_ttl_seconds)?;

        let id_token = self.tokens.issue_id_token(
            &subject,
            &grant.context.client_id,
            now,
            grant.session.authenticated_at,
            params.access_token_ttl_seconds,
            grant.context.nonce.clone(),
            grant.session.acr.clone(),
            grant.session.amr.clone(),
            None,
            Some(&access_token),
        )?;

        let refresh_token = if grant.context.has_scope("offline_access") && params.offline_access_allowed {
            let ttl = params.refresh_token_ttl_seconds.unwrap_or(params.access_token_ttl_seconds * 24);
            let refresh_jti = TokenService::new_jti();
            Some(self.tokens.issue_refresh_token(&subject, &grant.context.client_id, &scope_string, &grant.session.session_id, &refresh_jti, now, ttl)?)
        } else {
            None
        };

        Ok(serde_json::to_value(TokenResponse {
            access_token,
            token_type: "Bearer",
            expires_in: params.access_token_ttl_seconds,
            scope: scope_string,
            refresh_token,
            id_token: Some(id_token),
        })
        .map_err(|e| OidcError::server_error(format!("failed to serialize push token response: {e}")))?)
    }

    /// Push delivery: POST the full token response; the record is
    /// removed either way since push tokens are delivered exactly once
    /// (spec §4.8 "Push delivery").
    pub async fn deliver_push(&self, record: &BackChannelAuthenticationRequest, token_response: serde_json::Value, now: DateTime<Utc>) -> OidcResult<()> {
        let Some(endpoint) = &record.notification_endpoint else {
            self.store.mutate(&record.auth_req_id, now, |r| r.status = CibaStatus::Denied);
            return Err(OidcError::invalid_client_metadata("push clients must register a notification endpoint"));
        };
        let token = record.notification_token.as_deref();
        let result = self.http.post_json(endpoint, &token_response, token).await;
        self.store.remove(&record.auth_req_id);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn coordinator() -> CibaCoordinator {
        let tokens = Arc::new(TokenService::new("https://issuer.example", "test-signing-secret", "server-salt"));
        // scheme-restricted so a delivery attempt against a non-https
        // notification endpoint fails in `validate` without touching
        // the network; tests that need a real delivery attempt use an
        // https endpoint and only assert on store-side effects.
        let http = Arc::new(SecureHttpFetcher::new(vec!["https".to_string()], true));
        CibaCoordinator::new(tokens, http)
    }

    fn sample_token_params() -> CibaTokenParams {
        CibaTokenParams { access_token_ttl_seconds: 3600, refresh_token_ttl_seconds: Some(86_400), offline_access_allowed: true }
    }

    fn sample_session_context() -> (AuthSession, AuthorizationContext) {
        let now = Utc::now();
        (
            AuthSession::new("sub-1", "sess-1", now, "idp"),
            AuthorizationContext::new("client-1", HashSet::from(["openid".to_string()]), ""),
        )
    }

    #[test]
    fn pending_before_next_poll_returns_slow_down() {
        let coordinator = coordinator();
        let now = Utc::now();
        let (session, context) = sample_session_context();
        let record = coordinator.create(session, context, None, CibaDeliveryMode::Poll, None, None, sample_token_params(), now);
        let err = coordinator.poll_token_endpoint(&record.auth_req_id, "client-1", now).unwrap_err();
        assert_eq!(err.error_code.as_str(), crate::result::ErrorCode::SLOW_DOWN);
    }

    #[test]
    fn pending_after_next_poll_returns_authorization_pending() {
        let coordinator = coordinator();
        let now = Utc::now();
        let (session, context) = sample_session_context();
        let record = coordinator.create(session, context, None, CibaDeliveryMode::Poll, None, None, sample_token_params(), now);
        let later = now + chrono::Duration::seconds(DEFAULT_POLLING_INTERVAL_SECONDS + 1);
        let err = coordinator.poll_token_endpoint(&record.auth_req_id, "client-1", later).unwrap_err();
        assert_eq!(err.error_code.as_str(), crate::result::ErrorCode::AUTHORIZATION_PENDING);
    }

    #[test]
    fn push_mode_pending_rejects_polling() {
        let coordinator = coordinator();
        let now = Utc::now();
        let (session, context) = sample_session_context();
        let record = coordinator.create(
            session,
            context,
            None,
            CibaDeliveryMode::Push,
            Some("https://client.example/notify".into()),
            Some("tok".into()),
            sample_token_params(),
            now,
        );
        let err = coordinator.poll_token_endpoint(&record.auth_req_id, "client-1", now).unwrap_err();
        assert_eq!(err.error_code.as_str(), crate::result::ErrorCode::INVALID_GRANT);
    }

    #[tokio::test]
    async fn authenticated_poll_issues_grant_and_removes_record() {
        let coordinator = coordinator();
        let now = Utc::now();
        let (session, context) = sample_session_context();
        let record = coordinator.create(session, context, None, CibaDeliveryMode::Poll, None, None, sample_token_params(), now);
        coordinator.resolve(&record.auth_req_id, true, now).await.unwrap();
        assert!(coordinator.poll_token_endpoint(&record.auth_req_id, "client-1", now).is_ok());
        assert!(coordinator.find(&record.auth_req_id, now).is_none());
    }

    #[tokio::test]
    async fn denied_request_is_removed_after_access_denied() {
        let coordinator = coordinator();
        let now = Utc::now();
        let (session, context) = sample_session_context();
        let record = coordinator.create(session, context, None, CibaDeliveryMode::Poll, None, None, sample_token_params(), now);
        coordinator.resolve(&record.auth_req_id, false, now).await.unwrap();
        let err = coordinator.poll_token_endpoint(&record.auth_req_id, "client-1", now).unwrap_err();
        assert_eq!(err.error_code.as_str(), crate::result::ErrorCode::ACCESS_DENIED);
        assert!(coordinator.find(&record.auth_req_id, now).is_none());
    }

    #[tokio::test]
    async fn wrong_client_poll_does_not_consume_an_authenticated_record() {
        let coordinator = coordinator();
        let now = Utc::now();
        let (session, context) = sample_session_context();
        let record = coordinator.create(session, context, None, CibaDeliveryMode::Poll, None, None, sample_token_params(), now);
        coordinator.resolve(&record.auth_req_id, true, now).await.unwrap();

        let err = coordinator.poll_token_endpoint(&record.auth_req_id, "attacker-client", now).unwrap_err();
        assert_eq!(err.error_code.as_str(), crate::result::ErrorCode::INVALID_GRANT);

        // the legitimate client's record must have survived the attacker's poll
        assert!(coordinator.poll_token_endpoint(&record.auth_req_id, "client-1", now).is_ok());
    }

    #[tokio::test]
    async fn waiter_is_signaled_on_resolve() {
        let coordinator = Arc::new(coordinator());
        let now = Utc::now();
        let (session, context) = sample_session_context();
        let record = coordinator.create(session, context, None, CibaDeliveryMode::Poll, None, None, sample_token_params(), now);

        let waiter_coordinator = coordinator.clone();
        let auth_req_id = record.auth_req_id.clone();
        let handle = tokio::spawn(async move {
            waiter_coordinator
                .wait_for_terminal_status(&auth_req_id, Utc::now(), std::time::Duration::from_secs(5))
                .await
        });

        tokio::task::yield_now().await;
        coordinator.resolve(&record.auth_req_id, true, now).await.unwrap();
        let status = handle.await.unwrap();
        assert_eq!(status, Some(CibaStatus::Authenticated));
    }

    #[tokio::test]
    async fn ping_delivery_does_not_consume_the_record() {
        let coordinator = coordinator();
        let now = Utc::now();
        let (session, context) = sample_session_context();
        // scheme not in the fetcher's allow-list, so the delivery
        // attempt fails validation without touching the network.
        let record = coordinator.create(
            session,
            context,
            None,
            CibaDeliveryMode::Ping,
            Some("http://client.example/notify".into()),
            Some("tok".into()),
            sample_token_params(),
            now,
        );
        coordinator.resolve(&record.auth_req_id, true, now).await.unwrap();

        // ping only notifies; the client still has to poll to redeem
        let found = coordinator.find(&record.auth_req_id, now).unwrap();
        assert_eq!(found.status, CibaStatus::Authenticated);
    }

    #[tokio::test]
    async fn push_delivery_removes_the_record_once_attempted() {
        let coordinator = coordinator();
        let now = Utc::now();
        let (session, context) = sample_session_context();
        let record = coordinator.create(
            session,
            context,
            None,
            CibaDeliveryMode::Push,
            Some("http://client.example/notify".into()),
            Some("tok".into()),
            sample_token_params(),
            now,
        );
        coordinator.resolve(&record.auth_req_id, true, now).await.unwrap();

        // push is the only delivery for this mode; the record is gone
        // whether or not the notification itself succeeded.
        assert!(coordinator.find(&record.auth_req_id, now).is_none());
    }

    #[tokio::test]
    async fn push_delivery_without_a_notification_endpoint_denies_the_request() {
        let coordinator = coordinator();
        let now = Utc::now();
        let (session, context) = sample_session_context();
        let record = coordinator.create(session, context, None, CibaDeliveryMode::Push, None, None, sample_token_params(), now);
        coordinator.resolve(&record.auth_req_id, true, now).await.unwrap();

        let found = coordinator.find(&record.auth_req_id, now).unwrap();
        assert_eq!(found.status, CibaStatus::Denied);
    }

    #[test]
    fn push_token_response_includes_mandatory_id_token_and_optional_refresh() {
        let coordinator = coordinator();
        let now = Utc::now();
        let mut context = AuthorizationContext::new("client-1", HashSet::from(["openid".to_string(), "offline_access".to_string()]), "");
        context.nonce = Some("nonce-1".into());
        let session = AuthSession::new("sub-1", "sess-1", now, "idp");
        let record = BackChannelAuthenticationRequest {
            auth_req_id: "req-1".into(),
            grant: AuthorizedGrant::new(session, context),
            status: CibaStatus::Authenticated,
            expires_at: now + chrono::Duration::seconds(120),
            next_poll_at: now,
            interval_seconds: 5,
            notification_endpoint: Some("https://client.example/notify".into()),
            notification_token: Some("tok".into()),
            delivery_mode: CibaDeliveryMode::Push,
            token_params: sample_token_params(),
        };

        let response = coordinator.build_push_token_response(&record, now).unwrap();
        assert!(response["access_token"].as_str().is_some());
        assert!(response["id_token"].as_str().is_some());
        assert!(response["refresh_token"].as_str().is_some());
    }
}
