use crate::app::models::oauth::ClientInfo;
use crate::result::{OidcError, OidcResult};

/// C15: RP-initiated logout (OpenID Connect RP-Initiated Logout 1.0).
/// Session teardown itself (clearing the IdP's own session cookie) is
/// the transport layer's job; this service only decides whether the
/// requested post-logout redirect is trustworthy.
pub struct EndSessionService;

#[derive(Debug, Clone)]
pub struct EndSessionRequest {
    pub id_token_hint: Option<String>,
    pub post_logout_redirect_uri: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone)]
pub enum EndSessionOutcome {
    /// No post-logout redirect was requested, or it could not be
    /// trusted; the transport layer shows its own confirmation page.
    ShowConfirmation,
    Redirect(String),
}

impl EndSessionService {
    pub fn new() -> Self {
        Self
    }

    /// `client` is `None` when the hint could not be resolved to a
    /// registered client (or no hint was given); an empty hint is
    /// treated as absent (spec §8 "Boundary behaviors").
    pub fn handle(&self, request: &EndSessionRequest, client: Option<&ClientInfo>) -> OidcResult<EndSessionOutcome> {
        let hint_present = request.id_token_hint.as_deref().is_some_and(|h| !h.is_empty());

        let Some(redirect_uri) = &request.post_logout_redirect_uri else {
            return Ok(EndSessionOutcome::ShowConfirmation);
        };

        let Some(client) = client else {
            if hint_present {
                return Err(OidcError::invalid_request("id_token_hint did not resolve to a registered client"));
            }
            return Ok(EndSessionOutcome::ShowConfirmation);
        };

        if !client.is_valid_post_logout_redirect_uri(redirect_uri) {
            return Err(OidcError::invalid_request("post_logout_redirect_uri is not registered for this client"));
        }

        let mut target = redirect_uri.clone();
        if let Some(state) = &request.state {
            let separator = if target.contains('?') { '&' } else { '?' };
            target = format!("{target}{separator}state={}", urlencoding::encode(state));
        }
        Ok(EndSessionOutcome::Redirect(target))
    }
}

impl Default for EndSessionService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::oauth::{ClientAuthMethod, SubjectType};
    use chrono::Utc;

    fn sample_client() -> ClientInfo {
        let now = Utc::now();
        ClientInfo {
            client_id: "client-1".into(),
            auth_methods: vec![ClientAuthMethod::None],
            secrets: vec![],
            keys: None,
            redirect_uris: vec![],
            post_logout_redirect_uris: vec!["https://client.example/logged-out".into()],
            notification_endpoint: None,
            token_delivery_mode: None,
            allowed_grant_types: vec![],
            allowed_response_types: vec![],
            allowed_scopes: vec![],
            allowed_resources: vec![],
            pkce_required: false,
            allow_plain_pkce: false,
            access_token_ttl_seconds: 3600,
            refresh_token_ttl_seconds: None,
            authorization_code_ttl_seconds: 60,
            refresh_token_reuse_allowed: false,
            subject_type: SubjectType::Public,
            sector_identifier: None,
            id_token_signing_alg: "RS256".into(),
            offline_access_allowed: false,
            revoked: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn no_redirect_uri_shows_confirmation() {
        let service = EndSessionService::new();
        let request = EndSessionRequest { id_token_hint: None, post_logout_redirect_uri: None, state: None };
        assert!(matches!(service.handle(&request, None).unwrap(), EndSessionOutcome::ShowConfirmation));
    }

    #[test]
    fn registered_redirect_uri_is_honored() {
        let service = EndSessionService::new();
        let client = sample_client();
        let request = EndSessionRequest {
            id_token_hint: Some("hint".into()),
            post_logout_redirect_uri: Some("https://client.example/logged-out".into()),
            state: Some("s1".into()),
        };
        match service.handle(&request, Some(&client)).unwrap() {
            EndSessionOutcome::Redirect(url) => assert_eq!(url, "https://client.example/logged-out?state=s1"),
            _ => panic!("expected a redirect"),
        }
    }

    #[test]
    fn unregistered_redirect_uri_is_rejected() {
        let service = EndSessionService::new();
        let client = sample_client();
        let request = EndSessionRequest {
            id_token_hint: None,
            post_logout_redirect_uri: Some("https://evil.example/".into()),
            state: None,
        };
        assert!(service.handle(&request, Some(&client)).is_err());
    }

    #[test]
    fn empty_id_token_hint_is_treated_as_absent() {
        let service = EndSessionService::new();
        let request = EndSessionRequest { id_token_hint: Some(String::new()), post_logout_redirect_uri: None, state: None };
        assert!(matches!(service.handle(&request, None).unwrap(), EndSessionOutcome::ShowConfirmation));
    }
}
