use chrono::{DateTime, Utc};

use crate::app::models::oauth::{parse_scopes, AuthSession, AuthorizationContext, AuthorizedGrant, ClientInfo};
use crate::result::{OidcError, OidcResult};

use super::{GrantHandler, TokenRequest};

/// `client_credentials` (spec §4.7). No end user; the synthesized
/// session's subject is the client id itself.
pub struct ClientCredentialsGrant;

impl GrantHandler for ClientCredentialsGrant {
    fn grant_type(&self) -> &'static str {
        "client_credentials"
    }

    fn authorize(&self, request: &TokenRequest, client: &ClientInfo, now: DateTime<Utc>) -> OidcResult<AuthorizedGrant> {
        let requested = request.scope.as_deref().map(parse_scopes);
        let scopes = match requested {
            Some(requested) if !requested.is_empty() => {
                let allowed = client.allowed_scope_set();
                if !requested.is_subset(&allowed) {
                    return Err(OidcError::invalid_scope("requested scope exceeds what this client is allowed"));
                }
                requested
            }
            _ => client.allowed_scope_set(),
        };

        let session = AuthSession::for_client_credentials(&client.client_id, now);
        let context = AuthorizationContext::new(client.client_id.clone(), scopes, String::new());
        Ok(AuthorizedGrant::new(session, context))
    }
}
