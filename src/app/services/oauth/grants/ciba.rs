use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::app::models::oauth::{AuthorizedGrant, ClientInfo};
use crate::result::{OidcError, OidcResult};

use super::super::ciba_service::CibaCoordinator;
use super::{GrantHandler, TokenRequest};

/// `urn:openid:params:grant-type:ciba` (spec §4.7, §4.8). Delegates the
/// state-dependent response entirely to the coordinator's token-endpoint
/// state table.
pub struct CibaGrant {
    pub coordinator: Arc<CibaCoordinator>,
}

impl GrantHandler for CibaGrant {
    fn grant_type(&self) -> &'static str {
        "urn:openid:params:grant-type:ciba"
    }

    fn authorize(&self, request: &TokenRequest, client: &ClientInfo, now: DateTime<Utc>) -> OidcResult<AuthorizedGrant> {
        let auth_req_id = request
            .auth_req_id
            .as_deref()
            .ok_or_else(|| OidcError::invalid_request("auth_req_id is required"))?;
        self.coordinator.poll_token_endpoint(auth_req_id, &client.client_id, now)
    }
}
