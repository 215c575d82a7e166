pub mod authorization_code;
pub mod ciba;
pub mod client_credentials;
pub mod jwt_bearer;
pub mod refresh_token;

use serde::{Deserialize, Serialize};

use crate::app::models::oauth::{AuthorizedGrant, ClientInfo};
use crate::result::OidcResult;

/// Wire-level token request fields (spec §4.6/§4.7). Not every grant
/// type uses every field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub resource: Vec<String>,
    pub auth_req_id: Option<String>,
    pub assertion: Option<String>,
}

/// C12: every grant handler resolves a `TokenRequest` plus the already
/// -authenticated client into an `AuthorizedGrant` (spec §4.7).
pub trait GrantHandler: Send + Sync {
    fn grant_type(&self) -> &'static str;
    fn authorize(&self, request: &TokenRequest, client: &ClientInfo, now: chrono::DateTime<chrono::Utc>) -> OidcResult<AuthorizedGrant>;
}
