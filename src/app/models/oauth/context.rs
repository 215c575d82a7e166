use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Raw/merged authorization request fields as assembled by the C8
/// fetcher chain and progressively narrowed by the C9 validator chain
/// (spec §4.3, §4.4). Optional fields are optional on the wire; the
/// validators are responsible for turning absence into defaults or
/// errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizeRequestParams {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub response_mode: Option<String>,
    pub nonce: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub resource: Vec<String>,
    pub prompt: Option<String>,
    pub max_age: Option<i64>,
    pub acr_values: Option<String>,
    pub claims: Option<serde_json::Value>,
    pub request: Option<String>,
    pub request_uri: Option<String>,
    pub login_hint: Option<String>,
    pub id_token_hint: Option<String>,
}

/// Immutable once produced by the validator chain (spec §3
/// "AuthorizationContext"). Read by the token endpoint to reconcile a
/// later request's scopes/resources against what was actually granted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationContext {
    pub client_id: String,
    pub scopes: HashSet<String>,
    pub resources: Vec<String>,
    pub claims: Option<serde_json::Value>,
    pub nonce: Option<String>,
    pub pairwise: bool,
    pub sector_identifier: Option<String>,
    pub redirect_uri: String,
}

impl AuthorizationContext {
    pub fn new(
        client_id: impl Into<String>,
        scopes: HashSet<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            scopes,
            resources: Vec::new(),
            claims: None,
            nonce: None,
            pairwise: false,
            sector_identifier: None,
            redirect_uri: redirect_uri.into(),
        }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    pub fn scope_string(&self) -> String {
        let mut scopes: Vec<&str> = self.scopes.iter().map(|s| s.as_str()).collect();
        scopes.sort_unstable();
        scopes.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_string_is_sorted_and_space_separated() {
        let mut scopes = HashSet::new();
        scopes.insert("profile".to_string());
        scopes.insert("openid".to_string());
        let ctx = AuthorizationContext::new("client-1", scopes, "https://client.example/cb");
        assert_eq!(ctx.scope_string(), "openid profile");
    }
}
