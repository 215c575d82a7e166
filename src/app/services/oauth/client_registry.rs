use std::sync::Arc;

use crate::app::models::oauth::ClientInfo;

use super::storage::EntityStore;

/// Lookup boundary C2 authenticates against. Production deployments back
/// this with Postgres/Redis the way the host app's `ClientService` backs
/// onto Diesel; this crate ships the in-memory reference implementation.
pub trait ClientRegistry: Send + Sync {
    fn find_by_id(&self, client_id: &str) -> Option<ClientInfo>;
}

#[derive(Default)]
pub struct InMemoryClientRegistry {
    clients: Arc<EntityStore<ClientInfo>>,
}

impl InMemoryClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, client: ClientInfo) {
        self.clients.put(
            client.client_id.clone(),
            client,
            chrono::Utc::now(),
            chrono::Duration::days(3650),
        );
    }
}

impl ClientRegistry for InMemoryClientRegistry {
    fn find_by_id(&self, client_id: &str) -> Option<ClientInfo> {
        self.clients.get(client_id, chrono::Utc::now())
    }
}

impl<T: ClientRegistry + ?Sized> ClientRegistry for Arc<T> {
    fn find_by_id(&self, client_id: &str) -> Option<ClientInfo> {
        (**self).find_by_id(client_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::oauth::{ClientAuthMethod, SubjectType};

    fn sample(client_id: &str) -> ClientInfo {
        let now = chrono::Utc::now();
        ClientInfo {
            client_id: client_id.to_string(),
            auth_methods: vec![ClientAuthMethod::None],
            secrets: vec![],
            keys: None,
            redirect_uris: vec![],
            post_logout_redirect_uris: vec![],
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
    fn registered_client_is_findable() {
        let registry = InMemoryClientRegistry::new();
        registry.register(sample("client-1"));
        assert!(registry.find_by_id("client-1").is_some());
        assert!(registry.find_by_id("missing").is_none());
    }
}
