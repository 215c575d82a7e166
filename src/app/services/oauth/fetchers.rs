use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::Value;

use crate::app::models::oauth::{is_par_request_uri, AuthorizeRequestParams, ClientInfo, ClientKeySource};
use crate::result::{OidcError, OidcResult};

use super::client_registry::ClientRegistry;
use super::http_fetcher::SecureHttpFetcher;
use super::par_service::ParService;

/// C8: an ordered chain of fetchers that successively rewrite the
/// authorize (or CIBA) request before validation (spec §4.3).
pub trait RequestFetcher: Send + Sync {
    fn fetch<'a>(
        &'a self,
        params: &'a mut AuthorizeRequestParams,
        require_par: bool,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = OidcResult<()>> + Send + 'a>>;
}

pub struct CompositeFetcher<'a> {
    fetchers: Vec<Box<dyn RequestFetcher + 'a>>,
}

impl<'a> CompositeFetcher<'a> {
    pub fn new(fetchers: Vec<Box<dyn RequestFetcher + 'a>>) -> Self {
        Self { fetchers }
    }

    pub async fn run(&self, params: &mut AuthorizeRequestParams, require_par: bool) -> OidcResult<()> {
        for fetcher in &self.fetchers {
            fetcher.fetch(params, require_par).await?;
        }
        Ok(())
    }
}

/// Consumes a PAR-stored request when `request_uri` carries the PAR
/// URN prefix; enforces the PAR-required policy otherwise.
pub struct PushedRequestFetcher<'a> {
    pub par_service: &'a ParService,
}

impl RequestFetcher for PushedRequestFetcher<'_> {
    fn fetch<'a>(
        &'a self,
        params: &'a mut AuthorizeRequestParams,
        require_par: bool,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = OidcResult<()>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(request_uri) = params.request_uri.clone() {
                if is_par_request_uri(&request_uri) {
                    let stored = self.par_service.consume(&request_uri, Utc::now())?;
                    *params = stored.params;
                    return Ok(());
                }
                return Ok(());
            }

            if require_par && params.request.is_none() {
                return Err(OidcError::invalid_request(
                    "this server requires pushed authorization requests",
                ));
            }
            Ok(())
        })
    }
}

/// Resolves a non-PAR absolute `request_uri` over HTTPS through the
/// SSRF-guarded fetcher, yielding a JWT request object (spec §4.3).
pub struct RequestUriFetcher<'a> {
    pub http: &'a SecureHttpFetcher,
}

impl RequestFetcher for RequestUriFetcher<'_> {
    fn fetch<'a>(
        &'a self,
        params: &'a mut AuthorizeRequestParams,
        _require_par: bool,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = OidcResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let Some(request_uri) = params.request_uri.clone() else {
                return Ok(());
            };
            if is_par_request_uri(&request_uri) {
                return Ok(());
            }
            if params.request.is_some() {
                return Err(OidcError::invalid_request("request and request_uri are mutually exclusive"));
            }

            let jwt = self.http.fetch_text(&request_uri).await?;
            params.request = Some(jwt);
            params.request_uri = None;
            Ok(())
        })
    }
}

/// Validates and deep-merges a JWT request object into the request,
/// with JWT claims taking precedence (spec §4.3).
pub struct RequestObjectFetcher<'a, R: ClientRegistry> {
    pub registry: &'a R,
    pub http: &'a SecureHttpFetcher,
}

impl<R: ClientRegistry> RequestFetcher for RequestObjectFetcher<'_, R> {
    fn fetch<'a>(
        &'a self,
        params: &'a mut AuthorizeRequestParams,
        _require_par: bool,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = OidcResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let Some(jwt) = params.request.clone() else {
                return Ok(());
            };

            let client_id = params
                .client_id
                .clone()
                .ok_or_else(|| OidcError::invalid_request("client_id is required to resolve a request object"))?;
            let client = self
                .registry
                .find_by_id(&client_id)
                .ok_or_else(|| OidcError::invalid_client("unknown client"))?;

            let claims = verify_request_object(&client, &jwt, self.http).await?;
            merge_claims_into_params(params, claims);
            params.request = None;
            Ok(())
        })
    }
}

async fn verify_request_object(client: &ClientInfo, jwt: &str, http: &SecureHttpFetcher) -> OidcResult<Value> {
    let jwks = match &client.keys {
        Some(ClientKeySource::Jwks(inline)) => inline.clone(),
        Some(ClientKeySource::JwksUri(uri)) => http.fetch_json(uri).await?,
        None => return Err(OidcError::invalid_request_object("client has no registered keys")),
    };

    let keys = jwks
        .get("keys")
        .and_then(|k| k.as_array())
        .ok_or_else(|| OidcError::invalid_request_object("malformed client JWKS document"))?;

    for jwk in keys {
        let Some(key) = jwk_to_decoding_key(jwk) else { continue };
        let mut strict = Validation::new(Algorithm::RS256);
        strict.algorithms = vec![Algorithm::RS256, Algorithm::ES256, Algorithm::PS256];
        if let Ok(data) = jsonwebtoken::decode::<Value>(jwt, &key, &strict) {
            return Ok(data.claims);
        }
    }

    Err(OidcError::invalid_request_object("request object signature did not verify against client JWKS"))
}

fn jwk_to_decoding_key(jwk: &Value) -> Option<DecodingKey> {
    match jwk.get("kty")?.as_str()? {
        "RSA" => DecodingKey::from_rsa_components(jwk.get("n")?.as_str()?, jwk.get("e")?.as_str()?).ok(),
        "EC" => DecodingKey::from_ec_components(jwk.get("x")?.as_str()?, jwk.get("y")?.as_str()?).ok(),
        _ => None,
    }
}

fn merge_claims_into_params(params: &mut AuthorizeRequestParams, claims: Value) {
    macro_rules! merge_str {
        ($field:ident) => {
            if let Some(v) = claims.get(stringify!($field)).and_then(|v| v.as_str()) {
                params.$field = Some(v.to_string());
            }
        };
    }
    merge_str!(response_type);
    merge_str!(client_id);
    merge_str!(redirect_uri);
    merge_str!(scope);
    merge_str!(state);
    merge_str!(response_mode);
    merge_str!(nonce);
    merge_str!(code_challenge);
    merge_str!(code_challenge_method);
    merge_str!(prompt);
    merge_str!(acr_values);
    merge_str!(login_hint);
    merge_str!(id_token_hint);

    if let Some(max_age) = claims.get("max_age").and_then(|v| v.as_i64()) {
        params.max_age = Some(max_age);
    }
    if let Some(claims_param) = claims.get("claims").cloned() {
        params.claims = Some(claims_param);
    }
    if let Some(resources) = claims.get("resource").and_then(|v| v.as_array()) {
        params.resource = resources.iter().filter_map(|r| r.as_str().map(String::from)).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_claims_overrides_matching_fields() {
        let mut params = AuthorizeRequestParams {
            scope: Some("openid".to_string()),
            ..Default::default()
        };
        merge_claims_into_params(&mut params, serde_json::json!({"scope": "openid profile", "nonce": "n-1"}));
        assert_eq!(params.scope.as_deref(), Some("openid profile"));
        assert_eq!(params.nonce.as_deref(), Some("n-1"));
    }
}
