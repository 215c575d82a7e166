use std::collections::HashSet;

use axum::extract::{Form, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde::Serialize;

use crate::app::http::state::AppState;
use crate::app::models::oauth::{AuthSession, AuthorizationContext, CibaTokenParams};
use crate::app::services::oauth::{client_auth_service::decode_basic_auth, ClientAuthRequest};
use crate::result::OidcError;

use super::wire::{json_error_response, split_resources, CibaWire};

/// RFC/OpenID CIBA initiation (spec §4.8 step 3). Issues a Pending
/// record immediately; resolving it to Authenticated/Denied is the
/// out-of-band device-authentication collaborator's job, reached
/// through [`crate::app::services::oauth::CibaCoordinator::resolve`]
/// rather than through this HTTP surface.
#[derive(Debug, Serialize)]
struct CibaResponseBody {
    auth_req_id: String,
    expires_in: i64,
    interval: i64,
}

pub async fn submit(State(state): State<AppState>, headers: HeaderMap, Form(wire): Form<CibaWire>) -> Response {
    let hint = match wire.login_hint.clone().or_else(|| wire.id_token_hint.clone()) {
        Some(hint) => hint,
        None => return json_error_response(&OidcError::invalid_request("login_hint or id_token_hint is required")),
    };

    let auth_request = match build_client_auth_request(&state, &headers, &wire) {
        Ok(request) => request,
        Err(err) => return json_error_response(&err),
    };
    let client = match state.authenticator.authenticate(&auth_request, Utc::now()) {
        Ok((client, _outcome)) => client,
        Err(err) => return json_error_response(&err),
    };
    let Some(delivery_mode) = client.token_delivery_mode else {
        return json_error_response(&OidcError::invalid_client_metadata("client is not registered for CIBA"));
    };

    let now = Utc::now();
    let session = AuthSession::new(&hint, uuid::Uuid::new_v4().to_string(), now, "ciba");
    let scopes: HashSet<String> = wire.scope.split_whitespace().map(String::from).collect();
    let mut context = AuthorizationContext::new(client.client_id.clone(), scopes, "");
    context.resources = split_resources(wire.resource.as_deref());

    let token_params = CibaTokenParams {
        access_token_ttl_seconds: client.access_token_ttl_seconds,
        refresh_token_ttl_seconds: client.refresh_token_ttl_seconds,
        offline_access_allowed: client.offline_access_allowed,
    };
    let record = state.ciba.create(
        session,
        context,
        wire.requested_expiry,
        delivery_mode,
        client.notification_endpoint.clone(),
        wire.client_notification_token.clone(),
        token_params,
        now,
    );

    let expires_in = (record.expires_at - now).num_seconds().max(0);
    (StatusCode::OK, Json(CibaResponseBody { auth_req_id: record.auth_req_id, expires_in, interval: record.interval_seconds })).into_response()
}

fn build_client_auth_request(state: &AppState, headers: &HeaderMap, wire: &CibaWire) -> crate::result::OidcResult<ClientAuthRequest> {
    let mut request = ClientAuthRequest {
        client_id: wire.client_id.clone(),
        client_secret: wire.client_secret.clone(),
        client_assertion_type: wire.client_assertion_type.clone(),
        client_assertion: wire.client_assertion.clone(),
        token_endpoint: format!("{}/connect/ciba", state.config.issuer),
        ..Default::default()
    };
    if let Some(header_value) = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        let (client_id, secret) = decode_basic_auth(header_value)?;
        request.client_id = Some(client_id);
        request.basic_auth_secret = Some(secret);
    }
    Ok(request)
}
