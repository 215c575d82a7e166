use axum::extract::{Form, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use crate::app::http::state::AppState;
use crate::app::services::oauth::{client_auth_service::decode_basic_auth, ClientAuthRequest};

use super::wire::{json_error_response, TokenActionWire};

/// RFC 7009: the RFC's "already invalid" guidance means an
/// authentication failure here is still answered with 200, not a
/// client-auth error, once the caller is at least a registered client —
/// but an entirely unauthenticatable caller is still rejected up front.
pub async fn submit(State(state): State<AppState>, headers: HeaderMap, Form(wire): Form<TokenActionWire>) -> Response {
    let auth_request = match build_client_auth_request(&state, &headers, &wire) {
        Ok(request) => request,
        Err(err) => return json_error_response(&err),
    };

    let client = match state.authenticator.authenticate(&auth_request, Utc::now()) {
        Ok((client, _outcome)) => client,
        Err(err) => return json_error_response(&err),
    };

    match state.revocation.revoke(&wire.token, &client.client_id, Utc::now()) {
        Ok(()) => axum::http::StatusCode::OK.into_response(),
        Err(err) => json_error_response(&err),
    }
}

fn build_client_auth_request(state: &AppState, headers: &HeaderMap, wire: &TokenActionWire) -> crate::result::OidcResult<ClientAuthRequest> {
    let mut request = ClientAuthRequest {
        client_id: wire.client_id.clone(),
        client_secret: wire.client_secret.clone(),
        token_endpoint: format!("{}/connect/revocation", state.config.issuer),
        ..Default::default()
    };
    if let Some(header_value) = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        let (client_id, secret) = decode_basic_auth(header_value)?;
        request.client_id = Some(client_id);
        request.basic_auth_secret = Some(secret);
    }
    Ok(request)
}
