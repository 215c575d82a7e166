use axum::extract::{Form, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;

use crate::app::http::state::AppState;
use crate::app::services::oauth::{client_auth_service::decode_basic_auth, ClientAuthRequest, MtlsService};

use super::wire::{json_error_response, TokenWire};

pub async fn submit(State(state): State<AppState>, headers: HeaderMap, Form(wire): Form<TokenWire>) -> Response {
    let auth_request = match build_client_auth_request(&state, &headers, &wire) {
        Ok(request) => request,
        Err(err) => return json_error_response(&err),
    };
    let token_request = wire.into();

    match state.token_handler.handle(&auth_request, &token_request, Utc::now()) {
        Ok(response) => Json(response).into_response(),
        Err(err) => json_error_response(&err),
    }
}

fn build_client_auth_request(
    state: &AppState,
    headers: &HeaderMap,
    wire: &TokenWire,
) -> crate::result::OidcResult<ClientAuthRequest> {
    let mtls_certificate = MtlsService::extract_client_certificate(headers)?;

    let mut request = ClientAuthRequest {
        client_id: wire.client_id.clone(),
        client_secret: wire.client_secret.clone(),
        client_assertion_type: wire.client_assertion_type.clone(),
        client_assertion: wire.client_assertion.clone(),
        mtls_certificate,
        resolved_jwks: None,
        token_endpoint: format!("{}/connect/token", state.config.issuer),
        ..Default::default()
    };

    if let Some(header_value) = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        let (client_id, secret) = decode_basic_auth(header_value)?;
        request.client_id = Some(client_id);
        request.basic_auth_secret = Some(secret);
    }

    Ok(request)
}
