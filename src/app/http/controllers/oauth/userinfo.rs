use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde::Serialize;

use crate::app::http::state::AppState;
use crate::result::OidcError;

use super::wire::json_error_response;

/// Bearer-token claims the core itself can vouch for. A full userinfo
/// response additionally carries the claims a user directory owns
/// (profile, email, ...); that directory is outside this crate (spec §1
/// "persistence back-end implementations").
#[derive(Debug, Serialize)]
struct UserInfoBody {
    sub: String,
    client_id: String,
    scope: String,
}

pub async fn show(State(state): State<AppState>, headers: HeaderMap) -> Response {
    handle(state, headers)
}

pub async fn submit(State(state): State<AppState>, headers: HeaderMap) -> Response {
    handle(state, headers)
}

fn handle(state: AppState, headers: HeaderMap) -> Response {
    let token = match bearer_token(&headers) {
        Ok(token) => token,
        Err(err) => return json_error_response(&err),
    };

    let claims = match state.token_service.decode_access_token(token) {
        Ok(claims) => claims,
        Err(err) => return json_error_response(&err),
    };

    if !state.token_registry.is_active(&claims.jti, Utc::now()) {
        return json_error_response(&OidcError::invalid_grant("access token has been revoked"));
    }

    Json(UserInfoBody { sub: claims.sub, client_id: claims.client_id, scope: claims.scope }).into_response()
}

fn bearer_token(headers: &HeaderMap) -> crate::result::OidcResult<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| OidcError::invalid_request("missing bearer access token"))
}
