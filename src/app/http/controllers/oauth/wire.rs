use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Redirect, Response};
use serde::{Deserialize, Serialize};

use crate::app::models::oauth::AuthorizeRequestParams;
use crate::app::services::oauth::grants::TokenRequest;
use crate::app::services::oauth::RenderedAuthorizationResponse;
use crate::result::{ErrorCode, OidcError};

/// Query/form-encoded mirror of [`AuthorizeRequestParams`]. `resource`
/// and `claims` are the two fields the core models as a `Vec<String>`
/// / `serde_json::Value` that a flat urlencoded body cannot carry
/// directly; this wire layer is exactly the "parameter binding from
/// query/form" the core treats as an external collaborator (spec §1).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizeWire {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub response_mode: Option<String>,
    pub nonce: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub resource: Option<String>,
    pub prompt: Option<String>,
    pub max_age: Option<i64>,
    pub acr_values: Option<String>,
    pub claims: Option<String>,
    pub request: Option<String>,
    pub request_uri: Option<String>,
    pub login_hint: Option<String>,
    pub id_token_hint: Option<String>,
}

impl From<AuthorizeWire> for AuthorizeRequestParams {
    fn from(wire: AuthorizeWire) -> Self {
        AuthorizeRequestParams {
            response_type: wire.response_type,
            client_id: wire.client_id,
            redirect_uri: wire.redirect_uri,
            scope: wire.scope,
            state: wire.state,
            response_mode: wire.response_mode,
            nonce: wire.nonce,
            code_challenge: wire.code_challenge,
            code_challenge_method: wire.code_challenge_method,
            resource: split_resources(wire.resource.as_deref()),
            prompt: wire.prompt,
            max_age: wire.max_age,
            acr_values: wire.acr_values,
            claims: wire.claims.as_deref().and_then(|raw| serde_json::from_str(raw).ok()),
            request: wire.request,
            request_uri: wire.request_uri,
            login_hint: wire.login_hint,
            id_token_hint: wire.id_token_hint,
        }
    }
}

pub fn split_resources(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| s.split_whitespace().map(String::from).collect()).unwrap_or_default()
}

/// Query/form-encoded mirror of [`TokenRequest`] for the same reason.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenWire {
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub resource: Option<String>,
    pub auth_req_id: Option<String>,
    pub assertion: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub client_assertion_type: Option<String>,
    pub client_assertion: Option<String>,
}

impl From<TokenWire> for TokenRequest {
    fn from(wire: TokenWire) -> Self {
        TokenRequest {
            grant_type: wire.grant_type,
            code: wire.code,
            redirect_uri: wire.redirect_uri,
            code_verifier: wire.code_verifier,
            refresh_token: wire.refresh_token,
            scope: wire.scope,
            resource: split_resources(wire.resource.as_deref()),
            auth_req_id: wire.auth_req_id,
            assertion: wire.assertion,
        }
    }
}

/// RFC 7009 / RFC 7662 share this shape: the token plus an optional
/// hint, and client credentials carried the same three ways a token
/// request accepts them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenActionWire {
    pub token: String,
    pub token_type_hint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndSessionWire {
    pub id_token_hint: Option<String>,
    pub post_logout_redirect_uri: Option<String>,
    pub state: Option<String>,
    pub client_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CibaWire {
    pub scope: String,
    pub resource: Option<String>,
    pub login_hint: Option<String>,
    pub id_token_hint: Option<String>,
    pub requested_expiry: Option<i64>,
    pub client_notification_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub client_assertion_type: Option<String>,
    pub client_assertion: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    error_description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_uri: Option<&'a str>,
}

/// Renders a non-redirectable `OidcError` as a JSON body, per spec §6
/// "if redirect_uri is not yet validated, errors become HTTP 400 JSON".
pub fn json_error_response(err: &OidcError) -> Response {
    let status = status_for(err.error_code.as_str());
    let body = ErrorBody {
        error: err.error_code.as_str(),
        error_description: &err.error_description,
        error_uri: err.error_uri.as_deref(),
    };
    (status, Json(body)).into_response()
}

fn status_for(code: &str) -> StatusCode {
    match code {
        ErrorCode::INVALID_CLIENT => StatusCode::UNAUTHORIZED,
        ErrorCode::SERVER_ERROR => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorCode::AUTHORIZATION_PENDING | ErrorCode::SLOW_DOWN => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// Turns a rendered authorization response into the redirect or
/// auto-submitting form-post page the user agent follows (spec §4.5,
/// C17). `form_post` has no bare-redirect equivalent, so it is the one
/// case that needs an actual HTML body.
pub fn rendered_to_response(rendered: RenderedAuthorizationResponse) -> Response {
    match rendered {
        RenderedAuthorizationResponse::Redirect(url) => Redirect::to(&url).into_response(),
        RenderedAuthorizationResponse::FormPost { action, fields } => {
            let inputs: String = fields
                .iter()
                .map(|(k, v)| format!(r#"<input type="hidden" name="{}" value="{}">"#, html_escape(k), html_escape(v)))
                .collect();
            let body = format!(
                r#"<!DOCTYPE html><html><head><title>Submitting...</title></head><body onload="document.forms[0].submit()"><form method="post" action="{}">{}</form></body></html>"#,
                html_escape(&action),
                inputs
            );
            Html(body).into_response()
        }
    }
}

fn html_escape(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;").replace('<', "&lt;").replace('>', "&gt;")
}
