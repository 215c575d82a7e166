use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::app::http::state::AppState;

/// Thin discovery stub: surfaces the endpoint map and the handful of
/// capabilities the core actually implements. A full discovery renderer
/// (covering every optional OpenID Provider Metadata field) is outside
/// this crate (spec §1 "the discovery document renderer").
pub async fn metadata(State(state): State<AppState>) -> Json<Value> {
    let issuer = &state.config.issuer;
    let endpoints = state.config.enabled_endpoints;

    let mut body = json!({
        "issuer": issuer,
        "response_types_supported": ["code", "token", "id_token", "code id_token", "code token", "token id_token", "code token id_token"],
        "grant_types_supported": [
            "authorization_code",
            "refresh_token",
            "client_credentials",
            "urn:openid:params:grant-type:ciba",
            "urn:ietf:params:oauth:grant-type:jwt-bearer",
        ],
        "subject_types_supported": ["public", "pairwise"],
        "id_token_signing_alg_values_supported": ["HS256"],
        "token_endpoint_auth_methods_supported": [
            "none", "client_secret_basic", "client_secret_post", "client_secret_jwt", "private_key_jwt",
            "tls_client_auth", "self_signed_tls_client_auth",
        ],
        "code_challenge_methods_supported": ["plain", "S256"],
        "backchannel_token_delivery_modes_supported": ["poll", "ping", "push"],
    });

    let map = body.as_object_mut().expect("object literal");
    if endpoints.authorize {
        map.insert("authorization_endpoint".into(), json!(format!("{issuer}/connect/authorize")));
    }
    if endpoints.par {
        map.insert("pushed_authorization_request_endpoint".into(), json!(format!("{issuer}/connect/par")));
        map.insert("require_pushed_authorization_requests".into(), json!(state.config.require_pushed_authorization_requests));
    }
    if endpoints.token {
        map.insert("token_endpoint".into(), json!(format!("{issuer}/connect/token")));
    }
    if endpoints.userinfo {
        map.insert("userinfo_endpoint".into(), json!(format!("{issuer}/connect/userinfo")));
    }
    if endpoints.revocation {
        map.insert("revocation_endpoint".into(), json!(format!("{issuer}/connect/revocation")));
    }
    if endpoints.introspection {
        map.insert("introspection_endpoint".into(), json!(format!("{issuer}/connect/introspect")));
    }
    if endpoints.end_session {
        map.insert("end_session_endpoint".into(), json!(format!("{issuer}/connect/endsession")));
    }
    if endpoints.check_session {
        map.insert("check_session_iframe".into(), json!(format!("{issuer}/connect/checksession")));
    }
    if endpoints.ciba {
        map.insert("backchannel_authentication_endpoint".into(), json!(format!("{issuer}/connect/ciba")));
    }
    map.insert("jwks_uri".into(), json!(format!("{issuer}/.well-known/jwks")));

    Json(body)
}

/// The core signs with a server-held HMAC secret rather than an
/// asymmetric per-deployment key (`TokenService`'s "signing is
/// HMAC-backed" simplification), so there is no public key material to
/// publish; the set is intentionally empty.
pub async fn jwks() -> Json<Value> {
    Json(json!({ "keys": [] }))
}
