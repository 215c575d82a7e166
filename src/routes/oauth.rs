use axum::{
    routing::{get, post},
    Router,
};

use crate::app::http::controllers::oauth::{
    authorize, checksession, ciba, discovery, end_session, introspection, par, revocation, token, userinfo,
};
use crate::app::http::state::AppState;

/// Mounts the canonical `/connect/*` and `/.well-known/*` surface (spec
/// §6). A disabled endpoint is left off the router entirely, so a
/// request to it 404s rather than producing an OIDC error body.
pub fn routes(state: AppState) -> Router {
    let endpoints = state.config.enabled_endpoints;
    let mut router = Router::new();

    if endpoints.authorize {
        router = router.route("/connect/authorize", get(authorize::show).post(authorize::submit));
    }
    if endpoints.par {
        router = router.route("/connect/par", post(par::submit));
    }
    if endpoints.token {
        router = router.route("/connect/token", post(token::submit));
    }
    if endpoints.userinfo {
        router = router.route("/connect/userinfo", get(userinfo::show).post(userinfo::submit));
    }
    if endpoints.revocation {
        router = router.route("/connect/revocation", post(revocation::submit));
    }
    if endpoints.introspection {
        router = router.route("/connect/introspect", post(introspection::submit));
    }
    if endpoints.end_session {
        router = router.route("/connect/endsession", get(end_session::show).post(end_session::submit));
    }
    if endpoints.check_session {
        router = router.route("/connect/checksession", get(checksession::show));
    }
    if endpoints.ciba {
        router = router.route("/connect/ciba", post(ciba::submit));
    }
    if endpoints.discovery {
        router = router
            .route("/.well-known/openid-configuration", get(discovery::metadata))
            .route("/.well-known/jwks", get(discovery::jwks));
    }

    router.with_state(state)
}
