use axum::{routing::get, Router};

/// Liveness probe only; the API surface this crate serves is entirely
/// under `/connect/*` and `/.well-known/*` (see [`super::oauth::routes`]).
pub fn routes() -> Router {
    Router::new().route("/health", get(|| async { "ok" }))
}
