use axum::extract::{Form, Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};

use crate::app::http::state::AppState;
use crate::app::services::oauth::{ClientRegistry, EndSessionOutcome, EndSessionRequest};

use super::wire::{json_error_response, EndSessionWire};

pub async fn show(State(state): State<AppState>, Query(wire): Query<EndSessionWire>) -> Response {
    handle(state, wire)
}

pub async fn submit(State(state): State<AppState>, Form(wire): Form<EndSessionWire>) -> Response {
    handle(state, wire)
}

/// `client_id` is resolved directly off the wire here rather than
/// decoded out of `id_token_hint`, since verifying an expired id_token's
/// signature is outside what this endpoint needs to do (spec §4.10
/// "`client` is `None` when the hint could not be resolved").
fn handle(state: AppState, wire: EndSessionWire) -> Response {
    let client = wire.client_id.as_deref().and_then(|id| state.client_registry.find_by_id(id));
    let request = EndSessionRequest {
        id_token_hint: wire.id_token_hint,
        post_logout_redirect_uri: wire.post_logout_redirect_uri,
        state: wire.state,
    };

    match state.end_session.handle(&request, client.as_ref()) {
        Ok(EndSessionOutcome::Redirect(url)) => Redirect::to(&url).into_response(),
        Ok(EndSessionOutcome::ShowConfirmation) => Html("<!DOCTYPE html><html><body>You have been signed out.</body></html>").into_response(),
        Err(err) => json_error_response(&err),
    }
}
