use axum::extract::{Form, Query, State};
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde::Serialize;

use crate::app::http::state::AppState;
use crate::app::services::oauth::{
    render_redirectable_error, render_success, AuthorizationOutcome, CompositeFetcher, InteractionRequired,
    PushedRequestFetcher, RequestObjectFetcher, RequestUriFetcher,
};

use super::wire::{json_error_response, rendered_to_response, AuthorizeWire};

#[derive(Debug, Serialize)]
struct InteractionBody {
    interaction: &'static str,
    client_id: Option<String>,
    scope: Option<String>,
}

pub async fn show(State(state): State<AppState>, Query(wire): Query<AuthorizeWire>) -> Response {
    handle(state, wire.into()).await
}

pub async fn submit(State(state): State<AppState>, Form(wire): Form<AuthorizeWire>) -> Response {
    handle(state, wire.into()).await
}

async fn handle(state: AppState, mut params: crate::app::models::oauth::AuthorizeRequestParams) -> Response {
    let par_fetcher = PushedRequestFetcher { par_service: &state.par_service };
    let request_uri_fetcher = RequestUriFetcher { http: &state.http_fetcher };
    let request_object_fetcher = RequestObjectFetcher { registry: state.client_registry.as_ref(), http: &state.http_fetcher };
    let fetcher = CompositeFetcher::new(vec![Box::new(par_fetcher), Box::new(request_uri_fetcher), Box::new(request_object_fetcher)]);

    if let Err(err) = fetcher.run(&mut params, state.config.require_pushed_authorization_requests).await {
        return render_redirectable_error(&err).map(rendered_to_response).unwrap_or_else(|| json_error_response(&err));
    }

    match state.authorization_handler.handle(params, Utc::now()) {
        AuthorizationOutcome::Issued(response) => rendered_to_response(render_success(&response)),
        AuthorizationOutcome::Error(err) => render_redirectable_error(&err).map(rendered_to_response).unwrap_or_else(|| json_error_response(&err)),
        AuthorizationOutcome::Interaction(InteractionRequired::Login { params }) => {
            Json(InteractionBody { interaction: "login", client_id: params.client_id, scope: params.scope }).into_response()
        }
        AuthorizationOutcome::Interaction(InteractionRequired::Consent { params, .. }) => {
            Json(InteractionBody { interaction: "consent", client_id: params.client_id, scope: params.scope }).into_response()
        }
    }
}
