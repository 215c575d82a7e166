use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde::Serialize;

use crate::app::http::state::AppState;
use crate::app::services::oauth::{CompositeFetcher, RequestObjectFetcher, RequestUriFetcher};

use super::wire::{json_error_response, AuthorizeWire};

/// RFC 9126: always answers in JSON, never a redirect (spec §4.5
/// "Pushed Authorization Request handler").
#[derive(Debug, Serialize)]
struct ParResponseBody {
    request_uri: String,
    expires_in: i64,
}

pub async fn submit(State(state): State<AppState>, Form(wire): Form<AuthorizeWire>) -> Response {
    let mut params = wire.into();

    let request_uri_fetcher = RequestUriFetcher { http: &state.http_fetcher };
    let request_object_fetcher = RequestObjectFetcher { registry: state.client_registry.as_ref(), http: &state.http_fetcher };
    let fetcher = CompositeFetcher::new(vec![Box::new(request_uri_fetcher), Box::new(request_object_fetcher)]);

    if let Err(err) = fetcher.run(&mut params, false).await {
        return json_error_response(&err);
    }

    match state.authorization_handler.handle_par(params, Utc::now()) {
        Ok(response) => {
            (StatusCode::CREATED, Json(ParResponseBody { request_uri: response.request_uri, expires_in: response.expires_in })).into_response()
        }
        Err(err) => json_error_response(&err),
    }
}
