use crate::result::{OidcError, ResponseMode};

use super::authorization_handler::AuthorizationResponse;

/// C17: translates a successful `AuthorizationResponse` or a
/// redirect-carrying `OidcError` into the redirect URL / form-post body
/// the transport layer renders, per the response mode resolved at
/// validation time (spec §4.5, §6 "Error response shape").
pub enum RenderedAuthorizationResponse {
    Redirect(String),
    FormPost { action: String, fields: Vec<(String, String)> },
}

pub fn render_success(response: &AuthorizationResponse) -> RenderedAuthorizationResponse {
    let fields = success_fields(response);
    render(&response.redirect_uri, response.response_mode, fields)
}

/// Only callable once the validator chain resolved a redirect URI and
/// response mode; callers MUST fall back to a direct JSON/HTTP 400 body
/// when `err.is_redirectable()` is false (spec §6).
pub fn render_redirectable_error(err: &OidcError) -> Option<RenderedAuthorizationResponse> {
    let redirect_uri = err.redirect_uri.clone()?;
    let mode = err.response_mode?;
    Some(render(&redirect_uri, mode, error_fields(err)))
}

fn render(redirect_uri: &str, mode: ResponseMode, fields: Vec<(String, String)>) -> RenderedAuthorizationResponse {
    match mode {
        ResponseMode::Query => RenderedAuthorizationResponse::Redirect(append_query(redirect_uri, &fields)),
        ResponseMode::Fragment => RenderedAuthorizationResponse::Redirect(append_fragment(redirect_uri, &fields)),
        ResponseMode::FormPost => RenderedAuthorizationResponse::FormPost { action: redirect_uri.to_string(), fields },
    }
}

fn success_fields(response: &AuthorizationResponse) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    if let Some(code) = &response.code {
        fields.push(("code".to_string(), code.clone()));
    }
    if let Some(access_token) = &response.access_token {
        fields.push(("access_token".to_string(), access_token.clone()));
    }
    if let Some(token_type) = response.token_type {
        fields.push(("token_type".to_string(), token_type.to_string()));
    }
    if let Some(expires_in) = response.expires_in {
        fields.push(("expires_in".to_string(), expires_in.to_string()));
    }
    if let Some(id_token) = &response.id_token {
        fields.push(("id_token".to_string(), id_token.clone()));
    }
    if let Some(state) = &response.state {
        fields.push(("state".to_string(), state.clone()));
    }
    fields
}

fn error_fields(err: &OidcError) -> Vec<(String, String)> {
    let mut fields = vec![
        ("error".to_string(), err.error_code.as_str().to_string()),
        ("error_description".to_string(), err.error_description.clone()),
    ];
    if let Some(uri) = &err.error_uri {
        fields.push(("error_uri".to_string(), uri.clone()));
    }
    fields
}

fn append_query(redirect_uri: &str, fields: &[(String, String)]) -> String {
    let separator = if redirect_uri.contains('?') { '&' } else { '?' };
    let encoded = encode_fields(fields);
    if encoded.is_empty() {
        redirect_uri.to_string()
    } else {
        format!("{redirect_uri}{separator}{encoded}")
    }
}

fn append_fragment(redirect_uri: &str, fields: &[(String, String)]) -> String {
    let encoded = encode_fields(fields);
    format!("{redirect_uri}#{encoded}")
}

fn encode_fields(fields: &[(String, String)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response() -> AuthorizationResponse {
        AuthorizationResponse {
            redirect_uri: "https://client.example/cb".to_string(),
            response_mode: ResponseMode::Query,
            code: Some("abc123".to_string()),
            access_token: None,
            token_type: None,
            expires_in: None,
            id_token: None,
            state: Some("s1".to_string()),
        }
    }

    #[test]
    fn query_mode_appends_params_after_question_mark() {
        let rendered = render_success(&sample_response());
        match rendered {
            RenderedAuthorizationResponse::Redirect(url) => {
                assert!(url.starts_with("https://client.example/cb?"));
                assert!(url.contains("code=abc123"));
                assert!(url.contains("state=s1"));
            }
            _ => panic!("expected a redirect"),
        }
    }

    #[test]
    fn fragment_mode_appends_params_after_hash() {
        let mut response = sample_response();
        response.response_mode = ResponseMode::Fragment;
        let rendered = render_success(&response);
        match rendered {
            RenderedAuthorizationResponse::Redirect(url) => assert!(url.contains("#code=abc123")),
            _ => panic!("expected a redirect"),
        }
    }

    #[test]
    fn form_post_mode_returns_fields_instead_of_a_url() {
        let mut response = sample_response();
        response.response_mode = ResponseMode::FormPost;
        let rendered = render_success(&response);
        match rendered {
            RenderedAuthorizationResponse::FormPost { action, fields } => {
                assert_eq!(action, "https://client.example/cb");
                assert!(fields.iter().any(|(k, v)| k == "code" && v == "abc123"));
            }
            _ => panic!("expected a form post"),
        }
    }

    #[test]
    fn non_redirectable_error_renders_nothing() {
        let err = OidcError::invalid_request("missing redirect_uri");
        assert!(render_redirectable_error(&err).is_none());
    }

    #[test]
    fn redirectable_error_carries_error_code_and_description() {
        let err = OidcError::invalid_scope("scope not granted").with_redirect("https://client.example/cb", ResponseMode::Query);
        let rendered = render_redirectable_error(&err).unwrap();
        match rendered {
            RenderedAuthorizationResponse::Redirect(url) => {
                assert!(url.contains("error=invalid_scope"));
                assert!(url.contains("error_description=scope"));
            }
            _ => panic!("expected a redirect"),
        }
    }
}
