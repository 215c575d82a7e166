use serde::Serialize;
use std::fmt;

/// Error codes drawn from the OAuth 2.0 / OpenID Connect registries.
///
/// Kept as a string newtype rather than a closed enum: extension grants and
/// future registry additions should not require a crate release to express.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorCode(pub String);

impl ErrorCode {
    pub const INVALID_REQUEST: &'static str = "invalid_request";
    pub const INVALID_CLIENT: &'static str = "invalid_client";
    pub const INVALID_GRANT: &'static str = "invalid_grant";
    pub const INVALID_SCOPE: &'static str = "invalid_scope";
    pub const UNAUTHORIZED_CLIENT: &'static str = "unauthorized_client";
    pub const UNSUPPORTED_GRANT_TYPE: &'static str = "unsupported_grant_type";
    pub const ACCESS_DENIED: &'static str = "access_denied";
    pub const CONSENT_REQUIRED: &'static str = "consent_required";
    pub const LOGIN_REQUIRED: &'static str = "login_required";
    pub const INTERACTION_REQUIRED: &'static str = "interaction_required";
    pub const ACCOUNT_SELECTION_REQUIRED: &'static str = "account_selection_required";
    pub const INVALID_REQUEST_OBJECT: &'static str = "invalid_request_object";
    pub const INVALID_REQUEST_URI: &'static str = "invalid_request_uri";
    pub const INVALID_TARGET: &'static str = "invalid_target";
    pub const INVALID_CLIENT_METADATA: &'static str = "invalid_client_metadata";
    pub const SLOW_DOWN: &'static str = "slow_down";
    pub const AUTHORIZATION_PENDING: &'static str = "authorization_pending";
    pub const EXPIRED_TOKEN: &'static str = "expired_token";
    pub const SERVER_ERROR: &'static str = "server_error";

    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The response mode a redirect-based error must be rendered with, once it
/// has been resolved by the validator chain (spec §4.4: "the error carries
/// them so the handler can render a protocol-conformant redirect error").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    Query,
    Fragment,
    FormPost,
}

/// `OidcError` — C1's failure type. Every handler in this crate returns
/// `OidcResult<T>` rather than panicking or reaching for `anyhow` once a
/// request has entered the protocol pipeline.
#[derive(Debug, Clone, thiserror::Error, Serialize)]
#[error("{error_code}: {error_description}")]
pub struct OidcError {
    pub error_code: ErrorCode,
    pub error_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
    #[serde(skip)]
    pub redirect_uri: Option<String>,
    #[serde(skip)]
    pub response_mode: Option<ResponseMode>,
}

impl OidcError {
    pub fn new(code: &str, description: impl Into<String>) -> Self {
        Self {
            error_code: ErrorCode::new(code),
            error_description: description.into(),
            error_uri: None,
            redirect_uri: None,
            response_mode: None,
        }
    }

    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::INVALID_REQUEST, description)
    }

    pub fn invalid_client(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::INVALID_CLIENT, description)
    }

    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::INVALID_GRANT, description)
    }

    pub fn invalid_scope(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::INVALID_SCOPE, description)
    }

    pub fn invalid_target(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::INVALID_TARGET, description)
    }

    pub fn unauthorized_client(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::UNAUTHORIZED_CLIENT, description)
    }

    pub fn unsupported_grant_type(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::UNSUPPORTED_GRANT_TYPE, description)
    }

    pub fn access_denied(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::ACCESS_DENIED, description)
    }

    pub fn consent_required(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::CONSENT_REQUIRED, description)
    }

    pub fn login_required(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::LOGIN_REQUIRED, description)
    }

    pub fn interaction_required(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::INTERACTION_REQUIRED, description)
    }

    pub fn account_selection_required(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::ACCOUNT_SELECTION_REQUIRED, description)
    }

    pub fn invalid_request_object(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::INVALID_REQUEST_OBJECT, description)
    }

    pub fn invalid_request_uri(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::INVALID_REQUEST_URI, description)
    }

    pub fn invalid_client_metadata(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::INVALID_CLIENT_METADATA, description)
    }

    pub fn slow_down(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::SLOW_DOWN, description)
    }

    pub fn authorization_pending(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::AUTHORIZATION_PENDING, description)
    }

    pub fn expired_token(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::EXPIRED_TOKEN, description)
    }

    pub fn server_error(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::SERVER_ERROR, description)
    }

    /// Attach the redirect URI and response mode resolved by earlier
    /// validators so the handler can still render a conformant redirect.
    pub fn with_redirect(mut self, redirect_uri: impl Into<String>, mode: ResponseMode) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self.response_mode = Some(mode);
        self
    }

    pub fn is_redirectable(&self) -> bool {
        self.redirect_uri.is_some()
    }
}

/// Alias used throughout the core instead of `anyhow::Result` once a value
/// is protocol-shaped. Infrastructure code (storage I/O, outbound HTTP) may
/// still bubble up `anyhow::Error` internally; the boundary into a handler
/// converts it into `OidcError::server_error`.
pub type OidcResult<T> = Result<T, OidcError>;

/// `matchAsync`-style combinator required by spec §4.1: run one of two
/// async continuations depending on whether the result was a success.
pub trait ResultExt<T> {
    async fn match_async<F, G, Fut1, Fut2, R>(self, on_success: F, on_failure: G) -> R
    where
        F: FnOnce(T) -> Fut1,
        G: FnOnce(OidcError) -> Fut2,
        Fut1: std::future::Future<Output = R>,
        Fut2: std::future::Future<Output = R>;
}

impl<T> ResultExt<T> for OidcResult<T> {
    async fn match_async<F, G, Fut1, Fut2, R>(self, on_success: F, on_failure: G) -> R
    where
        F: FnOnce(T) -> Fut1,
        G: FnOnce(OidcError) -> Fut2,
        Fut1: std::future::Future<Output = R>,
        Fut2: std::future::Future<Output = R>,
    {
        match self {
            Ok(value) => on_success(value).await,
            Err(error) => on_failure(error).await,
        }
    }
}

/// Infrastructure failures (storage, outbound HTTP, serialization) map onto
/// `server_error` at the point they cross into a handler — see spec §7
/// "Unexpected errors".
impl From<anyhow::Error> for OidcError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %err, "unexpected error while processing OIDC request");
        OidcError::server_error(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirectable_once_redirect_uri_attached() {
        let err = OidcError::invalid_scope("scope not granted");
        assert!(!err.is_redirectable());
        let err = err.with_redirect("https://client.example/cb", ResponseMode::Query);
        assert!(err.is_redirectable());
        assert_eq!(err.response_mode, Some(ResponseMode::Query));
    }

    #[tokio::test]
    async fn match_async_dispatches_on_success() {
        let ok: OidcResult<i32> = Ok(5);
        let out = ok.match_async(|v| async move { v * 2 }, |_| async { 0 }).await;
        assert_eq!(out, 10);
    }
}
