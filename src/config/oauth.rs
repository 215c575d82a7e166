use anyhow::Result;
use std::env;

/// Minimum entropy, in bytes, the spec requires for any server-generated
/// identifier (authorization codes, `request_uri` suffixes, session ids,
/// CIBA `auth_req_id`s).
pub const MIN_ENTROPY_BYTES: u32 = 16;

/// Which `/connect/*` and `/.well-known/*` surfaces this deployment
/// exposes (spec §6 "enabledEndpoints" bitset). Disabled endpoints are
/// not mounted on the router at all rather than mounted-and-rejecting,
/// so a disabled surface returns 404 rather than an OIDC error body.
#[derive(Debug, Clone, Copy)]
pub struct EnabledEndpoints {
    pub authorize: bool,
    pub par: bool,
    pub token: bool,
    pub userinfo: bool,
    pub revocation: bool,
    pub introspection: bool,
    pub end_session: bool,
    pub check_session: bool,
    pub ciba: bool,
    pub discovery: bool,
}

impl Default for EnabledEndpoints {
    fn default() -> Self {
        Self {
            authorize: true,
            par: true,
            token: true,
            userinfo: true,
            revocation: true,
            introspection: true,
            end_session: true,
            check_session: true,
            ciba: true,
            discovery: true,
        }
    }
}

impl EnabledEndpoints {
    /// Parses a comma-separated disable-list, e.g.
    /// `OAUTH_DISABLED_ENDPOINTS=ciba,par`. An unrecognized name is
    /// ignored rather than rejected, so this stays forward-compatible
    /// with endpoint names added later.
    fn from_disabled_list(raw: &str) -> Self {
        let mut endpoints = Self::default();
        for name in raw.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()) {
            match name {
                "authorize" => endpoints.authorize = false,
                "par" => endpoints.par = false,
                "token" => endpoints.token = false,
                "userinfo" => endpoints.userinfo = false,
                "revocation" => endpoints.revocation = false,
                "introspection" => endpoints.introspection = false,
                "end_session" | "endsession" => endpoints.end_session = false,
                "check_session" | "checksession" => endpoints.check_session = false,
                "ciba" => endpoints.ciba = false,
                "discovery" => endpoints.discovery = false,
                _ => {}
            }
        }
        endpoints
    }
}

/// CIBA-specific knobs (spec §4.8, §6 "ciba.*").
#[derive(Debug, Clone)]
pub struct CibaConfig {
    pub request_id_length: u32,
    pub polling_interval: i64,
}

/// Guards `secureHttpFetch` applies to outbound `request_uri`/`jwks_uri`
/// resolution (spec §4.3, C16).
#[derive(Debug, Clone)]
pub struct SecureHttpFetchConfig {
    pub block_private_networks: bool,
    pub allowed_schemes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub allow_endpoint_paths_discovery: bool,
}

/// `OAuthConfig` — the environment-derived settings every `/connect/*`
/// service is wired from at startup (spec §6 "Environment-level
/// configuration"). None of the values here are read directly by the
/// core handlers; they are consumed once, in `main.rs`, to construct
/// the services themselves.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub issuer: String,
    pub signing_secret: String,
    pub server_salt: String,
    pub authorization_code_length: u32,
    pub request_uri_length: u32,
    pub session_id_length: u32,
    pub access_token_ttl: i64,
    pub refresh_token_ttl: i64,
    pub auth_code_ttl: i64,
    pub par_ttl: i64,
    pub require_pushed_authorization_requests: bool,
    pub ciba: CibaConfig,
    pub secure_http_fetch: SecureHttpFetchConfig,
    pub enabled_endpoints: EnabledEndpoints,
    pub discovery: DiscoveryConfig,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env_parse(key, default)
}

impl OAuthConfig {
    pub fn from_env() -> Result<Self> {
        let allowed_schemes = env::var("OAUTH_SECURE_FETCH_ALLOWED_SCHEMES")
            .map(|raw| raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_else(|_| vec!["https".to_string()]);

        Ok(OAuthConfig {
            issuer: env_or("OAUTH_ISSUER", "https://issuer.example"),
            signing_secret: env_or("OAUTH_JWT_SECRET", "your-oauth2-jwt-secret-here"),
            server_salt: env_or("OAUTH_SERVER_SALT", "your-oauth2-server-salt-here"),
            authorization_code_length: env_parse("OAUTH_AUTHORIZATION_CODE_LENGTH", MIN_ENTROPY_BYTES).max(MIN_ENTROPY_BYTES),
            request_uri_length: env_parse("OAUTH_REQUEST_URI_LENGTH", 24).max(MIN_ENTROPY_BYTES),
            session_id_length: env_parse("OAUTH_SESSION_ID_LENGTH", MIN_ENTROPY_BYTES).max(MIN_ENTROPY_BYTES),
            access_token_ttl: env_parse("OAUTH_ACCESS_TOKEN_TTL", 3600),
            refresh_token_ttl: env_parse("OAUTH_REFRESH_TOKEN_TTL", 604_800),
            auth_code_ttl: env_parse("OAUTH_AUTH_CODE_TTL", 60),
            par_ttl: env_parse("OAUTH_PAR_TTL", 90),
            require_pushed_authorization_requests: env_bool("OAUTH_REQUIRE_PAR", false),
            ciba: CibaConfig {
                request_id_length: env_parse("OAUTH_CIBA_REQUEST_ID_LENGTH", 20).max(MIN_ENTROPY_BYTES),
                polling_interval: env_parse("OAUTH_CIBA_POLLING_INTERVAL", 5),
            },
            secure_http_fetch: SecureHttpFetchConfig {
                block_private_networks: env_bool("OAUTH_SECURE_FETCH_BLOCK_PRIVATE_NETWORKS", true),
                allowed_schemes,
            },
            enabled_endpoints: env::var("OAUTH_DISABLED_ENDPOINTS")
                .map(|raw| EnabledEndpoints::from_disabled_list(&raw))
                .unwrap_or_default(),
            discovery: DiscoveryConfig {
                allow_endpoint_paths_discovery: env_bool("OAUTH_DISCOVERY_ALLOW_ENDPOINT_PATHS", true),
            },
        })
    }
}
