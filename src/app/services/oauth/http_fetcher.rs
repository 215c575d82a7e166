use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::time::Duration;

use crate::result::{OidcError, OidcResult};

/// Resolves a hostname to its candidate addresses, kept behind a trait
/// so tests can exercise the IP-range guard without touching DNS.
pub trait HostResolver: Send + Sync {
    fn resolve<'a>(&'a self, host: &'a str, port: u16) -> Pin<Box<dyn Future<Output = std::io::Result<Vec<SocketAddr>>> + Send + 'a>>;
}

struct TokioResolver;

impl HostResolver for TokioResolver {
    fn resolve<'a>(&'a self, host: &'a str, port: u16) -> Pin<Box<dyn Future<Output = std::io::Result<Vec<SocketAddr>>> + Send + 'a>> {
        Box::pin(async move { Ok(tokio::net::lookup_host((host, port)).await?.collect()) })
    }
}

/// C16: the single guarded egress point for request_uri resolution,
/// JWKS fetching, and client notification delivery (spec §4.12). A
/// hostname target is resolved and every candidate address checked
/// against the IP-range guard before the request is issued, and the
/// connection is then pinned to the checked address so the eventual
/// `reqwest` connect cannot re-resolve to something else (DNS
/// rebinding).
pub struct SecureHttpFetcher {
    client: reqwest::Client,
    allowed_schemes: Vec<String>,
    blocklist_enabled: bool,
    resolver: Box<dyn HostResolver>,
}

const BLOCKED_HOSTNAMES: &[&str] = &[
    "localhost",
    "loopback",
    "broadcasthost",
    "local",
    "internal",
    "intranet",
    "private",
    "corp",
    "home",
    "lan",
];

const BLOCKED_TLDS: &[&str] = &["local", "localhost", "internal", "intranet", "corp", "home", "lan"];

impl SecureHttpFetcher {
    pub fn new(allowed_schemes: Vec<String>, blocklist_enabled: bool) -> Self {
        Self::with_resolver(allowed_schemes, blocklist_enabled, Box::new(TokioResolver))
    }

    pub fn with_resolver(allowed_schemes: Vec<String>, blocklist_enabled: bool, resolver: Box<dyn HostResolver>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            allowed_schemes: allowed_schemes.into_iter().map(|s| s.to_ascii_lowercase()).collect(),
            blocklist_enabled,
            resolver,
        }
    }

    pub fn default_https_only() -> Self {
        Self::new(vec!["https".to_string()], true)
    }

    /// Validates `uri` against the scheme allow-list and (unless
    /// disabled) the hostname/IP blocklist (spec §4.12). This is the
    /// cheap, DNS-free first pass; [`Self::prepare_request`] performs
    /// the actual resolution and re-checks every candidate address
    /// before a request is allowed to proceed.
    pub fn validate(&self, uri: &str) -> OidcResult<url::Url> {
        let parsed = url::Url::parse(uri).map_err(|_| OidcError::invalid_request("malformed URI"))?;

        if !self.allowed_schemes.iter().any(|s| s == parsed.scheme()) {
            return Err(OidcError::invalid_request(format!("scheme {} is not allowed", parsed.scheme())));
        }

        if !self.blocklist_enabled {
            return Ok(parsed);
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| OidcError::invalid_request("URI has no host"))?
            .to_ascii_lowercase();

        if !host.contains('.') {
            return Err(OidcError::invalid_request("single-label hostnames are not allowed"));
        }

        if BLOCKED_HOSTNAMES.contains(&host.as_str()) {
            return Err(OidcError::invalid_request("hostname is blocked"));
        }

        if let Some(tld) = host.rsplit('.').next() {
            if BLOCKED_TLDS.contains(&tld) {
                return Err(OidcError::invalid_request("hostname TLD is blocked"));
            }
        }

        if let Ok(ip) = host.parse::<IpAddr>() {
            if is_blocked_ip(ip) {
                return Err(OidcError::invalid_request("IP address is blocked"));
            }
        }

        Ok(parsed)
    }

    /// Runs [`Self::validate`], then resolves a hostname target and
    /// checks every candidate address with `is_blocked_ip` before
    /// returning a client pinned to the one it verified (spec §4.12:
    /// "returns Failure without performing a DNS resolution to an
    /// unintended IP"). A literal-IP target skips resolution since
    /// `validate` already checked it.
    async fn prepare_request(&self, uri: &str) -> OidcResult<(reqwest::Client, url::Url)> {
        let url = self.validate(uri)?;
        let host = url.host_str().ok_or_else(|| OidcError::invalid_request("URI has no host"))?.to_string();

        if !self.blocklist_enabled || host.parse::<IpAddr>().is_ok() {
            return Ok((self.client.clone(), url));
        }

        let port = url.port_or_known_default().unwrap_or(443);
        let addrs = self
            .resolver
            .resolve(&host, port)
            .await
            .map_err(|e| OidcError::invalid_request(format!("failed to resolve host: {e}")))?;

        let Some(&pinned) = addrs.first() else {
            return Err(OidcError::invalid_request("host did not resolve to any address"));
        };
        if addrs.iter().any(|addr| is_blocked_ip(addr.ip())) {
            return Err(OidcError::invalid_request("resolved IP address is blocked"));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .resolve(&host, pinned)
            .build()
            .map_err(|e| OidcError::server_error(format!("failed to build pinned HTTP client: {e}")))?;
        Ok((client, url))
    }

    pub async fn fetch_json(&self, uri: &str) -> OidcResult<serde_json::Value> {
        let (client, url) = self.prepare_request(uri).await?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| OidcError::server_error(format!("outbound fetch failed: {e}")))?;
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| OidcError::server_error(format!("invalid JSON response: {e}")))
    }

    pub async fn fetch_text(&self, uri: &str) -> OidcResult<String> {
        let (client, url) = self.prepare_request(uri).await?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| OidcError::server_error(format!("outbound fetch failed: {e}")))?;
        response
            .text()
            .await
            .map_err(|e| OidcError::server_error(format!("invalid text response: {e}")))
    }

    pub async fn post_json(&self, uri: &str, body: &serde_json::Value, bearer_token: Option<&str>) -> OidcResult<()> {
        let (client, url) = self.prepare_request(uri).await?;
        let mut request = client.post(url).json(body);
        if let Some(token) = bearer_token {
            request = request.bearer_auth(token);
        }
        request
            .send()
            .await
            .map_err(|e| OidcError::server_error(format!("notification delivery failed: {e}")))?;
        Ok(())
    }
}

fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_link_local()
                || v4.is_private()
                || v4.is_multicast()
                || v4.is_broadcast()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_multicast()
                || is_unique_local_v6(v6)
                || is_link_local_v6(v6)
        }
    }
}

fn is_unique_local_v6(ip: std::net::Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xfe00) == 0xfc00
}

fn is_link_local_v6(ip: std::net::Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}
