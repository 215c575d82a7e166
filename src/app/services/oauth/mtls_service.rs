use axum::http::HeaderMap;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::app::models::oauth::ClientAuthMethod;
use crate::result::{OidcError, OidcResult};

/// RFC 8705 mutual-TLS client authentication (spec §4.2
/// `tls_client_auth` / `self_signed_tls_client_auth`). The TLS
/// terminator forwards the peer certificate as a header; this service
/// normalizes the three common encodings and computes the SHA-256
/// thumbprint used to bind the client.
pub struct MtlsService;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCertificate {
    pub der: Vec<u8>,
    pub thumbprint_sha256: String,
}

const CERT_HEADERS: &[&str] = &["x-client-cert", "x-ssl-client-cert", "x-forwarded-client-cert"];

impl MtlsService {
    /// Accepts PEM, base64-encoded DER, or URL-encoded PEM, falling
    /// back silently between forms (spec §4.2).
    pub fn extract_client_certificate(headers: &HeaderMap) -> OidcResult<Option<ClientCertificate>> {
        for name in CERT_HEADERS {
            if let Some(value) = headers.get(*name) {
                let raw = value
                    .to_str()
                    .map_err(|_| OidcError::invalid_request("invalid client certificate header encoding"))?;
                if let Some(cert) = Self::parse_certificate(raw)? {
                    return Ok(Some(cert));
                }
            }
        }
        Ok(None)
    }

    fn parse_certificate(raw: &str) -> OidcResult<Option<ClientCertificate>> {
        if raw.is_empty() {
            return Ok(None);
        }

        let decoded = urlencoding::decode(raw)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| raw.to_string());

        let der = if decoded.contains("BEGIN CERTIFICATE") {
            let body = decoded
                .replace("-----BEGIN CERTIFICATE-----", "")
                .replace("-----END CERTIFICATE-----", "")
                .replace(['\n', '\r', ' '], "");
            base64::engine::general_purpose::STANDARD
                .decode(body)
                .map_err(|_| OidcError::invalid_request("malformed PEM client certificate"))?
        } else {
            URL_SAFE_NO_PAD
                .decode(decoded.trim())
                .or_else(|_| base64::engine::general_purpose::STANDARD.decode(decoded.trim()))
                .map_err(|_| OidcError::invalid_request("malformed client certificate encoding"))?
        };

        if x509_parser::parse_x509_certificate(&der).is_err() {
            return Err(OidcError::invalid_request("unparseable X.509 client certificate"));
        }

        let mut hasher = Sha256::new();
        hasher.update(&der);
        let thumbprint = URL_SAFE_NO_PAD.encode(hasher.finalize());

        Ok(Some(ClientCertificate {
            der,
            thumbprint_sha256: thumbprint,
        }))
    }

    pub fn client_supports_mtls(auth_methods: &[ClientAuthMethod]) -> bool {
        auth_methods
            .iter()
            .any(|m| matches!(m, ClientAuthMethod::TlsClientAuth | ClientAuthMethod::SelfSignedTlsClientAuth))
    }

    /// Validates a forwarded certificate against the registered
    /// thumbprint for `self_signed_tls_client_auth`, or simply confirms
    /// presence for PKI-bound `tls_client_auth` (chain trust is the
    /// edge's responsibility).
    pub fn validate_thumbprint(certificate: &ClientCertificate, registered_thumbprint: &str) -> bool {
        use subtle::ConstantTimeEq;
        certificate
            .thumbprint_sha256
            .as_bytes()
            .ct_eq(registered_thumbprint.as_bytes())
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn missing_header_yields_no_certificate() {
        let headers = HeaderMap::new();
        assert!(MtlsService::extract_client_certificate(&headers).unwrap().is_none());
    }

    #[test]
    fn mtls_support_requires_registered_method() {
        assert!(MtlsService::client_supports_mtls(&[ClientAuthMethod::TlsClientAuth]));
        assert!(!MtlsService::client_supports_mtls(&[ClientAuthMethod::ClientSecretBasic]));
    }

    #[test]
    fn invalid_base64_header_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert("x-client-cert", HeaderValue::from_static("not-base64!!"));
        assert!(MtlsService::extract_client_certificate(&headers).is_err());
    }
}
