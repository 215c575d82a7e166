use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Keyed by `jti` (spec §3 "Token status record"). Absence of a record
/// means Active; presence means the token has since been spent or
/// explicitly revoked. Queried by introspection, refresh-token
/// validation and revocation alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    Used,
    Revoked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenStatusRecord {
    pub jti: String,
    pub status: TokenStatus,
    pub expires_at: DateTime<Utc>,
}

impl TokenStatusRecord {
    pub fn new(jti: impl Into<String>, status: TokenStatus, expires_at: DateTime<Utc>) -> Self {
        Self {
            jti: jti.into(),
            status,
            expires_at,
        }
    }
}
