use serde::{Deserialize, Serialize};

/// Payload of a refresh token, issued as a JWT with `typ=refresh_token`
/// (spec §3 "RefreshToken", §4.9). `grant_fingerprint` is an opaque
/// marker of the original authorization context, carried so rotation
/// can detect a refresh token minted under a context that no longer
/// matches the grant on record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    pub iss: String,
    pub sub: String,
    pub client_id: String,
    pub scope: String,
    pub grant_fingerprint: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub typ: String,
}

impl RefreshTokenClaims {
    pub const TOKEN_TYPE: &'static str = "refresh_token";

    pub fn is_refresh_token(&self) -> bool {
        self.typ == Self::TOKEN_TYPE
    }
}
