//! JWT payload decoding
//!
//! The client reads the access token's `sub` and `exp` claims for scheduling
//! and profile lookup only. Signatures are not verified here; the server
//! remains the authority on whether a token is valid.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::SessionError;

/// Claims the client cares about
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AccessClaims {
    #[serde(default)]
    pub sub: Option<String>,
    /// Expiry as seconds since the Unix epoch
    #[serde(default)]
    pub exp: Option<i64>,
}

impl AccessClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// Seconds left before expiry, negative once expired
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.exp.map(|exp| exp - now.timestamp())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.remaining_secs(now).is_some_and(|left| left <= 0)
    }
}

/// Decode the payload segment of a compact JWT
pub fn decode_claims(token: &str) -> Result<AccessClaims, SessionError> {
    let mut parts = token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(SessionError::MalformedToken("expected exactly three segments".into())),
    };

    // Some issuers pad the segments even though RFC 7515 says not to
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| SessionError::MalformedToken(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| SessionError::MalformedToken(format!("payload is not JSON: {e}")))
}

#[cfg(test)]
pub(crate) fn encode_unsigned(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}
