//! Bearer token payload decoding
//!
//! Only the claims are read; signatures are the server's business.

use super::errors::{NetworkError, NetworkResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JwtClaims {
    /// Expiry as unix seconds
    #[serde(default)]
    pub exp: Option<i64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JwtClaims {
    /// Seconds left before expiry, `None` for tokens without `exp`
    pub fn seconds_left(&self, now: i64) -> Option<i64> {
        self.exp.map(|exp| exp - now)
    }
}

pub fn decode_claims(token: &str) -> NetworkResult<JwtClaims> {
    let payload = token
        .split('.')
        .nth(1)
        .filter(|part| !part.is_empty())
        .ok_or_else(|| NetworkError::InvalidToken("missing payload segment".to_string()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| NetworkError::InvalidToken(e.to_string()))?;

    serde_json::from_slice(&bytes).map_err(|e| NetworkError::InvalidToken(e.to_string()))
}

#[cfg(test)]
pub(crate) fn encode_for_test(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_claims() {
        let token = encode_for_test(&json!({"exp": 2000, "uid": 7}));
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.exp, Some(2000));
        assert_eq!(claims.extra["uid"], 7);
        assert_eq!(claims.seconds_left(1500), Some(500));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_claims("nodots"), Err(NetworkError::InvalidToken(_))));
        assert!(matches!(decode_claims("a.!!!.c"), Err(NetworkError::InvalidToken(_))));
        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode("plain"));
        assert!(matches!(decode_claims(&not_json), Err(NetworkError::InvalidToken(_))));
    }
}
