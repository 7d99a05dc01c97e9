//! Stateless bearer-token issuer and verifier.
//!
//! A token is `base64url(claim JSON) . base64url(HMAC-SHA256(secret, payload))`.
//! The claim carries the username, an issued-at stamp, and (when the server
//! is configured with a TTL) an expiry. Verification fails closed: bad
//! structure, bad encoding, bad JSON, signature mismatch, and an elapsed
//! expiry all come back as the same `None`.

use super::credentials::constant_time_eq;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The session claim carried by a verified token. Exists only for the
/// duration of request handling; nothing is persisted server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    /// Username the token was issued to.
    pub sub: String,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds. Absent when the server issues non-expiring
    /// tokens (the default for this internal tool).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// Signs and verifies claims with a fixed server-held secret.
///
/// The secret is injected once at construction and immutable afterwards.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl_secs: u64,
}

impl TokenSigner {
    /// `ttl_secs = 0` issues tokens without an embedded expiry.
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            ttl_secs,
        }
    }

    /// Issue a signed token for `username`.
    pub fn issue(&self, username: &str) -> String {
        let now = Utc::now().timestamp();
        let claim = Claim {
            sub: username.to_string(),
            iat: now,
            exp: (self.ttl_secs > 0).then(|| now + self.ttl_secs as i64),
        };
        // Claim serialization cannot fail: plain strings and integers.
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claim).unwrap_or_default());
        let signature = URL_SAFE_NO_PAD.encode(self.sign(payload.as_bytes()));
        format!("{payload}.{signature}")
    }

    /// Verify a token and return its claim, or `None` if anything about
    /// it is wrong.
    pub fn verify(&self, token: &str) -> Option<Claim> {
        let (payload, signature) = token.split_once('.')?;
        let provided = URL_SAFE_NO_PAD.decode(signature).ok()?;
        let expected = self.sign(payload.as_bytes());
        if !constant_time_eq(&provided, &expected) {
            return None;
        }

        let claim: Claim = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).ok()?).ok()?;
        if let Some(exp) = claim.exp {
            if Utc::now().timestamp() >= exp {
                return None;
            }
        }
        Some(claim)
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}
