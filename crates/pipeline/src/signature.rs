//! Webhook signature verification.
//!
//! GitHub signs every delivery with an HMAC of the raw body keyed by the
//! shared webhook secret. Two headers may carry it:
//!
//! - `x-hub-signature: sha1=<hex>` (HMAC-SHA1, always sent)
//! - `x-hub-signature-256: sha256=<hex>` (HMAC-SHA256, sent by newer hooks)
//!
//! When both are present the SHA-256 signature is checked and the SHA-1 one is
//! ignored. Comparison is constant-time (`Mac::verify_slice`).

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

use crate::{Rejection, WebhookDelivery};

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// Result of checking one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// The signature matches the body.
    Valid,
    /// The signature is missing, malformed, or does not match.
    Invalid,
}

/// Verifies webhook signatures against a shared secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl SignatureVerifier {
    /// Creates a verifier for the given shared secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Checks an `x-hub-signature` value (`sha1=<hex>`, or the bare hex) against `body`.
    pub fn verify_sha1(&self, body: &[u8], header: &str) -> Verification {
        let Some(expected) = decode_header(header, "sha1=") else {
            return Verification::Invalid;
        };
        // HMAC accepts keys of any length.
        let Ok(mut mac) = HmacSha1::new_from_slice(&self.secret) else {
            return Verification::Invalid;
        };
        mac.update(body);
        to_verification(mac.verify_slice(&expected).is_ok())
    }

    /// Checks an `x-hub-signature-256` value (`sha256=<hex>`, or the bare hex) against `body`.
    pub fn verify_sha256(&self, body: &[u8], header: &str) -> Verification {
        let Some(expected) = decode_header(header, "sha256=") else {
            return Verification::Invalid;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret) else {
            return Verification::Invalid;
        };
        mac.update(body);
        to_verification(mac.verify_slice(&expected).is_ok())
    }

    /// Verifies a delivery, preferring the SHA-256 header when present.
    pub fn verify(&self, delivery: &WebhookDelivery) -> Result<(), Rejection> {
        let (verification, header) = match (&delivery.signature_sha256, &delivery.signature_sha1) {
            (Some(sig), _) => (self.verify_sha256(&delivery.body, sig), "x-hub-signature-256"),
            (None, Some(sig)) => (self.verify_sha1(&delivery.body, sig), "x-hub-signature"),
            (None, None) => {
                return Err(Rejection::AuthenticationFailed {
                    reason: "no signature header".to_string(),
                })
            }
        };
        match verification {
            Verification::Valid => Ok(()),
            Verification::Invalid => Err(Rejection::AuthenticationFailed {
                reason: format!("{header} does not match"),
            }),
        }
    }

    /// Computes the `sha1=<hex>` header value for `body`.
    pub fn sign_sha1(&self, body: &[u8]) -> String {
        let mut mac = match HmacSha1::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => return String::new(),
        };
        mac.update(body);
        format!("sha1={}", hex::encode(mac.finalize().into_bytes()))
    }

    /// Computes the `sha256=<hex>` header value for `body`.
    pub fn sign_sha256(&self, body: &[u8]) -> String {
        let mut mac = match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => return String::new(),
        };
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }
}

// Strips the algorithm prefix, when present, and decodes the hex digest.
fn decode_header(header: &str, prefix: &str) -> Option<Vec<u8>> {
    let header = header.trim();
    let digest = header.strip_prefix(prefix).unwrap_or(header);
    hex::decode(digest).ok()
}

fn to_verification(valid: bool) -> Verification {
    if valid {
        Verification::Valid
    } else {
        Verification::Invalid
    }
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
