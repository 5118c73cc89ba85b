//! LINE webhook signature: base64(HMAC-SHA256(channel secret, raw request body)).

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header LINE puts the signature in.
pub const SIGNATURE_HEADER: &str = "x-line-signature";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("missing x-line-signature header")]
    Missing,
    #[error("signature is not valid base64")]
    Encoding,
    #[error("channel secret cannot be used as an hmac key")]
    InvalidKey,
    #[error("signature does not match request body")]
    Mismatch,
}

fn mac_for(secret: &str, body: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(body);
    Ok(mac)
}

/// Compute the signature LINE would send for `body`.
pub fn sign(secret: &str, body: &[u8]) -> Result<String, SignatureError> {
    let digest = mac_for(secret, body)?.finalize().into_bytes();
    Ok(base64::engine::general_purpose::STANDARD.encode(digest))
}

/// Verify a received signature against `body`. Comparison is constant time.
pub fn verify(secret: &str, body: &[u8], signature: Option<&str>) -> Result<(), SignatureError> {
    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(SignatureError::Missing)?;
    let expected = base64::engine::general_purpose::STANDARD
        .decode(signature)
        .map_err(|_| SignatureError::Encoding)?;
    mac_for(secret, body)?
        .verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}
