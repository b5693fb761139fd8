//! Wire format for signed access tokens.
//!
//! Uses CBOR (RFC 8949) for compact binary serialization. Tokens usually
//! travel in HTTP headers or RPC metadata next to the call they authorize,
//! so the base64 form uses the URL-safe alphabet without padding.
//!
//! ## Security Limits
//!
//! - **Payload size**: limited to [`MAX_TOKEN_SIZE`] (64 KB), checked before
//!   any decoding happens
//! - **Version**: envelopes with an unknown version byte are rejected

use crate::crypto::Signature;
use crate::error::{Error, Result};
use crate::token::AccessToken;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Maximum allowed size for a serialized token in bytes (64 KB).
pub const MAX_TOKEN_SIZE: usize = 64 * 1024;

/// Current envelope version.
pub const WIRE_VERSION: u8 = 1;

/// Header name for carrying signed tokens in HTTP requests.
pub const ACCESS_TOKEN_HEADER: &str = "X-Access-Token";

/// A token together with the issuer signature over it.
///
/// This is the only artifact that is ever transmitted or persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedAccessToken {
    #[serde(rename = "v")]
    pub version: u8,
    pub token: AccessToken,
    pub signature: Signature,
}

impl SignedAccessToken {
    pub fn new(token: AccessToken, signature: Signature) -> Self {
        Self {
            version: WIRE_VERSION,
            token,
            signature,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(self)
    }

    pub fn encode_base64(&self) -> Result<String> {
        encode_base64(self)
    }
}

/// Encode a signed token to CBOR.
pub fn encode(signed: &SignedAccessToken) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(signed, &mut buf)?;
    Ok(buf)
}

/// Decode a signed token from CBOR.
///
/// Returns `TokenTooLarge` if the input exceeds [`MAX_TOKEN_SIZE`].
pub fn decode(data: &[u8]) -> Result<SignedAccessToken> {
    if data.len() > MAX_TOKEN_SIZE {
        return Err(Error::TokenTooLarge {
            size: data.len(),
            max: MAX_TOKEN_SIZE,
        });
    }

    let signed: SignedAccessToken = ciborium::de::from_reader(data)?;
    if signed.version != WIRE_VERSION {
        return Err(Error::MalformedInput(format!(
            "unsupported wire version {}",
            signed.version
        )));
    }
    Ok(signed)
}

/// Encode a signed token to a base64 string (for HTTP headers).
pub fn encode_base64(signed: &SignedAccessToken) -> Result<String> {
    let bytes = encode(signed)?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Decode a signed token from a base64 string.
///
/// Returns `TokenTooLarge` if the decoded bytes would exceed
/// [`MAX_TOKEN_SIZE`].
pub fn decode_base64(s: &str) -> Result<SignedAccessToken> {
    // 4 chars carry 3 bytes; estimate before allocating.
    let estimated_size = (s.len() * 3) / 4;
    if estimated_size > MAX_TOKEN_SIZE {
        return Err(Error::TokenTooLarge {
            size: estimated_size,
            max: MAX_TOKEN_SIZE,
        });
    }

    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| Error::MalformedInput(e.to_string()))?;
    decode(&bytes)
}
