//! Hex helpers shared by identities, selectors, parameters and signatures.
//!
//! Human-readable formats (JSON, YAML) carry `0x`-prefixed lowercase hex.
//! Binary formats (CBOR) carry raw byte strings.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serializer};

/// Encode bytes as `0x`-prefixed lowercase hex.
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode hex with an optional `0x`/`0X` prefix.
pub fn from_hex(s: &str) -> Result<Vec<u8>> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    Ok(hex::decode(digits)?)
}

/// Decode hex into a fixed-width array, rejecting any other length.
pub fn from_hex_fixed<const N: usize>(s: &str, what: &str) -> Result<[u8; N]> {
    let bytes = from_hex(s)?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| Error::MalformedInput(format!("{} must be {} bytes, got {}", what, N, len)))
}

pub(crate) fn serialize_bytes<S>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if serializer.is_human_readable() {
        serializer.serialize_str(&to_hex(bytes))
    } else {
        serializer.serialize_bytes(bytes)
    }
}

pub(crate) fn deserialize_bytes<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    if deserializer.is_human_readable() {
        let s = String::deserialize(deserializer)?;
        from_hex(&s).map_err(serde::de::Error::custom)
    } else {
        let buf = serde_bytes::ByteBuf::deserialize(deserializer)?;
        Ok(buf.into_vec())
    }
}

pub(crate) fn deserialize_fixed<'de, D, const N: usize>(
    deserializer: D,
    what: &'static str,
) -> std::result::Result<[u8; N], D::Error>
where
    D: Deserializer<'de>,
{
    let bytes = deserialize_bytes(deserializer)?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| {
        serde::de::Error::custom(format!("{} must be {} bytes, got {}", what, N, len))
    })
}

/// `#[serde(with = "...")]` adapter for `Vec<u8>` fields.
pub mod hex_bytes {
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        super::serialize_bytes(bytes, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        super::deserialize_bytes(deserializer)
    }
}

/// `#[serde(with = "...")]` adapter for 32-byte words.
pub mod hex_word {
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(word: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        super::serialize_bytes(word, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        super::deserialize_fixed::<D, 32>(deserializer, "word")
    }
}
