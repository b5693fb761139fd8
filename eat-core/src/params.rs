//! Canonical parameter packing.
//!
//! Call arguments are modelled as an ordered list of tagged values and
//! serialized with the Ethereum ABI tuple layout: one 32-byte head word per
//! argument, with `bytes`/`string` values stored as an offset in the head
//! and `length || right-padded data` in the tail.
//!
//! Packing never interprets values beyond this re-serialization; the
//! resulting blob is hashed as opaque bytes.

use crate::encoding;
use crate::error::{Error, Result};
use crate::identity::Address;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const WORD: usize = 32;

/// A `bytes1`..`bytes32` value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FixedBytes(Vec<u8>);

impl FixedBytes {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() || bytes.len() > WORD {
            return Err(Error::MalformedInput(format!(
                "fixed bytes must be 1..=32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<Vec<u8>> for FixedBytes {
    type Error = Error;

    fn try_from(bytes: Vec<u8>) -> Result<Self> {
        Self::new(bytes)
    }
}

impl From<FixedBytes> for Vec<u8> {
    fn from(fixed: FixedBytes) -> Self {
        fixed.0
    }
}

impl Serialize for FixedBytes {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        encoding::serialize_bytes(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for FixedBytes {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = encoding::deserialize_bytes(deserializer)?;
        Self::new(bytes).map_err(serde::de::Error::custom)
    }
}

/// One typed call argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Parameter {
    Address(Address),
    /// Big-endian 256-bit unsigned integer.
    Uint256(#[serde(with = "encoding::hex_word")] [u8; 32]),
    Bool(bool),
    FixedBytes(FixedBytes),
    Bytes(#[serde(with = "encoding::hex_bytes")] Vec<u8>),
    String(String),
}

impl Parameter {
    /// `uint256` from a native integer.
    pub fn uint(value: u128) -> Self {
        let mut word = [0u8; 32];
        word[16..].copy_from_slice(&value.to_be_bytes());
        Parameter::Uint256(word)
    }

    /// ABI type name, as used in canonical function signatures.
    pub fn type_name(&self) -> String {
        match self {
            Parameter::Address(_) => "address".into(),
            Parameter::Uint256(_) => "uint256".into(),
            Parameter::Bool(_) => "bool".into(),
            Parameter::FixedBytes(b) => format!("bytes{}", b.as_bytes().len()),
            Parameter::Bytes(_) => "bytes".into(),
            Parameter::String(_) => "string".into(),
        }
    }

    fn is_dynamic(&self) -> bool {
        matches!(self, Parameter::Bytes(_) | Parameter::String(_))
    }

    fn head_word(&self) -> [u8; 32] {
        match self {
            Parameter::Address(a) => a.to_word(),
            Parameter::Uint256(w) => *w,
            Parameter::Bool(b) => uint_word(u128::from(*b)),
            Parameter::FixedBytes(b) => {
                let mut word = [0u8; 32];
                word[..b.as_bytes().len()].copy_from_slice(b.as_bytes());
                word
            }
            // Dynamic values get their offset written by the packer.
            Parameter::Bytes(_) | Parameter::String(_) => [0u8; 32],
        }
    }

    fn tail(&self) -> Option<&[u8]> {
        match self {
            Parameter::Bytes(b) => Some(b),
            Parameter::String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }
}

impl From<Address> for Parameter {
    fn from(a: Address) -> Self {
        Parameter::Address(a)
    }
}

impl From<bool> for Parameter {
    fn from(b: bool) -> Self {
        Parameter::Bool(b)
    }
}

impl From<u64> for Parameter {
    fn from(v: u64) -> Self {
        Parameter::uint(u128::from(v))
    }
}

impl From<&str> for Parameter {
    fn from(s: &str) -> Self {
        Parameter::String(s.to_string())
    }
}

fn uint_word(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(WORD) * WORD
}

/// Pack parameters into their canonical byte encoding.
///
/// An empty list packs to an empty blob.
pub fn pack_parameters(params: &[Parameter]) -> Vec<u8> {
    let head_len = params.len() * WORD;
    let tail_len: usize = params
        .iter()
        .filter_map(Parameter::tail)
        .map(|data| WORD + padded_len(data.len()))
        .sum();

    let mut head = Vec::with_capacity(head_len + tail_len);
    let mut tail = Vec::with_capacity(tail_len);

    for param in params {
        match param.tail() {
            Some(data) => {
                let offset = head_len + tail.len();
                head.extend_from_slice(&uint_word(offset as u128));
                tail.extend_from_slice(&uint_word(data.len() as u128));
                tail.extend_from_slice(data);
                tail.resize(tail.len() + padded_len(data.len()) - data.len(), 0);
            }
            None => head.extend_from_slice(&param.head_word()),
        }
    }

    debug_assert!(params.iter().all(|p| p.is_dynamic() == p.tail().is_some()));
    head.extend_from_slice(&tail);
    head
}

/// Canonical function signature, e.g. `lend(address,uint256)`.
pub fn canonical_signature(name: &str, params: &[Parameter]) -> String {
    let types: Vec<String> = params.iter().map(Parameter::type_name).collect();
    format!("{}({})", name, types.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_packs_to_empty() {
        assert!(pack_parameters(&[]).is_empty());
    }

    #[test]
    fn test_address_and_amount() {
        // Same layout as a left-padded address word followed by a uint word.
        let token: Address = "0x25af0cca791baee922d9fa0744880ae6e0422021".parse().unwrap();
        let packed = pack_parameters(&[Parameter::Address(token), Parameter::uint(5)]);

        let expected = format!(
            "{:0>64}{:0>64}",
            "25af0cca791baee922d9fa0744880ae6e0422021", "5"
        );
        assert_eq!(hex::encode(packed), expected);
    }

    #[test]
    fn test_dynamic_bytes_layout() {
        let packed = pack_parameters(&[Parameter::uint(1), Parameter::Bytes(vec![0xab, 0xcd])]);

        assert_eq!(packed.len(), 4 * WORD);
        // head[1] is the offset of the tail: two head words.
        assert_eq!(packed[2 * WORD - 1], 0x40);
        // tail: length word then padded data
        assert_eq!(packed[3 * WORD - 1], 2);
        assert_eq!(&packed[3 * WORD..3 * WORD + 2], &[0xab, 0xcd]);
        assert!(packed[3 * WORD + 2..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_two_dynamic_values_offsets() {
        let packed = pack_parameters(&[
            Parameter::String("hi".into()),
            Parameter::Bytes(vec![1u8; 33]),
        ]);
        // heads: 2 words; first tail: 2 words; second tail: 1 + 2 words
        assert_eq!(packed.len(), 7 * WORD);
        assert_eq!(packed[WORD - 1], 0x40);
        assert_eq!(packed[2 * WORD - 1], 0x80);
    }

    #[test]
    fn test_order_is_preserved() {
        let a = Address::from_bytes([1; 20]);
        let b = Address::from_bytes([2; 20]);
        assert_ne!(
            pack_parameters(&[a.into(), b.into()]),
            pack_parameters(&[b.into(), a.into()])
        );
    }

    #[test]
    fn test_fixed_bytes_bounds() {
        assert!(FixedBytes::new(vec![]).is_err());
        assert!(FixedBytes::new(vec![0u8; 33]).is_err());
        let fixed = FixedBytes::new(vec![0xaa; 4]).unwrap();
        let packed = pack_parameters(&[Parameter::FixedBytes(fixed)]);
        assert_eq!(&packed[..4], &[0xaa; 4]);
        assert_eq!(&packed[4..], &[0u8; 28]);
    }

    #[test]
    fn test_canonical_signature() {
        let params = [
            Parameter::Address(Address::ZERO),
            Parameter::uint(42),
            Parameter::Bool(true),
            Parameter::FixedBytes(FixedBytes::new(vec![0; 32]).unwrap()),
            Parameter::Bytes(vec![]),
            Parameter::String(String::new()),
        ];
        assert_eq!(
            canonical_signature("f", &params),
            "f(address,uint256,bool,bytes32,bytes,string)"
        );
    }

    #[test]
    fn test_tagged_json() {
        let p = Parameter::Bool(true);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["kind"], "bool");
        assert_eq!(json["value"], true);
    }

    #[test]
    fn test_byte_values_are_hex_in_json() {
        let params = vec![
            Parameter::Bytes(vec![0xab, 0xcd]),
            Parameter::uint(1),
            Parameter::FixedBytes(FixedBytes::new(vec![0xde, 0xad]).unwrap()),
        ];
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json[0]["value"], "0xabcd");
        assert_eq!(
            json[1]["value"],
            "0x0000000000000000000000000000000000000000000000000000000000000001"
        );
        assert_eq!(json[2]["kind"], "fixed_bytes");
        assert_eq!(json[2]["value"], "0xdead");

        let back: Vec<Parameter> = serde_json::from_value(json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn test_oversized_fixed_bytes_rejected_in_json() {
        let json = format!(r#"{{"kind":"fixed_bytes","value":"0x{}"}}"#, "00".repeat(33));
        assert!(serde_json::from_str::<Parameter>(&json).is_err());
    }
}
