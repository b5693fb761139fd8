//! Access tokens and the function calls they are bound to.
//!
//! A token authorizes exactly one call shape: a function selector on a
//! target, invoked by a specific caller with specific parameter bytes,
//! until an expiry timestamp. Two tokens are equal iff every field is
//! bytewise equal.

use crate::crypto::keccak256;
use crate::encoding::{self, hex_bytes};
use crate::error::{Error, Result};
use crate::identity::Address;
use crate::params::{pack_parameters, Parameter};
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Selector
// ============================================================================

/// A 4-byte function selector.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct Selector([u8; 4]);

impl Selector {
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Selector(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Selector of a canonical function signature such as
    /// `transfer(address,uint256)`.
    pub fn from_signature(signature: &str) -> Self {
        let hash = keccak256(signature.as_bytes());
        Selector([hash[0], hash[1], hash[2], hash[3]])
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        encoding::from_hex_fixed::<4>(s, "selector").map(Selector)
    }

    /// Right-pad to a 32-byte word (`bytes4` encoding).
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[..4].copy_from_slice(&self.0);
        word
    }
}

impl From<[u8; 4]> for Selector {
    fn from(bytes: [u8; 4]) -> Self {
        Selector(bytes)
    }
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encoding::to_hex(&self.0))
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Selector({})", self)
    }
}

impl Serialize for Selector {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        encoding::serialize_bytes(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        encoding::deserialize_fixed::<D, 4>(deserializer, "selector").map(Selector)
    }
}

// ============================================================================
// Function Call / Access Token
// ============================================================================

/// The call a token is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCall {
    /// Selector of the guarded function.
    pub function_signature: Selector,
    /// Endpoint the call must be directed at.
    pub target: Address,
    /// Identity allowed to make the call.
    pub caller: Address,
    /// Canonical encoding of the call arguments.
    #[serde(with = "hex_bytes")]
    pub parameters: Vec<u8>,
}

/// A signed-over capability: `expiry` plus the bound function call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    /// Unix timestamp (seconds). The token is valid while `now <= expiry`.
    pub expiry: u64,
    pub function_call: FunctionCall,
}

impl AccessToken {
    pub fn new(expiry: u64, function_call: FunctionCall) -> Self {
        Self {
            expiry,
            function_call,
        }
    }

    /// Start building a token.
    pub fn builder() -> AccessTokenBuilder {
        AccessTokenBuilder::new()
    }

    /// Whether the token has expired at `now`. A token is still valid at
    /// exactly its expiry second.
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expiry < now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_now())
    }
}

/// Current wall-clock time as unix seconds.
pub fn unix_now() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

/// Builder for [`AccessToken`].
///
/// ```rust,ignore
/// let token = AccessToken::builder()
///     .function("transfer(address,uint256)")
///     .target(vault)
///     .caller(alice)
///     .params(&[Parameter::Address(bob), Parameter::uint(100)])
///     .ttl(Duration::from_secs(60))
///     .build()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct AccessTokenBuilder {
    selector: Option<Selector>,
    target: Option<Address>,
    caller: Option<Address>,
    parameters: Vec<u8>,
    expiry: Option<u64>,
}

impl AccessTokenBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to the selector of a canonical function signature.
    pub fn function(mut self, signature: &str) -> Self {
        self.selector = Some(Selector::from_signature(signature));
        self
    }

    /// Bind to an explicit selector.
    pub fn selector(mut self, selector: Selector) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn target(mut self, target: Address) -> Self {
        self.target = Some(target);
        self
    }

    pub fn caller(mut self, caller: Address) -> Self {
        self.caller = Some(caller);
        self
    }

    /// Typed parameters, packed canonically.
    pub fn params(mut self, params: &[Parameter]) -> Self {
        self.parameters = pack_parameters(params);
        self
    }

    /// Pre-encoded parameter bytes.
    pub fn raw_parameters(mut self, parameters: impl Into<Vec<u8>>) -> Self {
        self.parameters = parameters.into();
        self
    }

    /// Absolute expiry (unix seconds).
    pub fn expiry(mut self, expiry: u64) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Expiry relative to now.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.expiry = Some(unix_now().saturating_add(ttl.as_secs()));
        self
    }

    pub fn build(self) -> Result<AccessToken> {
        let function_signature = self
            .selector
            .ok_or_else(|| Error::MalformedInput("function selector is required".into()))?;
        let target = self
            .target
            .ok_or_else(|| Error::MalformedInput("target is required".into()))?;
        let caller = self
            .caller
            .ok_or_else(|| Error::MalformedInput("caller is required".into()))?;
        let expiry = self
            .expiry
            .ok_or_else(|| Error::MalformedInput("expiry or ttl is required".into()))?;

        Ok(AccessToken {
            expiry,
            function_call: FunctionCall {
                function_signature,
                target,
                caller,
                parameters: self.parameters,
            },
        })
    }
}
