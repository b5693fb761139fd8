//! Structured-data hashing of access tokens (EIP-712).
//!
//! The signed message for a token is
//!
//! ```text
//! keccak256(0x19 0x01 || domainSeparator || hashToken(token))
//! ```
//!
//! where the domain separator binds the system name, version, chain id and
//! the verifying endpoint's own address. A token signed for one verifier is
//! therefore never valid against another.

use crate::crypto::{keccak256, keccak256_concat, Hash, Signature, SigningKey};
use crate::error::Result;
use crate::identity::Address;
use crate::token::{AccessToken, FunctionCall};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Default domain name.
pub const DOMAIN_NAME: &str = "Ethereum Access Token";

/// Default domain version.
pub const DOMAIN_VERSION: &str = "1";

const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";
const FUNCTION_CALL_TYPE: &str =
    "FunctionCall(bytes4 functionSignature,address target,address caller,bytes parameters)";
const ACCESS_TOKEN_TYPE: &str = "AccessToken(uint256 expiry,FunctionCall functionCall)";

/// `keccak256` of the domain type string.
pub fn domain_typehash() -> Hash {
    static HASH: OnceLock<Hash> = OnceLock::new();
    *HASH.get_or_init(|| keccak256(DOMAIN_TYPE))
}

/// `keccak256` of the `FunctionCall` type string.
pub fn function_call_typehash() -> Hash {
    static HASH: OnceLock<Hash> = OnceLock::new();
    *HASH.get_or_init(|| keccak256(FUNCTION_CALL_TYPE))
}

/// `keccak256` of the `AccessToken` type string, which appends its
/// referenced `FunctionCall` type.
pub fn access_token_typehash() -> Hash {
    static HASH: OnceLock<Hash> = OnceLock::new();
    *HASH.get_or_init(|| {
        keccak256_concat(&[ACCESS_TOKEN_TYPE.as_bytes(), FUNCTION_CALL_TYPE.as_bytes()])
    })
}

fn uint_word(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

/// The EIP-712 domain a verifier signs under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Domain {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        chain_id: u64,
        verifying_contract: Address,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            chain_id,
            verifying_contract,
        }
    }

    /// Domain with the default name and version.
    pub fn access_token(chain_id: u64, verifying_contract: Address) -> Self {
        Self::new(DOMAIN_NAME, DOMAIN_VERSION, chain_id, verifying_contract)
    }

    /// The domain separator.
    pub fn separator(&self) -> Hash {
        keccak256_concat(&[
            &domain_typehash(),
            &keccak256(self.name.as_bytes()),
            &keccak256(self.version.as_bytes()),
            &uint_word(self.chain_id),
            &self.verifying_contract.to_word(),
        ])
    }
}

/// Hash of the parameter blob. Parameters are opaque here.
pub fn hash_parameters(parameters: &[u8]) -> Hash {
    keccak256(parameters)
}

/// Struct hash of a [`FunctionCall`].
pub fn hash_function_call(call: &FunctionCall) -> Hash {
    keccak256_concat(&[
        &function_call_typehash(),
        &call.function_signature.to_word(),
        &call.target.to_word(),
        &call.caller.to_word(),
        &hash_parameters(&call.parameters),
    ])
}

/// Struct hash of an [`AccessToken`], independent of any domain.
pub fn hash_token_struct(token: &AccessToken) -> Hash {
    keccak256_concat(&[
        &access_token_typehash(),
        &uint_word(token.expiry),
        &hash_function_call(&token.function_call),
    ])
}

/// The message an issuer signs for `token` under a domain separator.
pub fn hash_token(domain_separator: &Hash, token: &AccessToken) -> Hash {
    keccak256_concat(&[&[0x19, 0x01], domain_separator, &hash_token_struct(token)])
}

impl SigningKey {
    /// Sign `token` for verification under `domain`.
    pub fn sign_token(&self, domain: &Domain, token: &AccessToken) -> Result<Signature> {
        self.sign_hash(&hash_token(&domain.separator(), token))
    }
}
