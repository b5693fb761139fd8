//! Cryptographic primitives for access tokens.
//!
//! Uses ECDSA over secp256k1 with public-key recovery and Keccak-256,
//! the same primitives wallets use for typed-data signing.
//!
//! ## Security Properties
//!
//! 1. **Malleability**: signatures whose `s` lies in the upper half of the
//!    curve order are rejected, so every valid signature has exactly one
//!    accepted encoding.
//! 2. **Recovery only**: [`recover_signer`] never compares against an
//!    expected key. Whether the recovered identity is acceptable is decided
//!    by the key hierarchy.

use crate::encoding;
use crate::error::{Error, Result};
use crate::identity::Address;
use k256::ecdsa::{
    RecoveryId, Signature as EcdsaSignature, SigningKey as K256SigningKey, VerifyingKey,
};
use rand::rngs::OsRng;
use secrecy::{CloneableSecret, ExposeSecret, Secret, Zeroize};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;

/// A 32-byte Keccak-256 digest.
pub type Hash = [u8; 32];

/// Half of the secp256k1 group order, big-endian.
pub const SECP256K1_HALF_ORDER: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b, 0x20, 0xa0,
];

/// Keccak-256 of `data`.
pub fn keccak256(data: impl AsRef<[u8]>) -> Hash {
    Keccak256::digest(data.as_ref()).into()
}

/// Keccak-256 over the concatenation of `parts`.
pub fn keccak256_concat(parts: &[&[u8]]) -> Hash {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

// ============================================================================
// Signature
// ============================================================================

/// A recoverable ECDSA signature in `(v, r, s)` form.
///
/// `v` is 27 or 28. No validation happens on construction so that malformed
/// input can be reported with a precise error at verification time.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature {
    pub v: u8,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl Signature {
    pub fn new(v: u8, r: [u8; 32], s: [u8; 32]) -> Self {
        Self { v, r, s }
    }

    /// Split a 65-byte `r || s || v` signature.
    ///
    /// A trailing recovery byte of 0 or 1 is lifted to 27/28, as some
    /// signers emit the raw recovery id.
    pub fn from_rsv_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 65 {
            return Err(Error::MalformedInput(format!(
                "signature must be 65 bytes, got {}",
                bytes.len()
            )));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        let v = match bytes[64] {
            v @ (0 | 1) => v + 27,
            v => v,
        };
        Ok(Self { v, r, s })
    }

    /// Parse a `0x`-prefixed 65-byte hex signature.
    pub fn from_hex(s: &str) -> Result<Self> {
        Self::from_rsv_bytes(&encoding::from_hex(s)?)
    }

    /// Concatenated `r || s || v`.
    pub fn to_rsv_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v;
        out
    }

    /// `0x`-prefixed hex of [`Self::to_rsv_bytes`].
    pub fn to_hex(&self) -> String {
        encoding::to_hex(&self.to_rsv_bytes())
    }

    /// Check the component ranges that can be judged without curve math.
    ///
    /// - `v` must be 27 or 28
    /// - `s` must not exceed half the curve order
    pub fn validate_components(&self) -> Result<()> {
        if self.v != 27 && self.v != 28 {
            return Err(Error::InvalidSignatureV(self.v));
        }
        // Big-endian byte arrays compare like the integers they encode.
        if self.s > SECP256K1_HALF_ORDER {
            return Err(Error::InvalidSignatureS);
        }
        Ok(())
    }

    fn recovery_id(&self) -> Result<RecoveryId> {
        RecoveryId::from_byte(self.v.wrapping_sub(27)).ok_or(Error::InvalidSignatureV(self.v))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("v", &self.v)
            .field("r", &encoding::to_hex(&self.r))
            .field("s", &encoding::to_hex(&self.s))
            .finish()
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        encoding::serialize_bytes(&self.to_rsv_bytes(), serializer)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = encoding::deserialize_bytes(deserializer)?;
        Signature::from_rsv_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

/// Recover the identity that produced `signature` over `hash`.
///
/// Fails with:
/// - [`Error::InvalidSignatureV`] if `v` is not 27 or 28
/// - [`Error::InvalidSignatureS`] if `s` exceeds half the curve order
/// - [`Error::InvalidSignature`] if `r`/`s` are out of range or no public
///   key can be recovered
///
/// A signature by the "wrong" key is not an error here; the caller decides
/// whether the returned identity is acceptable.
pub fn recover_signer(hash: &Hash, signature: &Signature) -> Result<Address> {
    signature.validate_components()?;
    let recovery_id = signature.recovery_id()?;

    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(&signature.r);
    rs[32..].copy_from_slice(&signature.s);
    let sig = EcdsaSignature::from_slice(&rs)?;
    let key = VerifyingKey::recover_from_prehash(hash, &sig, recovery_id)?;
    let signer = Address::from_verifying_key(&key);
    if signer.is_zero() {
        return Err(Error::InvalidSignature);
    }
    Ok(signer)
}

// ============================================================================
// Signing Key
// ============================================================================

/// An issuer's secp256k1 signing key.
///
/// The secret is held in [`Secret`] so it is zeroized on drop and never
/// printed by `Debug`.
#[derive(Clone)]
pub struct SigningKey {
    signing_key: Secret<K256SigningKeyWrapper>,
}

// k256's SigningKey zeroizes itself on drop; Zeroize is a no-op here.
struct K256SigningKeyWrapper(K256SigningKey);

impl Clone for K256SigningKeyWrapper {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl Zeroize for K256SigningKeyWrapper {
    fn zeroize(&mut self) {}
}

impl CloneableSecret for K256SigningKeyWrapper {}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("address", &self.address())
            .field("signing_key", &"***SECRET***")
            .finish()
    }
}

impl SigningKey {
    /// Generate a new random signing key.
    pub fn generate() -> Self {
        Self::wrap(K256SigningKey::random(&mut OsRng))
    }

    /// Create a signing key from 32 secret bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let key = K256SigningKey::from_slice(bytes)
            .map_err(|e| Error::InvalidKey(format!("invalid secp256k1 scalar: {}", e)))?;
        Ok(Self::wrap(key))
    }

    /// Create a signing key from a `0x`-prefixed hex secret.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = encoding::from_hex_fixed::<32>(s, "secret key")?;
        Self::from_bytes(&bytes)
    }

    fn wrap(key: K256SigningKey) -> Self {
        Self {
            signing_key: Secret::new(K256SigningKeyWrapper(key)),
        }
    }

    /// The identity this key signs as.
    pub fn address(&self) -> Address {
        Address::from_verifying_key(self.signing_key.expose_secret().0.verifying_key())
    }

    /// Get the secret key bytes.
    pub fn secret_key_bytes(&self) -> [u8; 32] {
        self.signing_key.expose_secret().0.to_bytes().into()
    }

    /// Sign a 32-byte digest, producing a low-`s` `(v, r, s)` signature.
    pub fn sign_hash(&self, hash: &Hash) -> Result<Signature> {
        let (sig, recovery_id) = self
            .signing_key
            .expose_secret()
            .0
            .sign_prehash_recoverable(hash)
            .map_err(|e| Error::InvalidKey(e.to_string()))?;

        // Negating s mirrors R across the x-axis, flipping y parity.
        let (sig, recovery_id) = match sig.normalize_s() {
            Some(normalized) => (
                normalized,
                RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced()),
            ),
            None => (sig, recovery_id),
        };

        let bytes = sig.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Ok(Signature {
            v: 27 + recovery_id.to_byte(),
            r,
            s,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Secret key 1 maps to a well-known address.
    const KEY_ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn test_keccak_empty() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_keccak_concat_matches_single() {
        assert_eq!(keccak256_concat(&[b"ab", b"cd"]), keccak256(b"abcd"));
    }

    #[test]
    fn test_known_address() {
        let key = SigningKey::from_hex(KEY_ONE).unwrap();
        assert_eq!(
            key.address().to_string(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_zero_secret_rejected() {
        assert!(matches!(
            SigningKey::from_bytes(&[0u8; 32]),
            Err(Error::InvalidKey(_))
        ));
    }

    #[test]
    fn test_sign_and_recover() {
        let key = SigningKey::generate();
        let hash = keccak256(b"message");
        let sig = key.sign_hash(&hash).unwrap();

        assert!(sig.v == 27 || sig.v == 28);
        assert!(sig.s <= SECP256K1_HALF_ORDER);
        assert_eq!(recover_signer(&hash, &sig).unwrap(), key.address());
    }

    #[test]
    fn test_recover_other_message_gives_other_identity() {
        let key = SigningKey::generate();
        let sig = key.sign_hash(&keccak256(b"message")).unwrap();

        match recover_signer(&keccak256(b"other"), &sig) {
            Ok(addr) => assert_ne!(addr, key.address()),
            Err(e) => assert_eq!(e, Error::InvalidSignature),
        }
    }

    #[test]
    fn test_invalid_v_rejected() {
        let key = SigningKey::generate();
        let hash = keccak256(b"message");
        let mut sig = key.sign_hash(&hash).unwrap();
        sig.v = 29;
        assert_eq!(recover_signer(&hash, &sig), Err(Error::InvalidSignatureV(29)));
        sig.v = 0;
        assert_eq!(recover_signer(&hash, &sig), Err(Error::InvalidSignatureV(0)));
    }

    #[test]
    fn test_high_s_rejected() {
        let key = SigningKey::generate();
        let hash = keccak256(b"message");
        let mut sig = key.sign_hash(&hash).unwrap();
        sig.s = [0xff; 32];
        assert_eq!(recover_signer(&hash, &sig), Err(Error::InvalidSignatureS));

        let mut boundary = SECP256K1_HALF_ORDER;
        boundary[31] += 1;
        sig.s = boundary;
        assert_eq!(recover_signer(&hash, &sig), Err(Error::InvalidSignatureS));
    }

    #[test]
    fn test_zero_r_rejected() {
        let key = SigningKey::generate();
        let hash = keccak256(b"message");
        let mut sig = key.sign_hash(&hash).unwrap();
        sig.r = [0u8; 32];
        assert_eq!(recover_signer(&hash, &sig), Err(Error::InvalidSignature));
    }

    #[test]
    fn test_rsv_roundtrip() {
        let key = SigningKey::generate();
        let sig = key.sign_hash(&keccak256(b"x")).unwrap();
        let parsed = Signature::from_hex(&sig.to_hex()).unwrap();
        assert_eq!(parsed, sig);
    }

    #[test]
    fn test_raw_recovery_byte_lifted() {
        let mut bytes = [0u8; 65];
        bytes[64] = 1;
        assert_eq!(Signature::from_rsv_bytes(&bytes).unwrap().v, 28);
        assert!(Signature::from_rsv_bytes(&bytes[..64]).is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let key = SigningKey::from_hex(KEY_ONE).unwrap();
        let debug = format!("{:?}", key);
        assert!(debug.contains("***SECRET***"));
        assert!(!debug.contains("0000000000000000000000000000000000000000000000000000000000000001"));
    }

    #[test]
    fn test_secret_roundtrip() {
        let key = SigningKey::generate();
        let restored = SigningKey::from_bytes(&key.secret_key_bytes()).unwrap();
        assert_eq!(key.address(), restored.address());
    }
}
