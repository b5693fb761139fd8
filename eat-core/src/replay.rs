//! Replay protection.
//!
//! Every successfully consumed (token, signature) pair leaves a
//! [`Fingerprint`] in a [`ReplayStore`]. Once present, the same pair is
//! rejected with `AlreadyUsed` forever.

use crate::codec::hash_token_struct;
use crate::crypto::{keccak256_concat, Hash, Signature};
use crate::encoding;
use crate::token::AccessToken;
use std::collections::HashSet;
use std::fmt;
use std::sync::RwLock;

/// Unique identifier of a (token, signature) pair.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(Hash);

impl Fingerprint {
    /// `keccak256(r || s || hashToken(token))`.
    ///
    /// Low-`s` is enforced before anything is consumed, so `(r, s)` already
    /// pins down a single signature encoding.
    pub fn of(token: &AccessToken, signature: &Signature) -> Self {
        Fingerprint(keccak256_concat(&[
            &signature.r,
            &signature.s,
            &hash_token_struct(token),
        ]))
    }

    pub fn as_bytes(&self) -> &Hash {
        &self.0
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", encoding::to_hex(&self.0))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encoding::to_hex(&self.0))
    }
}

/// Storage for consumed fingerprints.
///
/// `consume` must be an atomic check-and-mark: of any number of concurrent
/// calls with the same fingerprint, exactly one returns `true`.
pub trait ReplayStore: Send + Sync + fmt::Debug {
    /// Whether `fingerprint` has been consumed.
    fn is_used(&self, fingerprint: &Fingerprint) -> bool;

    /// Mark `fingerprint` used. Returns `false` if it already was.
    fn consume(&self, fingerprint: Fingerprint) -> bool;

    /// Undo a `consume` whose enclosing guarded call aborted.
    fn release(&self, fingerprint: &Fingerprint);

    /// Number of consumed fingerprints.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory replay store.
#[derive(Debug, Default)]
pub struct MemoryReplayGuard {
    used: RwLock<HashSet<Fingerprint>>,
}

impl MemoryReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplayStore for MemoryReplayGuard {
    fn is_used(&self, fingerprint: &Fingerprint) -> bool {
        // A poisoned lock still holds a valid set; keep reading it.
        match self.used.read() {
            Ok(used) => used.contains(fingerprint),
            Err(poisoned) => poisoned.into_inner().contains(fingerprint),
        }
    }

    fn consume(&self, fingerprint: Fingerprint) -> bool {
        match self.used.write() {
            Ok(mut used) => used.insert(fingerprint),
            Err(poisoned) => poisoned.into_inner().insert(fingerprint),
        }
    }

    fn release(&self, fingerprint: &Fingerprint) {
        match self.used.write() {
            Ok(mut used) => used.remove(fingerprint),
            Err(poisoned) => poisoned.into_inner().remove(fingerprint),
        };
    }

    fn len(&self) -> usize {
        match self.used.read() {
            Ok(used) => used.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}
