//! Three-tier key hierarchy: root → intermediate → issuers.
//!
//! | Tier | Set by | Used for |
//! |------|--------|----------|
//! | Root | construction, once | rotating the intermediate |
//! | Intermediate | root | activating / deactivating issuers |
//! | Issuers | intermediate | signing access tokens |
//!
//! Authorization is strictly top-down; no tier can change a peer or an
//! ancestor. A compromised issuer can forge tokens only until the
//! intermediate deactivates it, and a compromised intermediate can never
//! touch the root.

use crate::error::{Error, Result};
use crate::identity::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An observable change to the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "key")]
pub enum KeyEvent {
    IntermediateRotated(Address),
    IssuerActivated(Address),
    IssuerDeactivated(Address),
}

/// Key state for one verifier.
///
/// Every mutation takes the acting identity as proof of authority; the
/// hierarchy itself decides whether that identity owns the required tier.
#[derive(Debug, Clone, Default)]
pub struct KeyHierarchy {
    root: Option<Address>,
    intermediate: Address,
    /// Activation order, for stable enumeration.
    issuers: Vec<Address>,
    issuer_index: HashSet<Address>,
}

impl KeyHierarchy {
    /// A hierarchy with `root` already set.
    pub fn new(root: Address) -> Self {
        Self {
            root: Some(root),
            ..Self::default()
        }
    }

    /// Set the root key. Fails if a root has been set before.
    pub fn initialize(&mut self, root: Address) -> Result<()> {
        if self.root.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        self.root = Some(root);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.root.is_some()
    }

    fn require_root(&self, caller: &Address) -> Result<()> {
        match self.root {
            None => Err(Error::NotInitialized),
            Some(root) if root == *caller => Ok(()),
            Some(_) => Err(Error::Unauthorized("root")),
        }
    }

    fn require_intermediate(&self, caller: &Address) -> Result<()> {
        // An unset intermediate is the zero address, which nobody can sign as.
        if self.intermediate.is_zero() || self.intermediate != *caller {
            return Err(Error::Unauthorized("intermediate"));
        }
        Ok(())
    }

    /// Replace the intermediate key. Only the root may do this.
    pub fn rotate_intermediate(
        &mut self,
        caller: &Address,
        new_intermediate: Address,
    ) -> Result<KeyEvent> {
        self.require_root(caller)?;
        self.intermediate = new_intermediate;
        Ok(KeyEvent::IntermediateRotated(new_intermediate))
    }

    /// Activate issuers. Only the intermediate may do this.
    ///
    /// Already-active entries (including repeats within `issuers`) are
    /// skipped and produce no event.
    pub fn activate_issuers(
        &mut self,
        caller: &Address,
        issuers: &[Address],
    ) -> Result<Vec<KeyEvent>> {
        self.require_intermediate(caller)?;
        let mut events = Vec::new();
        for issuer in issuers {
            if self.issuer_index.insert(*issuer) {
                self.issuers.push(*issuer);
                events.push(KeyEvent::IssuerActivated(*issuer));
            }
        }
        Ok(events)
    }

    /// Deactivate issuers. Only the intermediate may do this.
    ///
    /// Entries that are not active are skipped and produce no event.
    pub fn deactivate_issuers(
        &mut self,
        caller: &Address,
        issuers: &[Address],
    ) -> Result<Vec<KeyEvent>> {
        self.require_intermediate(caller)?;
        let mut events = Vec::new();
        for issuer in issuers {
            if self.issuer_index.remove(issuer) {
                events.push(KeyEvent::IssuerDeactivated(*issuer));
            }
        }
        if !events.is_empty() {
            let index = &self.issuer_index;
            self.issuers.retain(|a| index.contains(a));
        }
        Ok(events)
    }

    pub fn is_active_issuer(&self, identity: &Address) -> bool {
        self.issuer_index.contains(identity)
    }

    /// Active issuers in activation order.
    pub fn active_issuers(&self) -> &[Address] {
        &self.issuers
    }

    /// Root key, or the zero address before initialization.
    pub fn root_key(&self) -> Address {
        self.root.unwrap_or(Address::ZERO)
    }

    /// Intermediate key, or the zero address if never set.
    pub fn intermediate_key(&self) -> Address {
        self.intermediate
    }
}
