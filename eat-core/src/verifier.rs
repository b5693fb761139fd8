//! Token verification and single-use consumption.
//!
//! A verification attempt moves through a fixed sequence of checks and
//! short-circuits on the first failure:
//!
//! 1. signature components (`v`, low `s`)
//! 2. expiry (`now <= expiry`)
//! 3. signer recovery over the caller-supplied token, then issuer membership
//! 4. replay guard
//! 5. mark consumed
//!
//! [`AccessTokenVerifier::verify`] runs 1-3 without touching any state.
//! [`AccessTokenVerifier::verify_and_consume`] runs all five, and steps 3-5
//! happen under the key-state read lock so a concurrent rotation is either
//! fully before or fully after the consumption.
//!
//! Membership misses and binding mismatches both surface as
//! [`Error::VerificationFailure`]. The two cases are indistinguishable from
//! the outside, and the logs do not separate them either.

use crate::audit::{self, AuditEvent, AuditEventType, AuditLogger};
use crate::codec::{hash_token, Domain};
use crate::config::VerifierConfig;
use crate::crypto::{recover_signer, Hash, Signature};
use crate::error::{Error, Result};
use crate::identity::Address;
use crate::keys::{KeyEvent, KeyHierarchy};
use crate::replay::{Fingerprint, MemoryReplayGuard, ReplayStore};
use crate::token::{unix_now, AccessToken};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

/// Verifies access tokens for one endpoint and tracks which have been used.
#[derive(Debug)]
pub struct AccessTokenVerifier {
    domain: Domain,
    separator: Hash,
    keys: RwLock<KeyHierarchy>,
    replay: Arc<dyn ReplayStore>,
    audit: Option<Arc<dyn AuditLogger>>,
}

impl AccessTokenVerifier {
    /// A verifier for `domain` whose hierarchy is rooted at `root`.
    pub fn new(domain: Domain, root: Address) -> Self {
        Self::with_replay_store(domain, root, Arc::new(MemoryReplayGuard::new()))
    }

    /// Like [`Self::new`], with a custom replay store.
    pub fn with_replay_store(
        domain: Domain,
        root: Address,
        replay: Arc<dyn ReplayStore>,
    ) -> Self {
        let separator = domain.separator();
        info!(
            verifier = %domain.verifying_contract,
            chain_id = domain.chain_id,
            root = %root,
            "access token verifier initialized"
        );
        Self {
            domain,
            separator,
            keys: RwLock::new(KeyHierarchy::new(root)),
            replay,
            audit: None,
        }
    }

    /// Build a verifier from configuration.
    ///
    /// The configured intermediate and issuers are installed through the
    /// regular authorized rotations, acting as root and then as the
    /// intermediate.
    pub fn from_config(config: &VerifierConfig) -> Result<Self> {
        let verifier = Self::new(config.domain.to_domain(), config.keys.root);

        match config.keys.intermediate {
            Some(intermediate) => {
                verifier.rotate_intermediate(&config.keys.root, intermediate)?;
                if !config.keys.issuers.is_empty() {
                    verifier.activate_issuers(&intermediate, &config.keys.issuers)?;
                }
            }
            None if !config.keys.issuers.is_empty() => {
                return Err(Error::InvalidConfiguration(
                    "issuers require an intermediate key".into(),
                ));
            }
            None => {}
        }

        Ok(verifier)
    }

    /// Send audit events to `logger` instead of the global logger.
    pub fn with_audit_logger(mut self, logger: Arc<dyn AuditLogger>) -> Self {
        self.audit = Some(logger);
        self
    }

    // A panic while holding the lock cannot leave the hierarchy half
    // updated; every mutation validates before writing.
    fn keys(&self) -> RwLockReadGuard<'_, KeyHierarchy> {
        self.keys.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn keys_mut(&self) -> RwLockWriteGuard<'_, KeyHierarchy> {
        self.keys
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: AuditEvent) {
        match &self.audit {
            Some(logger) => logger.log(event),
            None => audit::log_event(event),
        }
    }

    fn record_key_event(&self, event: &KeyEvent, actor: &Address) {
        info!(event = ?event, actor = %actor, "key hierarchy changed");
        self.emit(AuditEvent::from_key_event(
            event,
            self.domain.verifying_contract,
            *actor,
        ));
    }

    // =========================================================================
    // Key administration
    // =========================================================================

    /// Replace the intermediate key. `caller` must be the root.
    pub fn rotate_intermediate(
        &self,
        caller: &Address,
        new_intermediate: Address,
    ) -> Result<KeyEvent> {
        let event = self
            .keys_mut()
            .rotate_intermediate(caller, new_intermediate)
            .inspect_err(|e| warn!(caller = %caller, error = %e, "intermediate rotation refused"))?;
        self.record_key_event(&event, caller);
        Ok(event)
    }

    /// Activate issuers. `caller` must be the intermediate.
    pub fn activate_issuers(
        &self,
        caller: &Address,
        issuers: &[Address],
    ) -> Result<Vec<KeyEvent>> {
        let events = self
            .keys_mut()
            .activate_issuers(caller, issuers)
            .inspect_err(|e| warn!(caller = %caller, error = %e, "issuer activation refused"))?;
        for event in &events {
            self.record_key_event(event, caller);
        }
        Ok(events)
    }

    /// Deactivate issuers. `caller` must be the intermediate.
    pub fn deactivate_issuers(
        &self,
        caller: &Address,
        issuers: &[Address],
    ) -> Result<Vec<KeyEvent>> {
        let events = self
            .keys_mut()
            .deactivate_issuers(caller, issuers)
            .inspect_err(|e| warn!(caller = %caller, error = %e, "issuer deactivation refused"))?;
        for event in &events {
            self.record_key_event(event, caller);
        }
        Ok(events)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn domain_separator(&self) -> Hash {
        self.separator
    }

    /// Identity of the endpoint this verifier guards.
    pub fn address(&self) -> Address {
        self.domain.verifying_contract
    }

    pub fn root_key(&self) -> Address {
        self.keys().root_key()
    }

    pub fn intermediate_key(&self) -> Address {
        self.keys().intermediate_key()
    }

    pub fn is_active_issuer(&self, identity: &Address) -> bool {
        self.keys().is_active_issuer(identity)
    }

    /// Active issuers in activation order.
    pub fn active_issuers(&self) -> Vec<Address> {
        self.keys().active_issuers().to_vec()
    }

    /// Whether this (token, signature) pair has already been consumed.
    pub fn is_consumed(&self, token: &AccessToken, signature: &Signature) -> bool {
        self.replay.is_used(&Fingerprint::of(token, signature))
    }

    /// The digest an issuer must sign for `token` to be valid here.
    pub fn digest(&self, token: &AccessToken) -> Hash {
        hash_token(&self.separator, token)
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Recover whoever signed `token`, with no expiry or membership checks.
    pub fn verify_signer_of(&self, token: &AccessToken, signature: &Signature) -> Result<Address> {
        recover_signer(&self.digest(token), signature)
    }

    /// Dry run against the wall clock. See [`Self::verify_at`].
    pub fn verify(&self, token: &AccessToken, signature: &Signature) -> Result<bool> {
        self.verify_at(token, signature, unix_now())
    }

    /// Check signature, expiry and issuer membership without consuming.
    ///
    /// Malformed signatures and expired tokens are errors. A well-formed
    /// signature by anyone other than an active issuer (including a valid
    /// signature over different fields) yields `Ok(false)`.
    pub fn verify_at(&self, token: &AccessToken, signature: &Signature, now: u64) -> Result<bool> {
        let signer = self.check_signature_and_expiry(token, signature, now)?;
        Ok(self.keys().is_active_issuer(&signer))
    }

    /// Verify and consume against the wall clock.
    pub fn verify_and_consume(&self, token: &AccessToken, signature: &Signature) -> Result<()> {
        self.verify_and_consume_at(token, signature, unix_now())
    }

    /// Verify and mark the pair used. Succeeds at most once per pair.
    pub fn verify_and_consume_at(
        &self,
        token: &AccessToken,
        signature: &Signature,
        now: u64,
    ) -> Result<()> {
        self.consume_at(token, signature, now).map(|_| ())
    }

    /// Consume and hand back the fingerprint so a guarded call can undo it.
    pub(crate) fn consume_at(
        &self,
        token: &AccessToken,
        signature: &Signature,
        now: u64,
    ) -> Result<Fingerprint> {
        let caller = token.function_call.caller;
        match self.check_and_consume(token, signature, now) {
            Ok(fingerprint) => {
                info!(
                    fingerprint = %fingerprint,
                    caller = %caller,
                    selector = %token.function_call.function_signature,
                    "access token consumed"
                );
                self.emit(
                    AuditEvent::new(AuditEventType::TokenConsumed, self.address(), caller)
                        .with_subject(fingerprint.to_string()),
                );
                Ok(fingerprint)
            }
            Err(e) => {
                warn!(
                    caller = %caller,
                    selector = %token.function_call.function_signature,
                    reason = e.short(),
                    "access token rejected"
                );
                self.emit(
                    AuditEvent::new(AuditEventType::TokenRejected, self.address(), caller)
                        .with_reason(e.short()),
                );
                Err(e)
            }
        }
    }

    /// Undo a consumption whose guarded call failed.
    pub(crate) fn rollback(&self, fingerprint: &Fingerprint, caller: Address) {
        self.replay.release(fingerprint);
        info!(fingerprint = %fingerprint, caller = %caller, "access token released");
        self.emit(
            AuditEvent::new(AuditEventType::TokenReleased, self.address(), caller)
                .with_subject(fingerprint.to_string()),
        );
    }

    fn check_signature_and_expiry(
        &self,
        token: &AccessToken,
        signature: &Signature,
        now: u64,
    ) -> Result<Address> {
        signature.validate_components()?;
        if token.is_expired_at(now) {
            return Err(Error::Expired {
                expiry: token.expiry,
                now,
            });
        }
        recover_signer(&self.digest(token), signature)
    }

    fn check_and_consume(
        &self,
        token: &AccessToken,
        signature: &Signature,
        now: u64,
    ) -> Result<Fingerprint> {
        let signer = self.check_signature_and_expiry(token, signature, now)?;

        let keys = self.keys();
        if !keys.is_active_issuer(&signer) {
            return Err(Error::VerificationFailure);
        }

        let fingerprint = Fingerprint::of(token, signature);
        if !self.replay.consume(fingerprint) {
            return Err(Error::AlreadyUsed);
        }
        drop(keys);

        Ok(fingerprint)
    }
}
