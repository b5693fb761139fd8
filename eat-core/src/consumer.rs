//! Token-gated calls.
//!
//! A guarded function receives `(signature, expiry, ...args)`. Everything
//! else the token is bound to comes from the [`CallContext`] the host
//! environment supplies: who is calling, which endpoint is executing, which
//! function is being entered and with what arguments. The token is rebuilt
//! from that context and never taken from the request payload, so a token
//! issued for one caller, endpoint or argument list cannot be replayed
//! against another.

use crate::crypto::Signature;
use crate::error::{Error, Result};
use crate::identity::Address;
use crate::params::{canonical_signature, pack_parameters, Parameter};
use crate::replay::Fingerprint;
use crate::token::{unix_now, AccessToken, FunctionCall, Selector};
use crate::verifier::AccessTokenVerifier;
use std::sync::Arc;
use tracing::debug;

/// The invocation a token must match.
///
/// Must be assembled from trusted host state, never from attacker-supplied
/// fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// Immediate caller of the guarded function.
    pub caller: Address,
    /// Endpoint executing the guarded function.
    pub target: Address,
    /// Selector of the guarded function.
    pub selector: Selector,
    /// Canonically packed arguments.
    pub parameters: Vec<u8>,
}

impl CallContext {
    pub fn new(
        caller: Address,
        target: Address,
        selector: Selector,
        parameters: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            caller,
            target,
            selector,
            parameters: parameters.into(),
        }
    }

    /// Context for `name(args...)`, deriving the selector from the
    /// canonical signature of `args`.
    pub fn for_function(
        caller: Address,
        target: Address,
        name: &str,
        args: &[Parameter],
    ) -> Self {
        let selector = Selector::from_signature(&canonical_signature(name, args));
        Self::new(caller, target, selector, pack_parameters(args))
    }

    /// The token this context expects, with the given expiry.
    pub fn to_token(&self, expiry: u64) -> AccessToken {
        AccessToken::new(
            expiry,
            FunctionCall {
                function_signature: self.selector,
                target: self.target,
                caller: self.caller,
                parameters: self.parameters.clone(),
            },
        )
    }
}

/// Rolls a consumption back unless the guarded call completed.
struct Consumption<'a> {
    verifier: &'a AccessTokenVerifier,
    fingerprint: Fingerprint,
    caller: Address,
    committed: bool,
}

impl Drop for Consumption<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.verifier.rollback(&self.fingerprint, self.caller);
        }
    }
}

/// An endpoint whose functions are gated by access tokens.
#[derive(Debug, Clone)]
pub struct AccessTokenConsumer {
    verifier: Arc<AccessTokenVerifier>,
    address: Address,
}

impl AccessTokenConsumer {
    /// A consumer at `address` trusting `verifier`.
    pub fn new(verifier: Arc<AccessTokenVerifier>, address: Address) -> Self {
        Self { verifier, address }
    }

    pub fn verifier(&self) -> &Arc<AccessTokenVerifier> {
        &self.verifier
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Context for a call into this endpoint.
    pub fn context(&self, caller: Address, name: &str, args: &[Parameter]) -> CallContext {
        CallContext::for_function(caller, self.address, name, args)
    }

    /// Run `f` if the token for `ctx` verifies, against the wall clock.
    pub fn call<T, E, F>(
        &self,
        ctx: &CallContext,
        signature: &Signature,
        expiry: u64,
        f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: From<Error>,
    {
        self.call_at(ctx, signature, expiry, unix_now(), f)
    }

    /// Verify and consume the token rebuilt from `ctx`, then run `f`.
    ///
    /// If `f` fails (or panics) the token is released again, so the call as
    /// a whole has no effect and the same token may be retried.
    pub fn call_at<T, E, F>(
        &self,
        ctx: &CallContext,
        signature: &Signature,
        expiry: u64,
        now: u64,
        f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: From<Error>,
    {
        let fingerprint = self.consume(ctx, signature, expiry, now)?;
        let mut consumption = Consumption {
            verifier: &self.verifier,
            fingerprint,
            caller: ctx.caller,
            committed: false,
        };

        let result = f();
        if result.is_ok() {
            consumption.committed = true;
        } else {
            debug!(caller = %ctx.caller, selector = %ctx.selector, "guarded call failed");
        }
        result
    }

    /// Verify and consume without running anything.
    pub fn check(&self, ctx: &CallContext, signature: &Signature, expiry: u64) -> Result<()> {
        self.consume(ctx, signature, expiry, unix_now()).map(|_| ())
    }

    fn consume(
        &self,
        ctx: &CallContext,
        signature: &Signature,
        expiry: u64,
        now: u64,
    ) -> Result<Fingerprint> {
        if ctx.target != self.address {
            debug!(
                requested = %ctx.target,
                endpoint = %self.address,
                "call context names another endpoint"
            );
            return Err(Error::VerificationFailure);
        }
        self.verifier
            .consume_at(&ctx.to_token(expiry), signature, now)
    }
}
