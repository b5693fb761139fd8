//! # Ethereum Access Tokens
//!
//! Single-use, call-bound capability tokens.
//!
//! An access token authorizes exactly one invocation: a specific function on
//! a specific endpoint, called by a specific identity with specific
//! arguments, before an expiry time. Tokens are signed off-line by an
//! *issuer* and checked by an [`AccessTokenVerifier`] that trusts issuers
//! through a three-tier key hierarchy.
//!
//! ## Key Concepts
//!
//! - **Key hierarchy**: the root rotates the intermediate; the intermediate
//!   activates and deactivates issuers; issuers sign tokens
//! - **Domain separation**: the signed digest binds the verifier's own
//!   identity and chain, so a token is only ever valid in one place
//! - **Call binding**: the guarded endpoint rebuilds the token from its own
//!   call context; nothing bound by the token is read from the request
//! - **Replay guard**: each (token, signature) pair is consumed at most once
//!
//! ## Example
//!
//! ```rust,ignore
//! use eat::{AccessTokenConsumer, AccessTokenVerifier, Domain, Parameter, SigningKey};
//! use std::sync::Arc;
//!
//! let verifier = AccessTokenVerifier::new(Domain::access_token(1, verifier_addr), root);
//! verifier.rotate_intermediate(&root, intermediate)?;
//! verifier.activate_issuers(&intermediate, &[issuer.address()])?;
//!
//! let vault = AccessTokenConsumer::new(Arc::new(verifier), vault_addr);
//! let ctx = vault.context(caller, "withdraw", &[Parameter::uint(100)]);
//!
//! // Off-line, the issuer signs the exact call.
//! let signature = issuer.sign_token(vault.verifier().domain(), &ctx.to_token(expiry))?;
//!
//! // On-line, the endpoint runs the call only if the token checks out.
//! vault.call(&ctx, &signature, expiry, || withdraw(caller, 100))?;
//! ```

pub mod audit;
pub mod codec;
pub mod config;
pub mod consumer;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod identity;
pub mod keys;
pub mod params;
pub mod replay;
pub mod token;
pub mod verifier;
pub mod wire;

// Re-exports for convenience
pub use audit::{AuditEvent, AuditEventType, AuditLogger, NoOpLogger, StdoutLogger};
pub use codec::{hash_function_call, hash_parameters, hash_token, Domain};
pub use config::{ConfigError, VerifierConfig};
pub use consumer::{AccessTokenConsumer, CallContext};
pub use crypto::{keccak256, recover_signer, Hash, Signature, SigningKey};
pub use error::{Error, ErrorCode, Result};
pub use identity::Address;
pub use keys::{KeyEvent, KeyHierarchy};
pub use params::{pack_parameters, FixedBytes, Parameter};
pub use replay::{Fingerprint, MemoryReplayGuard, ReplayStore};
pub use token::{AccessToken, AccessTokenBuilder, FunctionCall, Selector};
pub use verifier::AccessTokenVerifier;
pub use wire::{SignedAccessToken, MAX_TOKEN_SIZE};
