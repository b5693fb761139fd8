//! Error types for Ethereum Access Tokens.
//!
//! Administrative and malformed-input errors are specific so callers know
//! what to fix. Authorization mismatches are deliberately collapsed into
//! [`Error::VerificationFailure`] so a rejected caller cannot tell a wrong
//! signer apart from a revoked issuer or a tampered field.

use thiserror::Error;

/// Result type alias for access token operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Canonical error codes.
///
/// Code ranges:
/// - 1000-1099: Key hierarchy errors
/// - 1100-1199: Signature errors
/// - 1200-1299: Temporal errors
/// - 1300-1399: Authorization errors
/// - 1400-1499: Replay errors
/// - 1500-1599: Encoding errors
/// - 1600-1699: Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // Key hierarchy errors (1000-1099)
    AlreadyInitialized = 1000,
    Unauthorized = 1001,
    NotInitialized = 1002,

    // Signature errors (1100-1199)
    InvalidSignatureV = 1100,
    InvalidSignatureS = 1101,
    InvalidSignature = 1102,
    InvalidKey = 1103,

    // Temporal errors (1200-1299)
    Expired = 1200,

    // Authorization errors (1300-1399)
    VerificationFailure = 1300,

    // Replay errors (1400-1499)
    AlreadyUsed = 1400,

    // Encoding errors (1500-1599)
    MalformedInput = 1500,
    TokenTooLarge = 1501,
    SerializationFailed = 1502,

    // Configuration errors (1600-1699)
    InvalidConfiguration = 1600,
}

impl ErrorCode {
    /// Get the numeric code value.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Get machine-readable name (kebab-case).
    pub fn name(self) -> &'static str {
        match self {
            Self::AlreadyInitialized => "already-initialized",
            Self::Unauthorized => "unauthorized",
            Self::NotInitialized => "not-initialized",
            Self::InvalidSignatureV => "invalid-signature-v",
            Self::InvalidSignatureS => "invalid-signature-s",
            Self::InvalidSignature => "invalid-signature",
            Self::InvalidKey => "invalid-key",
            Self::Expired => "expired",
            Self::VerificationFailure => "verification-failure",
            Self::AlreadyUsed => "already-used",
            Self::MalformedInput => "malformed-input",
            Self::TokenTooLarge => "token-too-large",
            Self::SerializationFailed => "serialization-failed",
            Self::InvalidConfiguration => "invalid-configuration",
        }
    }

    /// Short reason code, as surfaced by compact revert strings.
    pub fn short(self) -> &'static str {
        match self {
            Self::AlreadyInitialized => "AI",
            Self::Unauthorized => "UA",
            Self::NotInitialized => "NI",
            Self::InvalidSignatureV => "ISV",
            Self::InvalidSignatureS => "ISS",
            Self::InvalidSignature => "IS",
            Self::InvalidKey => "IK",
            Self::Expired => "HE",
            Self::VerificationFailure => "VF",
            Self::AlreadyUsed => "AU",
            Self::MalformedInput => "MI",
            Self::TokenTooLarge => "TL",
            Self::SerializationFailed => "SF",
            Self::InvalidConfiguration => "IC",
        }
    }

    /// Get human-readable description.
    pub fn description(self) -> &'static str {
        match self {
            Self::AlreadyInitialized => "Key hierarchy is already initialized",
            Self::Unauthorized => "Caller is not authorized for this key rotation",
            Self::NotInitialized => "Key hierarchy has no root key",
            Self::InvalidSignatureV => "Signature recovery id is not 27 or 28",
            Self::InvalidSignatureS => "Signature s value is in the upper half of the curve order",
            Self::InvalidSignature => "Signature is malformed or unrecoverable",
            Self::InvalidKey => "Signing key material is invalid",
            Self::Expired => "Access token has expired",
            Self::VerificationFailure => "Access token verification failed",
            Self::AlreadyUsed => "Access token has already been consumed",
            Self::MalformedInput => "Input could not be decoded",
            Self::TokenTooLarge => "Encoded token exceeds the size limit",
            Self::SerializationFailed => "Value could not be serialized",
            Self::InvalidConfiguration => "Verifier configuration is invalid",
        }
    }
}

/// Errors that can occur in access token operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Key Hierarchy
    // =========================================================================
    /// The hierarchy already has a root key.
    #[error("already initialized")]
    AlreadyInitialized,

    /// The hierarchy has not been given a root key yet.
    #[error("not initialized")]
    NotInitialized,

    /// Rotation attempted by an identity that does not own the parent tier.
    #[error("unauthorised: must be {0}")]
    Unauthorized(&'static str),

    // =========================================================================
    // Signatures
    // =========================================================================
    /// Recovery id outside `{27, 28}`.
    #[error("AccessToken: invalid signature 'v' value {0}")]
    InvalidSignatureV(u8),

    /// `s` above half the curve order (malleable form).
    #[error("AccessToken: invalid signature 's' value")]
    InvalidSignatureS,

    /// `r`/`s` out of range, or public key recovery failed.
    #[error("AccessToken: invalid signature")]
    InvalidSignature,

    /// Secret key bytes do not form a valid secp256k1 scalar.
    #[error("invalid signing key: {0}")]
    InvalidKey(String),

    // =========================================================================
    // Token Lifecycle
    // =========================================================================
    /// Token expiry is strictly before the current time.
    #[error("AccessToken: has expired")]
    Expired { expiry: u64, now: u64 },

    /// Signer is not an active issuer, or any bound field differs from what
    /// was signed. Intentionally carries no detail.
    #[error("AccessToken: verification failure")]
    VerificationFailure,

    /// The (token, signature) pair was consumed before.
    #[error("AccessToken: already used")]
    AlreadyUsed,

    // =========================================================================
    // Encoding
    // =========================================================================
    /// Hex, base64, CBOR or field-level decoding failed.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Encoded token exceeds the wire limit.
    #[error("token size {size} bytes exceeds maximum {max} bytes")]
    TokenTooLarge { size: usize, max: usize },

    /// Serialization failed.
    #[error("serialization error: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Configuration
    // =========================================================================
    /// Verifier configuration could not be loaded or applied.
    #[error("configuration error: {0}")]
    InvalidConfiguration(String),
}

impl From<ciborium::ser::Error<std::io::Error>> for Error {
    fn from(e: ciborium::ser::Error<std::io::Error>) -> Self {
        Error::SerializationFailed(e.to_string())
    }
}

impl From<ciborium::de::Error<std::io::Error>> for Error {
    fn from(e: ciborium::de::Error<std::io::Error>) -> Self {
        Error::MalformedInput(e.to_string())
    }
}

impl From<k256::ecdsa::Error> for Error {
    fn from(_: k256::ecdsa::Error) -> Self {
        Error::InvalidSignature
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::MalformedInput(e.to_string())
    }
}

impl Error {
    /// Map this error to its canonical code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AlreadyInitialized => ErrorCode::AlreadyInitialized,
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::Unauthorized(_) => ErrorCode::Unauthorized,
            Self::InvalidSignatureV(_) => ErrorCode::InvalidSignatureV,
            Self::InvalidSignatureS => ErrorCode::InvalidSignatureS,
            Self::InvalidSignature => ErrorCode::InvalidSignature,
            Self::InvalidKey(_) => ErrorCode::InvalidKey,
            Self::Expired { .. } => ErrorCode::Expired,
            Self::VerificationFailure => ErrorCode::VerificationFailure,
            Self::AlreadyUsed => ErrorCode::AlreadyUsed,
            Self::MalformedInput(_) => ErrorCode::MalformedInput,
            Self::TokenTooLarge { .. } => ErrorCode::TokenTooLarge,
            Self::SerializationFailed(_) => ErrorCode::SerializationFailed,
            Self::InvalidConfiguration(_) => ErrorCode::InvalidConfiguration,
        }
    }

    /// Kebab-case name of the error code.
    pub fn name(&self) -> &'static str {
        self.code().name()
    }

    /// Short reason code (`HE`, `VF`, `AU`, ...).
    pub fn short(&self) -> &'static str {
        self.code().short()
    }

    /// Human-readable description of the error code.
    pub fn description(&self) -> &'static str {
        self.code().description()
    }

    /// Whether this error comes from the token's validity checks rather
    /// than from administration or decoding.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidSignatureV(_)
                | Self::InvalidSignatureS
                | Self::InvalidSignature
                | Self::Expired { .. }
                | Self::VerificationFailure
                | Self::AlreadyUsed
        )
    }
}
