//! Key and derivation error types.

use thiserror::Error;

/// Errors raised by key parsing, derivation and signing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Counterparty of type `Other` was supplied without a public key.
    #[error("counterparty of type other requires a public key")]
    InvalidCounterparty,

    /// Key ID is empty or too long.
    #[error("invalid key id: {0}")]
    InvalidKeyId(String),

    /// Protocol security level or name failed validation.
    #[error("invalid protocol: {0}")]
    InvalidProtocol(String),

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid private key")]
    InvalidPrivateKey,

    /// WIF string failed base58check or version validation.
    #[error("invalid WIF: {0}")]
    InvalidWif(String),

    #[error("invalid signature encoding")]
    InvalidSignature,

    /// Signature parsed but did not verify.
    #[error("signature verification failed")]
    VerificationFailed,

    /// Tweak addition produced the zero scalar or the point at infinity.
    #[error("derived key is degenerate")]
    DegenerateKey,
}
