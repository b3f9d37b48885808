//! Handshake error types.

use brc_crypto::KeyError;
use thiserror::Error;

/// Errors produced by the handshake and its components.
///
/// Every variant is terminal for the handshake it occurs in.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid counterparty: OTHER requires a public key")]
    InvalidCounterparty,

    #[error("invalid key ID: {0}")]
    InvalidKeyId(String),

    #[error("malformed nonce: {reason}")]
    MalformedNonce { reason: String },

    #[error("replayed nonce for peer {peer}")]
    ReplayedNonce { peer: String },

    #[error("signature verification failed")]
    SignatureVerification,

    #[error("handshake timed out after {elapsed_ms} ms")]
    HandshakeTimeout { elapsed_ms: u64 },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("identity mismatch: expected {expected}, received {received}")]
    IdentityMismatch { expected: String, received: String },

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("random number generator failure: {0}")]
    Rng(String),

    #[error("key error: {0}")]
    Key(KeyError),
}

impl From<KeyError> for AuthError {
    fn from(err: KeyError) -> Self {
        match err {
            KeyError::InvalidCounterparty => AuthError::InvalidCounterparty,
            KeyError::InvalidKeyId(reason) => AuthError::InvalidKeyId(reason),
            KeyError::VerificationFailed | KeyError::InvalidSignature => {
                AuthError::SignatureVerification
            }
            other => AuthError::Key(other),
        }
    }
}

impl AuthError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        AuthError::MalformedNonce {
            reason: reason.into(),
        }
    }
}
