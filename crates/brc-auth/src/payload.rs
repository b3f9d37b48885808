//! Signature payload construction.
//!
//! A handshake signature covers the two decoded nonces, 64 bytes in total.
//! Which nonce goes first depends on the role:
//!
//! - [`Role::Signer`]: `initial ‖ session`
//! - [`Role::Verifier`]: `session ‖ initial`
//!
//! Each peer calls the nonce it received `initial` and its own nonce
//! `session`. With that naming the responder's signing payload and the
//! initiator's verification payload are the same bytes. The key ID text
//! follows the same ordering.
//!
//! Nonces are decoded one at a time and then concatenated. Decoding the
//! concatenated base64 text is not equivalent: the first nonce's `=`
//! padding lands in the middle of the string.

use brc_crypto::KeyId;

use crate::error::AuthError;
use crate::nonce::{Nonce, NONCE_LEN};

/// Length of a handshake signature payload.
pub const PAYLOAD_LEN: usize = 2 * NONCE_LEN;

/// Which side of a signature operation the payload is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Signer,
    Verifier,
}

impl Role {
    fn order<'a>(self, initial: &'a str, session: &'a str) -> (&'a str, &'a str) {
        match self {
            Role::Signer => (initial, session),
            Role::Verifier => (session, initial),
        }
    }
}

/// Decode one base64 nonce to exactly 32 bytes.
pub fn decode_nonce(text: &str) -> Result<[u8; NONCE_LEN], AuthError> {
    Nonce::from_base64(text).map(|n| *n.as_bytes())
}

/// Decode `first` and `second` independently and join them.
pub fn decode_then_concatenate(first: &str, second: &str) -> Result<[u8; PAYLOAD_LEN], AuthError> {
    let first = decode_nonce(first)?;
    let second = decode_nonce(second)?;

    let mut out = [0u8; PAYLOAD_LEN];
    out[..NONCE_LEN].copy_from_slice(&first);
    out[NONCE_LEN..].copy_from_slice(&second);
    Ok(out)
}

/// The exact bytes signed or verified during the handshake.
///
/// Built fresh for every signature operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePayload([u8; PAYLOAD_LEN]);

impl SignaturePayload {
    pub fn build(role: Role, initial: &str, session: &str) -> Result<Self, AuthError> {
        let (first, second) = role.order(initial, session);
        decode_then_concatenate(first, second).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; PAYLOAD_LEN] {
        &self.0
    }

    pub fn first_half(&self) -> &[u8] {
        &self.0[..NONCE_LEN]
    }

    pub fn second_half(&self) -> &[u8] {
        &self.0[NONCE_LEN..]
    }
}

/// Key ID for a handshake signature: the two nonces' base64 text, joined
/// by a single space in the role's order.
///
/// Both nonces must decode to 32 bytes; the key ID itself keeps the text.
pub fn handshake_key_id(role: Role, initial: &str, session: &str) -> Result<KeyId, AuthError> {
    decode_nonce(initial)?;
    decode_nonce(session)?;
    let (first, second) = role.order(initial, session);
    Ok(KeyId::from_pair(first, second)?)
}
