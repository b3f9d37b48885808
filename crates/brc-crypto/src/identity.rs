//! Identity capability.
//!
//! The handshake never touches a root private key directly. It asks an
//! [`IdentityProvider`] to sign with, or verify against, a derived key, and
//! for raw ECDH when a caller needs public-only derivation.

use tracing::debug;

use crate::derivation::KeyDeriver;
use crate::error::KeyError;
use crate::keys::{PrivateKey, PublicKey, SharedSecret};
use crate::protocol::{Counterparty, KeyId, Protocol};

/// Signing and ECDH capability backed by a root identity key.
pub trait IdentityProvider: Send + Sync {
    /// The root identity public key.
    fn identity_key(&self) -> PublicKey;

    /// ECDH between the root key and `peer`.
    fn ecdh(&self, peer: &PublicKey) -> Result<SharedSecret, KeyError>;

    /// Sign `data` with the child key for `(protocol, key_id, counterparty)`.
    ///
    /// Returns a DER-encoded ECDSA signature over SHA-256(`data`).
    fn create_signature(
        &self,
        data: &[u8],
        protocol: &Protocol,
        key_id: &KeyId,
        counterparty: &Counterparty,
    ) -> Result<Vec<u8>, KeyError>;

    /// Verify `signature` over `data` against a derived public key.
    ///
    /// `for_self = false` checks a signature made by `counterparty`.
    fn verify_signature(
        &self,
        data: &[u8],
        signature: &[u8],
        protocol: &Protocol,
        key_id: &KeyId,
        counterparty: &Counterparty,
        for_self: bool,
    ) -> Result<(), KeyError>;
}

/// In-memory identity holding its root key.
#[derive(Clone, Debug)]
pub struct LocalIdentity {
    deriver: KeyDeriver,
}

impl LocalIdentity {
    pub fn new(root: PrivateKey) -> Self {
        Self {
            deriver: KeyDeriver::new(root),
        }
    }

    /// Fresh random identity.
    pub fn generate() -> Self {
        Self::new(PrivateKey::generate())
    }

    pub fn from_wif(wif: &str) -> Result<Self, KeyError> {
        PrivateKey::from_wif(wif).map(Self::new)
    }

    pub fn deriver(&self) -> &KeyDeriver {
        &self.deriver
    }
}

impl IdentityProvider for LocalIdentity {
    fn identity_key(&self) -> PublicKey {
        self.deriver.identity_key()
    }

    fn ecdh(&self, peer: &PublicKey) -> Result<SharedSecret, KeyError> {
        self.deriver.shared_secret(peer)
    }

    fn create_signature(
        &self,
        data: &[u8],
        protocol: &Protocol,
        key_id: &KeyId,
        counterparty: &Counterparty,
    ) -> Result<Vec<u8>, KeyError> {
        let pair = self.deriver.derive_private_key(protocol, key_id, counterparty)?;
        let key = pair.private_key.ok_or(KeyError::InvalidPrivateKey)?;
        Ok(key.sign(data))
    }

    fn verify_signature(
        &self,
        data: &[u8],
        signature: &[u8],
        protocol: &Protocol,
        key_id: &KeyId,
        counterparty: &Counterparty,
        for_self: bool,
    ) -> Result<(), KeyError> {
        let key = self
            .deriver
            .derive_public_key(protocol, key_id, counterparty, for_self)?;
        key.verify(data, signature).map_err(|e| {
            debug!(protocol = %protocol.name, error = %e, "derived-key signature rejected");
            e
        })
    }
}
