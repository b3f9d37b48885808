//! BRC-42 child key derivation.
//!
//! For a root key `r`, counterparty key `C` and invoice number `inv`:
//!
//! ```text
//! S     = r · C                       (compressed shared point)
//! t     = HMAC-SHA256(key = S, inv)   (reduced mod n)
//! child = r + t                       (private derivation)
//! Child = C + t · G                   (public derivation for the peer)
//! ```
//!
//! Both peers compute the same `S`, so the signer's `child · G` equals the
//! verifier's `Child` without any key material being exchanged.

use k256::elliptic_curve::ops::Reduce;
use k256::{FieldBytes, ProjectivePoint, Scalar, U256};

use crate::error::KeyError;
use crate::hash::hmac_sha256;
use crate::keys::{DerivedKeyPair, PrivateKey, PublicKey, SharedSecret};
use crate::protocol::{Counterparty, KeyId, Protocol};

/// Compute the derivation tweak for a shared secret and invoice number.
///
/// Pure function; exposed for cross-implementation fixtures.
pub fn compute_tweak(shared_secret: &SharedSecret, invoice_number: &str) -> [u8; 32] {
    hmac_sha256(shared_secret.as_bytes(), invoice_number.as_bytes())
}

fn tweak_scalar(tweak: &[u8; 32]) -> Scalar {
    <Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::from(*tweak))
}

/// Derives child keys from a root identity key.
#[derive(Clone, Debug)]
pub struct KeyDeriver {
    root: PrivateKey,
}

impl KeyDeriver {
    pub fn new(root: PrivateKey) -> Self {
        Self { root }
    }

    /// The root identity public key.
    pub fn identity_key(&self) -> PublicKey {
        self.root.public_key()
    }

    /// ECDH between the root key and `peer`.
    pub fn shared_secret(&self, peer: &PublicKey) -> Result<SharedSecret, KeyError> {
        self.root.shared_secret(peer)
    }

    fn context(
        &self,
        protocol: &Protocol,
        key_id: &KeyId,
        counterparty: &Counterparty,
    ) -> Result<(PublicKey, String), KeyError> {
        // Input validation happens before any curve arithmetic.
        let counterparty_key = counterparty.resolve(&self.identity_key())?;
        let invoice = protocol.invoice_number(key_id)?;
        Ok((counterparty_key, invoice))
    }

    /// Derive the caller's child key pair for `(protocol, key_id, counterparty)`.
    pub fn derive_private_key(
        &self,
        protocol: &Protocol,
        key_id: &KeyId,
        counterparty: &Counterparty,
    ) -> Result<DerivedKeyPair, KeyError> {
        let (counterparty_key, invoice) = self.context(protocol, key_id, counterparty)?;
        let shared = self.root.shared_secret(&counterparty_key)?;
        let tweak = tweak_scalar(&compute_tweak(&shared, &invoice));

        let child = PrivateKey::from_scalar(*self.root.scalar() + tweak)?;
        let public_key = child.public_key();
        Ok(DerivedKeyPair {
            private_key: Some(child),
            public_key,
        })
    }

    /// Derive a child public key.
    ///
    /// `for_self = true` yields the caller's own child public key (the public
    /// half of [`derive_private_key`](Self::derive_private_key)).
    /// `for_self = false` yields the counterparty's child public key, i.e. the
    /// key the counterparty signs with when it derives with the caller as
    /// its counterparty.
    pub fn derive_public_key(
        &self,
        protocol: &Protocol,
        key_id: &KeyId,
        counterparty: &Counterparty,
        for_self: bool,
    ) -> Result<PublicKey, KeyError> {
        if for_self {
            return self
                .derive_private_key(protocol, key_id, counterparty)
                .map(|pair| pair.public_key);
        }

        let (counterparty_key, invoice) = self.context(protocol, key_id, counterparty)?;
        let shared = self.root.shared_secret(&counterparty_key)?;
        derive_peer_public_key(&counterparty_key, &shared, &invoice)
    }
}

/// Public-only derivation: `base + HMAC(shared, invoice) · G`.
///
/// Usable by verifiers that hold an ECDH capability but no private scalar.
pub fn derive_peer_public_key(
    base: &PublicKey,
    shared_secret: &SharedSecret,
    invoice_number: &str,
) -> Result<PublicKey, KeyError> {
    let tweak = tweak_scalar(&compute_tweak(shared_secret, invoice_number));
    PublicKey::from_projective(base.to_projective() + ProjectivePoint::GENERATOR * tweak)
}
