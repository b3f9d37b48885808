#![forbid(unsafe_code)]

//! BRC Crypto - secp256k1 identity keys and BRC-42 key derivation.
//!
//! This crate provides:
//! - Root identity keys (generation, hex/WIF import, ECDSA signing)
//! - Invoice-number construction from a protocol and key ID
//! - The ECDH + HMAC child key derivation used by the auth handshake
//! - The identity capability that keeps root key material local

pub mod error;
pub mod hash;
pub mod keys;
pub mod protocol;
pub mod derivation;
pub mod identity;
pub mod utils;

#[cfg(test)]
mod proptests;

pub use derivation::{compute_tweak, KeyDeriver};
pub use error::KeyError;
pub use identity::{IdentityProvider, LocalIdentity};
pub use keys::{DerivedKeyPair, PrivateKey, PublicKey, SharedSecret};
pub use protocol::{Counterparty, CounterpartyKind, KeyId, Protocol, SecurityLevel};
