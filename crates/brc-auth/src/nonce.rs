//! Handshake nonces and replay tracking.
//!
//! Every handshake attempt carries two fresh 32-byte nonces, one per peer.
//! The [`NonceManager`] remembers which nonces it has issued and which it
//! has already accepted from each peer, so a replayed request or response
//! is rejected with [`AuthError::ReplayedNonce`].
//!
//! The ledger is bounded: once `capacity` entries are held, the oldest
//! entry (by insertion order) is evicted. There is no time-based expiry.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, PoisonError};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use brc_crypto::utils::constant_time_compare_array;
use brc_crypto::PublicKey;
use tracing::{debug, warn};

use crate::error::AuthError;

/// Decoded nonce length.
pub const NONCE_LEN: usize = 32;

/// A 32-byte handshake nonce, exchanged as padded standard base64.
#[derive(Clone, Copy, Eq)]
pub struct Nonce([u8; NONCE_LEN]);

impl Nonce {
    /// Fresh nonce from the OS CSPRNG.
    pub fn generate() -> Result<Self, AuthError> {
        let mut bytes = [0u8; NONCE_LEN];
        getrandom::getrandom(&mut bytes).map_err(|e| AuthError::Rng(e.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn from_bytes(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    /// Decode base64 text; anything other than exactly 32 bytes is malformed.
    pub fn from_base64(text: &str) -> Result<Self, AuthError> {
        let raw = STANDARD
            .decode(text)
            .map_err(|e| AuthError::malformed(format!("invalid base64: {}", e)))?;
        let bytes: [u8; NONCE_LEN] = raw.as_slice().try_into().map_err(|_| {
            AuthError::malformed(format!("expected {} bytes, got {}", NONCE_LEN, raw.len()))
        })?;
        Ok(Self(bytes))
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

impl PartialEq for Nonce {
    fn eq(&self, other: &Self) -> bool {
        constant_time_compare_array(&self.0, &other.0)
    }
}

impl Hash for Nonce {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", self.to_base64())
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NonceStatus {
    /// Issued by this side, not yet seen back.
    Issued,
    /// Accepted once; any further use is a replay.
    Consumed,
}

#[derive(Debug, Default)]
struct Ledger {
    entries: HashMap<(PublicKey, Nonce), NonceStatus>,
    order: VecDeque<(PublicKey, Nonce)>,
}

impl Ledger {
    fn insert(&mut self, key: (PublicKey, Nonce), status: NonceStatus, capacity: usize) {
        if self.entries.insert(key, status).is_none() {
            self.order.push_back(key);
            while self.order.len() > capacity {
                if let Some(evicted) = self.order.pop_front() {
                    self.entries.remove(&evicted);
                }
            }
        }
    }
}

/// Per-peer nonce ledger shared by concurrent handshakes.
#[derive(Debug)]
pub struct NonceManager {
    ledger: Mutex<Ledger>,
    capacity: usize,
}

impl Default for NonceManager {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl NonceManager {
    /// Create a manager holding at most `capacity` nonces (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            ledger: Mutex::new(Ledger::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Generate a fresh nonce. Tracking happens once the peer is known.
    pub fn generate(&self) -> Result<Nonce, AuthError> {
        Nonce::generate()
    }

    /// Record that `nonce` was issued to `peer`.
    pub fn track(&self, nonce: &Nonce, peer: &PublicKey) {
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        if !ledger.entries.contains_key(&(*peer, *nonce)) {
            ledger.insert((*peer, *nonce), NonceStatus::Issued, self.capacity);
            debug!(peer = %peer, "nonce tracked");
        }
    }

    /// Accept `nonce` for `peer` exactly once.
    ///
    /// The check and the insert happen under one lock, so two concurrent
    /// handshakes presenting the same nonce cannot both succeed.
    pub fn consume(&self, nonce: &Nonce, peer: &PublicKey) -> Result<(), AuthError> {
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (*peer, *nonce);
        match ledger.entries.get(&key).copied() {
            Some(NonceStatus::Consumed) => {
                warn!(peer = %peer, "replayed nonce rejected");
                Err(AuthError::ReplayedNonce {
                    peer: peer.to_hex(),
                })
            }
            Some(NonceStatus::Issued) => {
                ledger.entries.insert(key, NonceStatus::Consumed);
                Ok(())
            }
            None => {
                ledger.insert(key, NonceStatus::Consumed, self.capacity);
                Ok(())
            }
        }
    }

    /// Whether `nonce` is tracked for `peer` and not yet consumed.
    pub fn is_issued(&self, nonce: &Nonce, peer: &PublicKey) -> bool {
        let ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        ledger.entries.get(&(*peer, *nonce)) == Some(&NonceStatus::Issued)
    }

    pub fn len(&self) -> usize {
        self.ledger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
