//! Authenticated sessions.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use brc_crypto::{KeyId, PublicKey};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::nonce::Nonce;

/// Result of a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Identity key of the authenticated peer.
    pub counterparty_identity_key: PublicKey,
    /// `"{initiatorNonce} {responderNonce}"`, identical on both peers.
    pub session_key_id: KeyId,
    /// This side's nonce.
    pub local_nonce: Nonce,
    /// The peer's nonce.
    pub peer_nonce: Nonce,
    pub established_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    by_identity: HashMap<PublicKey, Session>,
    by_nonce: HashMap<Nonce, PublicKey>,
}

/// Established sessions, one per counterparty.
///
/// Lookup by counterparty identity key or by this side's session nonce.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    inner: RwLock<Inner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `session`, replacing any earlier session with the same peer.
    pub fn insert(&self, session: Session) -> Option<Session> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let peer = session.counterparty_identity_key;
        let nonce = session.local_nonce;
        let previous = inner.by_identity.insert(peer, session);
        if let Some(prev) = &previous {
            inner.by_nonce.remove(&prev.local_nonce);
        }
        inner.by_nonce.insert(nonce, peer);
        debug!(peer = %peer, replaced = previous.is_some(), "session stored");
        previous
    }

    pub fn get_by_identity(&self, peer: &PublicKey) -> Option<Session> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.by_identity.get(peer).cloned()
    }

    pub fn get_by_nonce(&self, nonce: &Nonce) -> Option<Session> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .by_nonce
            .get(nonce)
            .and_then(|peer| inner.by_identity.get(peer))
            .cloned()
    }

    /// Tear down the session with `peer`.
    pub fn remove(&self, peer: &PublicKey) -> Option<Session> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let removed = inner.by_identity.remove(peer)?;
        inner.by_nonce.remove(&removed.local_nonce);
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_identity
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brc_crypto::PrivateKey;

    fn session(peer: PublicKey, local: u8) -> Session {
        let local_nonce = Nonce::from_bytes([local; 32]);
        let peer_nonce = Nonce::from_bytes([0xEE; 32]);
        Session {
            counterparty_identity_key: peer,
            session_key_id: KeyId::from_pair(&peer_nonce.to_base64(), &local_nonce.to_base64())
                .unwrap(),
            local_nonce,
            peer_nonce,
            established_at: Utc::now(),
        }
    }

    #[test]
    fn test_lookup_by_identity_and_nonce() {
        let registry = SessionRegistry::new();
        let peer = PrivateKey::generate().public_key();
        registry.insert(session(peer, 1));

        assert_eq!(registry.len(), 1);
        assert!(registry.get_by_identity(&peer).is_some());
        let by_nonce = registry.get_by_nonce(&Nonce::from_bytes([1; 32])).unwrap();
        assert_eq!(by_nonce.counterparty_identity_key, peer);
    }

    #[test]
    fn test_replacing_session_drops_old_nonce() {
        let registry = SessionRegistry::new();
        let peer = PrivateKey::generate().public_key();
        registry.insert(session(peer, 1));
        let previous = registry.insert(session(peer, 2));

        assert!(previous.is_some());
        assert_eq!(registry.len(), 1);
        assert!(registry.get_by_nonce(&Nonce::from_bytes([1; 32])).is_none());
        assert!(registry.get_by_nonce(&Nonce::from_bytes([2; 32])).is_some());
    }

    #[test]
    fn test_reinserting_same_session_keeps_nonce_lookup() {
        let registry = SessionRegistry::new();
        let peer = PrivateKey::generate().public_key();
        let stored = session(peer, 1);
        registry.insert(stored.clone());
        let previous = registry.insert(stored.clone());

        assert_eq!(previous, Some(stored.clone()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get_by_nonce(&stored.local_nonce), Some(stored));
    }

    #[test]
    fn test_remove_is_teardown() {
        let registry = SessionRegistry::new();
        let peer = PrivateKey::generate().public_key();
        registry.insert(session(peer, 1));

        assert!(registry.remove(&peer).is_some());
        assert!(registry.is_empty());
        assert!(registry.get_by_nonce(&Nonce::from_bytes([1; 32])).is_none());
        assert!(registry.remove(&peer).is_none());
    }
}
