//! Property-based tests for key derivation.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::derivation::KeyDeriver;
    use crate::keys::PrivateKey;
    use crate::protocol::{Counterparty, KeyId, Protocol, SecurityLevel};
    use crate::utils::constant_time_compare;

    fn key_from_seed(seed: [u8; 32]) -> Option<PrivateKey> {
        PrivateKey::from_bytes(&seed).ok()
    }

    fn protocol() -> Protocol {
        Protocol::new(SecurityLevel::EveryAppAndCounterparty, "auth message signature")
    }

    // Derived keys are a pure function of (root, protocol, key ID, counterparty),
    // and the peer's public derivation always lands on the signer's child key.
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn property_cross_peer_symmetry(
            alice_seed in prop::array::uniform32(any::<u8>()),
            bob_seed in prop::array::uniform32(any::<u8>()),
            key_id in "[A-Za-z0-9+/=]{1,64}( [A-Za-z0-9+/=]{1,64})?",
        ) {
            let (alice, bob) = match (key_from_seed(alice_seed), key_from_seed(bob_seed)) {
                (Some(a), Some(b)) => (KeyDeriver::new(a), KeyDeriver::new(b)),
                _ => return Ok(()),
            };
            let key_id = KeyId::new(key_id).unwrap();

            let signer = alice
                .derive_private_key(&protocol(), &key_id, &Counterparty::other(bob.identity_key()))
                .unwrap();
            let again = alice
                .derive_private_key(&protocol(), &key_id, &Counterparty::other(bob.identity_key()))
                .unwrap();
            prop_assert_eq!(&signer.public_key, &again.public_key);

            let seen_by_bob = bob
                .derive_public_key(&protocol(), &key_id, &Counterparty::other(alice.identity_key()), false)
                .unwrap();
            prop_assert_eq!(signer.public_key, seen_by_bob);
        }

        #[test]
        fn property_signature_verifies_only_under_same_key_id(
            seed in prop::array::uniform32(any::<u8>()),
            first in "[a-z0-9]{1,16}",
            second in "[a-z0-9]{1,16}",
            message in prop::collection::vec(any::<u8>(), 0..128),
        ) {
            let alice = match key_from_seed(seed) {
                Some(k) => KeyDeriver::new(k),
                None => return Ok(()),
            };
            let bob = KeyDeriver::new(PrivateKey::generate());
            let signing_id = KeyId::from_pair(&first, &second).unwrap();
            let swapped_id = KeyId::from_pair(&second, &first).unwrap();

            let sig = alice
                .derive_private_key(&protocol(), &signing_id, &Counterparty::other(bob.identity_key()))
                .unwrap()
                .private_key
                .unwrap()
                .sign(&message);

            let verify_key = bob
                .derive_public_key(&protocol(), &signing_id, &Counterparty::other(alice.identity_key()), false)
                .unwrap();
            prop_assert!(verify_key.verify(&message, &sig).is_ok());

            if first != second {
                let wrong_key = bob
                    .derive_public_key(&protocol(), &swapped_id, &Counterparty::other(alice.identity_key()), false)
                    .unwrap();
                prop_assert!(wrong_key.verify(&message, &sig).is_err());
            }
        }

        #[test]
        fn property_shared_secret_is_symmetric(
            a in prop::array::uniform32(any::<u8>()),
            b in prop::array::uniform32(any::<u8>()),
        ) {
            if let (Some(a), Some(b)) = (key_from_seed(a), key_from_seed(b)) {
                let ab = a.shared_secret(&b.public_key()).unwrap();
                let ba = b.shared_secret(&a.public_key()).unwrap();
                prop_assert!(constant_time_compare(ab.as_bytes(), ba.as_bytes()));
            }
        }
    }
}
