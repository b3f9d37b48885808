//! Property-based tests for payload ordering and replay tracking.

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use proptest::prelude::*;

    use crate::error::AuthError;
    use crate::nonce::{Nonce, NonceManager};
    use crate::payload::{decode_then_concatenate, handshake_key_id, Role, SignaturePayload};
    use brc_crypto::PrivateKey;

    fn b64(bytes: [u8; 32]) -> String {
        Nonce::from_bytes(bytes).to_base64()
    }

    // Decoding each nonce then joining always yields the raw bytes in order,
    // and the signer's payload is the verifier's payload with roles swapped.
    proptest! {
        #[test]
        fn property_payload_ordering(
            first in prop::array::uniform32(any::<u8>()),
            second in prop::array::uniform32(any::<u8>()),
        ) {
            let (a, b) = (b64(first), b64(second));

            let joined = decode_then_concatenate(&a, &b).unwrap();
            prop_assert_eq!(&joined[..32], &first[..]);
            prop_assert_eq!(&joined[32..], &second[..]);
            // Padding inside the joined text never decodes to the same bytes.
            prop_assert_ne!(STANDARD.decode(format!("{}{}", a, b)).ok(), Some(joined.to_vec()));

            let signer = SignaturePayload::build(Role::Signer, &a, &b).unwrap();
            let verifier = SignaturePayload::build(Role::Verifier, &b, &a).unwrap();
            prop_assert_eq!(signer, verifier);

            prop_assert_eq!(
                handshake_key_id(Role::Signer, &a, &b).unwrap(),
                handshake_key_id(Role::Verifier, &b, &a).unwrap()
            );
        }

        #[test]
        fn property_wrong_length_nonce_is_malformed(
            bytes in prop::collection::vec(any::<u8>(), 0..64),
            good in prop::array::uniform32(any::<u8>()),
        ) {
            prop_assume!(bytes.len() != 32);
            let bad = STANDARD.encode(&bytes);
            let good = b64(good);

            for role in [Role::Signer, Role::Verifier] {
                let is_malformed = matches!(
                    SignaturePayload::build(role, &bad, &good),
                    Err(AuthError::MalformedNonce { .. })
                );
                prop_assert!(is_malformed);
            }
        }

        #[test]
        fn property_each_nonce_consumed_once(
            nonces in prop::collection::hash_set(prop::array::uniform32(any::<u8>()), 1..32),
        ) {
            let manager = NonceManager::new(64);
            let peer = PrivateKey::generate().public_key();

            for bytes in &nonces {
                prop_assert!(manager.consume(&Nonce::from_bytes(*bytes), &peer).is_ok());
            }
            for bytes in &nonces {
                let replay = manager.consume(&Nonce::from_bytes(*bytes), &peer);
                let is_replay = matches!(replay, Err(AuthError::ReplayedNonce { .. }));
                prop_assert!(is_replay);
            }
        }
    }
}
