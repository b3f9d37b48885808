//! secp256k1 key types.
//!
//! Wraps `k256` scalars and points with the encodings the auth protocol
//! exchanges on the wire: compressed SEC1 hex for public keys, 32-byte
//! big-endian scalars (or WIF) for private keys, DER for signatures.

use std::fmt;
use std::hash::{Hash, Hasher};

use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{NonZeroScalar, ProjectivePoint, Scalar, SecretKey};
use rand_core::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::KeyError;
use crate::hash::sha256d;

/// Length of a compressed SEC1 public key.
pub const COMPRESSED_PUBLIC_KEY_LEN: usize = 33;

const WIF_MAINNET: u8 = 0x80;
const WIF_TESTNET: u8 = 0xef;
const WIF_COMPRESSED_FLAG: u8 = 0x01;

/// A secp256k1 private key.
///
/// `k256::SecretKey` zeroizes its scalar on drop.
#[derive(Clone)]
pub struct PrivateKey(SecretKey);

impl PrivateKey {
    /// Generate a new random key from the OS RNG.
    pub fn generate() -> Self {
        Self(SecretKey::random(&mut OsRng))
    }

    /// Parse a 32-byte big-endian scalar.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != 32 {
            return Err(KeyError::InvalidPrivateKey);
        }
        SecretKey::from_slice(bytes)
            .map(Self)
            .map_err(|_| KeyError::InvalidPrivateKey)
    }

    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidPrivateKey)?;
        Self::from_bytes(&bytes)
    }

    /// Parse a Wallet Import Format string (base58check, version 0x80 or 0xef).
    pub fn from_wif(wif: &str) -> Result<Self, KeyError> {
        let raw = bs58::decode(wif)
            .into_vec()
            .map_err(|e| KeyError::InvalidWif(e.to_string()))?;

        // version || key(32) || [compressed flag] || checksum(4)
        if raw.len() != 37 && raw.len() != 38 {
            return Err(KeyError::InvalidWif(format!("unexpected length {}", raw.len())));
        }
        let (payload, checksum) = raw.split_at(raw.len() - 4);
        if sha256d(payload)[..4] != *checksum {
            return Err(KeyError::InvalidWif("checksum mismatch".into()));
        }
        if payload[0] != WIF_MAINNET && payload[0] != WIF_TESTNET {
            return Err(KeyError::InvalidWif(format!("unknown version byte {:#04x}", payload[0])));
        }
        if payload.len() == 34 && payload[33] != WIF_COMPRESSED_FLAG {
            return Err(KeyError::InvalidWif("bad compression flag".into()));
        }
        Self::from_bytes(&payload[1..33])
    }

    /// Encode as a compressed mainnet WIF string.
    pub fn to_wif(&self) -> String {
        let mut payload = Vec::with_capacity(38);
        payload.push(WIF_MAINNET);
        payload.extend_from_slice(&self.to_bytes());
        payload.push(WIF_COMPRESSED_FLAG);
        let checksum = sha256d(&payload);
        payload.extend_from_slice(&checksum[..4]);
        let out = bs58::encode(&payload).into_string();
        payload.zeroize();
        out
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes().into()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.public_key())
    }

    pub(crate) fn scalar(&self) -> NonZeroScalar {
        self.0.to_nonzero_scalar()
    }

    pub(crate) fn from_scalar(scalar: Scalar) -> Result<Self, KeyError> {
        let nz = Option::<NonZeroScalar>::from(NonZeroScalar::new(scalar))
            .ok_or(KeyError::DegenerateKey)?;
        Ok(Self(SecretKey::from(nz)))
    }

    /// ECDH: `self · peer`, returned as the compressed shared point.
    pub fn shared_secret(&self, peer: &PublicKey) -> Result<SharedSecret, KeyError> {
        let point = (peer.to_projective() * *self.scalar()).to_affine();
        let shared = k256::PublicKey::from_affine(point).map_err(|_| KeyError::DegenerateKey)?;
        Ok(SharedSecret::from_public(&PublicKey(shared)))
    }

    /// ECDSA sign over SHA-256(`message`), DER encoded.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signing_key = SigningKey::from(&self.0);
        let signature: Signature = signing_key.sign(message);
        signature.to_der().as_bytes().to_vec()
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        crate::utils::constant_time_compare_array(&self.to_bytes(), &other.to_bytes())
    }
}

impl Eq for PrivateKey {}

/// A secp256k1 public key. Encoded as 33-byte compressed SEC1.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(k256::PublicKey);

impl PublicKey {
    /// Parse compressed or uncompressed SEC1 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        k256::PublicKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|_| KeyError::InvalidPublicKey)
    }

    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidPublicKey)?;
        Self::from_bytes(&bytes)
    }

    pub fn to_bytes(&self) -> [u8; COMPRESSED_PUBLIC_KEY_LEN] {
        let encoded = self.0.to_encoded_point(true);
        let mut out = [0u8; COMPRESSED_PUBLIC_KEY_LEN];
        out.copy_from_slice(encoded.as_bytes());
        out
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub(crate) fn to_projective(&self) -> ProjectivePoint {
        self.0.to_projective()
    }

    pub(crate) fn from_projective(point: ProjectivePoint) -> Result<Self, KeyError> {
        k256::PublicKey::from_affine(point.to_affine())
            .map(Self)
            .map_err(|_| KeyError::DegenerateKey)
    }

    /// Verify a DER ECDSA signature over SHA-256(`message`).
    ///
    /// High-S signatures are normalized before verification.
    pub fn verify(&self, message: &[u8], der_signature: &[u8]) -> Result<(), KeyError> {
        let signature =
            Signature::from_der(der_signature).map_err(|_| KeyError::InvalidSignature)?;
        let signature = signature.normalize_s().unwrap_or(signature);
        VerifyingKey::from(&self.0)
            .verify(message, &signature)
            .map_err(|_| KeyError::VerificationFailed)
    }
}

impl Hash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state);
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::str::FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// ECDH output: the compressed shared point.
///
/// The whole point (prefix byte included) keys the derivation HMAC, so this
/// is not interchangeable with an x-only ECDH secret.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; COMPRESSED_PUBLIC_KEY_LEN]);

impl SharedSecret {
    fn from_public(point: &PublicKey) -> Self {
        Self(point.to_bytes())
    }

    /// Wrap raw compressed-point bytes, e.g. from an external ECDH provider.
    pub fn from_bytes(bytes: [u8; COMPRESSED_PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; COMPRESSED_PUBLIC_KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

impl PartialEq for SharedSecret {
    fn eq(&self, other: &Self) -> bool {
        crate::utils::constant_time_compare_array(&self.0, &other.0)
    }
}

/// Output of the key deriver. The private half is absent for
/// public-only derivations.
#[derive(Clone, Debug)]
pub struct DerivedKeyPair {
    pub private_key: Option<PrivateKey>,
    pub public_key: PublicKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENERATOR_HEX: &str =
        "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    fn scalar_one() -> PrivateKey {
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        PrivateKey::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn test_scalar_one_maps_to_generator() {
        assert_eq!(scalar_one().public_key().to_hex(), GENERATOR_HEX);
    }

    #[test]
    fn test_public_key_hex_round_trip() {
        let pk = PublicKey::from_hex(GENERATOR_HEX).unwrap();
        assert_eq!(pk.to_hex(), GENERATOR_HEX);
        assert_eq!(pk.to_string(), GENERATOR_HEX);
        assert_eq!(GENERATOR_HEX.parse::<PublicKey>().unwrap(), pk);
    }

    #[test]
    fn test_public_key_rejects_garbage() {
        assert_eq!(PublicKey::from_hex("zz"), Err(KeyError::InvalidPublicKey));
        assert!(PublicKey::from_bytes(&[0x05; 33]).is_err());
        assert_eq!(PublicKey::from_bytes(&[]), Err(KeyError::InvalidPublicKey));
    }

    #[test]
    fn test_private_key_rejects_zero_and_wrong_length() {
        assert_eq!(PrivateKey::from_bytes(&[0u8; 32]).unwrap_err(), KeyError::InvalidPrivateKey);
        assert_eq!(PrivateKey::from_bytes(&[1u8; 31]).unwrap_err(), KeyError::InvalidPrivateKey);
    }

    #[test]
    fn test_wif_round_trip_fixture() {
        let wif = "L4B2postXdaP7TiUrUBYs53Fqzheu7WhSoQVPuY8qBdoBeEwbmZx";
        let key = PrivateKey::from_wif(wif).unwrap();
        assert_eq!(key.to_wif(), wif);
    }

    #[test]
    fn test_wif_round_trip_generated() {
        let key = PrivateKey::generate();
        let restored = PrivateKey::from_wif(&key.to_wif()).unwrap();
        assert_eq!(restored, key);
    }

    #[test]
    fn test_wif_rejects_bad_checksum() {
        let wif = "L4B2postXdaP7TiUrUBYs53Fqzheu7WhSoQVPuY8qBdoBeEwbmZy";
        assert!(matches!(PrivateKey::from_wif(wif), Err(KeyError::InvalidWif(_))));
    }

    #[test]
    fn test_ecdh_is_symmetric() {
        let alice = PrivateKey::generate();
        let bob = PrivateKey::generate();
        let ab = alice.shared_secret(&bob.public_key()).unwrap();
        let ba = bob.shared_secret(&alice.public_key()).unwrap();
        assert_eq!(ab, ba);
        assert!(ab.as_bytes()[0] == 0x02 || ab.as_bytes()[0] == 0x03);
    }

    #[test]
    fn test_sign_verify_round_trip() {
        let key = PrivateKey::generate();
        let sig = key.sign(b"payload");
        assert!(key.public_key().verify(b"payload", &sig).is_ok());
        assert_eq!(
            key.public_key().verify(b"tampered", &sig),
            Err(KeyError::VerificationFailed)
        );
    }

    #[test]
    fn test_verify_rejects_non_der() {
        let key = PrivateKey::generate();
        assert_eq!(
            key.public_key().verify(b"payload", &[0u8; 10]),
            Err(KeyError::InvalidSignature)
        );
    }

    #[test]
    fn test_public_key_serde_as_hex() {
        let pk = scalar_one().public_key();
        let json = serde_json::to_string(&pk).unwrap();
        assert_eq!(json, format!("\"{}\"", GENERATOR_HEX));
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pk);
    }

    #[test]
    fn test_debug_does_not_leak_private_scalar() {
        let key = PrivateKey::generate();
        let dbg = format!("{:?}", key);
        assert!(!dbg.contains(&key.to_hex()));
    }
}
