//! Handshake wire messages.
//!
//! Plain structured values; framing and transport are left to the caller.
//! JSON field names follow the BRC-104 camelCase convention and every
//! message carries a `messageType` tag.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use brc_crypto::PublicKey;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Protocol version carried by every message.
pub const AUTH_VERSION: &str = "0.1";

/// Initiator → responder: identity key and the initiator's nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialRequest {
    pub version: String,
    pub identity_key: PublicKey,
    pub initial_nonce: String,
}

/// Responder → initiator: the responder's nonce, the echoed initiator
/// nonce and a signature over both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialResponse {
    pub version: String,
    pub identity_key: PublicKey,
    /// Responder's nonce.
    pub initial_nonce: String,
    /// Echo of the initiator's nonce.
    pub your_nonce: String,
    /// Base64 DER signature.
    pub signature: String,
}

/// Initiator → responder counter-signature proving possession of the
/// initiator's identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutualProof {
    pub version: String,
    pub identity_key: PublicKey,
    /// Initiator's nonce.
    pub nonce: String,
    /// Echo of the responder's nonce.
    pub your_nonce: String,
    /// Base64 DER signature.
    pub signature: String,
}

/// Any handshake message, tagged by `messageType`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "messageType", rename_all = "camelCase")]
pub enum AuthMessage {
    InitialRequest(InitialRequest),
    InitialResponse(InitialResponse),
    MutualProof(MutualProof),
}

impl AuthMessage {
    pub fn to_json(&self) -> Result<String, AuthError> {
        serde_json::to_string(self).map_err(|e| AuthError::InvalidMessage(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self, AuthError> {
        serde_json::from_str(text).map_err(|e| AuthError::InvalidMessage(e.to_string()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AuthMessage::InitialRequest(_) => "initialRequest",
            AuthMessage::InitialResponse(_) => "initialResponse",
            AuthMessage::MutualProof(_) => "mutualProof",
        }
    }
}

pub(crate) fn check_version(version: &str) -> Result<(), AuthError> {
    if version != AUTH_VERSION {
        return Err(AuthError::InvalidMessage(format!(
            "unsupported version {:?}, expected {:?}",
            version, AUTH_VERSION
        )));
    }
    Ok(())
}

pub(crate) fn encode_signature(der: &[u8]) -> String {
    STANDARD.encode(der)
}

pub(crate) fn decode_signature(text: &str) -> Result<Vec<u8>, AuthError> {
    STANDARD
        .decode(text)
        .map_err(|e| AuthError::InvalidMessage(format!("signature is not base64: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use brc_crypto::PrivateKey;

    #[test]
    fn test_request_json_shape() {
        let key = PrivateKey::generate().public_key();
        let msg = AuthMessage::InitialRequest(InitialRequest {
            version: AUTH_VERSION.to_string(),
            identity_key: key,
            initial_nonce: "QUFB".to_string(),
        });

        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["messageType"], "initialRequest");
        assert_eq!(json["version"], "0.1");
        assert_eq!(json["identityKey"], key.to_hex());
        assert_eq!(json["initialNonce"], "QUFB");
    }

    #[test]
    fn test_response_parses_from_json() {
        let key = PrivateKey::generate().public_key();
        let text = format!(
            r#"{{"messageType":"initialResponse","version":"0.1","identityKey":"{}","initialNonce":"Qg==","yourNonce":"QQ==","signature":"MEQ="}}"#,
            key.to_hex()
        );
        match AuthMessage::from_json(&text).unwrap() {
            AuthMessage::InitialResponse(r) => {
                assert_eq!(r.identity_key, key);
                assert_eq!(r.your_nonce, "QQ==");
            }
            other => panic!("unexpected message {}", other.kind()),
        }
    }

    #[test]
    fn test_garbage_is_invalid_message() {
        assert!(matches!(
            AuthMessage::from_json(r#"{"messageType":"bogus"}"#),
            Err(AuthError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_version_check() {
        assert!(check_version("0.1").is_ok());
        assert!(matches!(check_version("0.2"), Err(AuthError::InvalidMessage(_))));
    }
}
