//! Derivation context: protocol, key ID and counterparty.
//!
//! Together these select one child key out of a root identity. The
//! protocol and key ID are folded into the invoice number
//! `"{level}-{name}-{keyID}"`, which is the HMAC message of the tweak.

use std::fmt;

use k256::ProjectivePoint;
use serde::{Deserialize, Serialize};

use crate::error::KeyError;
use crate::keys::PublicKey;

/// Maximum key ID length in bytes.
pub const MAX_KEY_ID_LEN: usize = 800;

const MIN_PROTOCOL_NAME_LEN: usize = 5;
const MAX_PROTOCOL_NAME_LEN: usize = 400;
const MAX_LINKAGE_PROTOCOL_NAME_LEN: usize = 430;
const LINKAGE_REVELATION_PREFIX: &str = "specific linkage revelation ";

/// Protocol security level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SecurityLevel {
    /// Silent: no counterparty or app binding.
    Silent = 0,
    /// Bound per application.
    EveryApp = 1,
    /// Bound per application and per counterparty.
    EveryAppAndCounterparty = 2,
}

impl TryFrom<u8> for SecurityLevel {
    type Error = KeyError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Silent),
            1 => Ok(Self::EveryApp),
            2 => Ok(Self::EveryAppAndCounterparty),
            other => Err(KeyError::InvalidProtocol(format!(
                "security level must be 0, 1 or 2, got {}",
                other
            ))),
        }
    }
}

impl From<SecurityLevel> for u8 {
    fn from(level: SecurityLevel) -> Self {
        level as u8
    }
}

/// Purpose/domain of a derived key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Protocol {
    pub security_level: SecurityLevel,
    pub name: String,
}

impl Protocol {
    pub fn new(security_level: SecurityLevel, name: impl Into<String>) -> Self {
        Self {
            security_level,
            name: name.into(),
        }
    }

    /// Normalized protocol name (trimmed, lower-case) after validation.
    pub fn normalized_name(&self) -> Result<String, KeyError> {
        let name = self.name.trim().to_lowercase();

        if name.len() > MAX_PROTOCOL_NAME_LEN {
            let linkage = name.starts_with(LINKAGE_REVELATION_PREFIX);
            if !linkage || name.len() > MAX_LINKAGE_PROTOCOL_NAME_LEN {
                return Err(KeyError::InvalidProtocol(format!(
                    "protocol names must be {} characters or less",
                    MAX_PROTOCOL_NAME_LEN
                )));
            }
        }
        if name.len() < MIN_PROTOCOL_NAME_LEN {
            return Err(KeyError::InvalidProtocol(format!(
                "protocol names must be {} characters or more",
                MIN_PROTOCOL_NAME_LEN
            )));
        }
        if name.contains("  ") {
            return Err(KeyError::InvalidProtocol(
                "protocol names cannot contain multiple consecutive spaces".into(),
            ));
        }
        if !name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b' ')
        {
            return Err(KeyError::InvalidProtocol(
                "protocol names can only contain letters, numbers and spaces".into(),
            ));
        }
        if name.ends_with(" protocol") {
            return Err(KeyError::InvalidProtocol(
                "protocol names must not end with \" protocol\"".into(),
            ));
        }
        Ok(name)
    }

    /// Build the invoice number `"{level}-{name}-{keyID}"`.
    pub fn invoice_number(&self, key_id: &KeyId) -> Result<String, KeyError> {
        let name = self.normalized_name()?;
        Ok(format!(
            "{}-{}-{}",
            u8::from(self.security_level),
            name,
            key_id.as_str()
        ))
    }
}

/// Opaque derivation-context string within a protocol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyId(String);

impl KeyId {
    pub fn new(id: impl Into<String>) -> Result<Self, KeyError> {
        let id = id.into();
        if id.is_empty() {
            return Err(KeyError::InvalidKeyId("key IDs must be 1 character or more".into()));
        }
        if id.len() > MAX_KEY_ID_LEN {
            return Err(KeyError::InvalidKeyId(format!(
                "key IDs must be {} characters or less",
                MAX_KEY_ID_LEN
            )));
        }
        Ok(Self(id))
    }

    /// `"{first} {second}"`, one ASCII space, no trailing content.
    pub fn from_pair(first: &str, second: &str) -> Result<Self, KeyError> {
        Self::new(format!("{} {}", first, second))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for KeyId {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<KeyId> for String {
    fn from(id: KeyId) -> Self {
        id.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Counterparty role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterpartyKind {
    #[serde(rename = "self")]
    SelfKey,
    Other,
    Anyone,
}

/// The peer a key is derived with respect to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counterparty {
    pub kind: CounterpartyKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<PublicKey>,
}

impl Counterparty {
    pub fn other(public_key: PublicKey) -> Self {
        Self {
            kind: CounterpartyKind::Other,
            public_key: Some(public_key),
        }
    }

    pub fn self_key() -> Self {
        Self {
            kind: CounterpartyKind::SelfKey,
            public_key: None,
        }
    }

    pub fn anyone() -> Self {
        Self {
            kind: CounterpartyKind::Anyone,
            public_key: None,
        }
    }

    /// Resolve to a concrete public key.
    ///
    /// `SelfKey` maps to `own_identity`, `Anyone` to the public key of the
    /// scalar 1 (the curve generator).
    pub fn resolve(&self, own_identity: &PublicKey) -> Result<PublicKey, KeyError> {
        match self.kind {
            CounterpartyKind::SelfKey => Ok(*own_identity),
            CounterpartyKind::Anyone => anyone_public_key(),
            CounterpartyKind::Other => self.public_key.ok_or(KeyError::InvalidCounterparty),
        }
    }
}

/// Public key used for the `Anyone` counterparty.
pub fn anyone_public_key() -> Result<PublicKey, KeyError> {
    PublicKey::from_projective(ProjectivePoint::GENERATOR)
}
