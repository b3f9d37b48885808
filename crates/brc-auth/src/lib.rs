//! BRC Auth - nonce-based mutual authentication between identity keys.
//!
//! This crate implements:
//! - Nonce generation and replay tracking
//! - Role-ordered signature payloads and key IDs
//! - Initiator and responder handshake state machines
//! - The optional mutual proof (initiator counter-signature)
//! - Session registry for authenticated peers
//! - An async driver over a pluggable transport

#![forbid(unsafe_code)]

// Core state machines
pub mod handshake;
pub mod session;

// Handshake building blocks
pub mod nonce;
pub mod payload;
pub mod messages;

// Supporting modules
pub mod config;
pub mod error;
pub mod harness;

#[cfg(test)]
mod proptests;

pub use config::{AuthConfig, ConfigError};
pub use error::AuthError;
pub use handshake::{auth_protocol, HandshakeInitiator, HandshakeResponder, HandshakeState};
pub use harness::{
    loopback_pair, run_handshake_flow, run_initiator, run_responder, AuthTransport,
    LoopbackTransport,
};
pub use messages::{AuthMessage, InitialRequest, InitialResponse, MutualProof};
pub use nonce::{Nonce, NonceManager};
pub use payload::{decode_then_concatenate, handshake_key_id, Role, SignaturePayload};
pub use session::{Session, SessionRegistry};
