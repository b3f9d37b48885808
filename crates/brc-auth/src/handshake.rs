//! Handshake state machines.
//!
//! This module implements the initial-request / initial-response exchange
//! for both sides, plus the optional mutual proof that lets the responder
//! authenticate the initiator.
//!
//! ```text
//! initiator: Idle -> AwaitingResponse -> Authenticated | Failed
//! responder: Idle -> Responding -> Authenticated | Failed
//!            Idle -> Authenticated          (no mutual proof required)
//! ```
//!
//! `Authenticated` and `Failed` are terminal. Input validation (versions,
//! nonce encoding, pinned identities) runs before any derivation or
//! signature work, and any error moves the machine to `Failed`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use brc_crypto::{Counterparty, IdentityProvider, KeyId, Protocol, PublicKey, SecurityLevel};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::messages::{
    check_version, decode_signature, encode_signature, InitialRequest, InitialResponse,
    MutualProof, AUTH_VERSION,
};
use crate::nonce::{Nonce, NonceManager};
use crate::payload::{handshake_key_id, Role, SignaturePayload};
use crate::session::Session;

/// Protocol name under which handshake signatures are derived.
pub const AUTH_PROTOCOL_NAME: &str = "auth message signature";

/// `(2, "auth message signature")`.
pub fn auth_protocol() -> Protocol {
    Protocol::new(SecurityLevel::EveryAppAndCounterparty, AUTH_PROTOCOL_NAME)
}

// ============================================================================
// State
// ============================================================================

/// State shared by both handshake roles.
#[derive(Clone, Debug)]
pub enum HandshakeState {
    /// Nothing sent or received yet.
    Idle,
    /// Initiator sent its request.
    AwaitingResponse {
        initial_nonce: Nonce,
        started_at: Instant,
    },
    /// Responder replied and waits for the mutual proof.
    Responding {
        peer: PublicKey,
        initial_nonce: Nonce,
        session_nonce: Nonce,
        started_at: Instant,
    },
    Authenticated {
        session: Session,
    },
    Failed {
        error: AuthError,
    },
}

impl HandshakeState {
    pub fn name(&self) -> &'static str {
        match self {
            HandshakeState::Idle => "idle",
            HandshakeState::AwaitingResponse { .. } => "awaiting_response",
            HandshakeState::Responding { .. } => "responding",
            HandshakeState::Authenticated { .. } => "authenticated",
            HandshakeState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HandshakeState::Authenticated { .. } | HandshakeState::Failed { .. }
        )
    }

    fn started_at(&self) -> Option<Instant> {
        match self {
            HandshakeState::AwaitingResponse { started_at, .. }
            | HandshakeState::Responding { started_at, .. } => Some(*started_at),
            _ => None,
        }
    }

    fn session(&self) -> Option<&Session> {
        match self {
            HandshakeState::Authenticated { session } => Some(session),
            _ => None,
        }
    }

    fn timeout_error(&self, timeout: Duration, now: Instant) -> Option<AuthError> {
        let elapsed = now.saturating_duration_since(self.started_at()?);
        (elapsed >= timeout).then(|| AuthError::HandshakeTimeout {
            elapsed_ms: elapsed_millis(elapsed),
        })
    }

    fn expire(&self, now: Instant) -> Option<AuthError> {
        let elapsed = now.saturating_duration_since(self.started_at()?);
        Some(AuthError::HandshakeTimeout {
            elapsed_ms: elapsed_millis(elapsed),
        })
    }
}

/// Milliseconds in `elapsed`, saturating at `u64::MAX`.
pub(crate) fn elapsed_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

fn invalid_transition(state: &HandshakeState, action: &str) -> AuthError {
    AuthError::InvalidState(format!("cannot {} in {} state", action, state.name()))
}

// ============================================================================
// Initiator
// ============================================================================

/// Initiator-side handshake.
pub struct HandshakeInitiator<I: IdentityProvider> {
    state: HandshakeState,
    identity: Arc<I>,
    nonces: Arc<NonceManager>,
    config: AuthConfig,
    expected_peer: Option<PublicKey>,
}

impl<I: IdentityProvider> HandshakeInitiator<I> {
    pub fn new(identity: Arc<I>, nonces: Arc<NonceManager>, config: AuthConfig) -> Self {
        Self {
            state: HandshakeState::Idle,
            identity,
            nonces,
            config,
            expected_peer: None,
        }
    }

    /// Only accept a response signed by `peer`.
    pub fn expect_peer(mut self, peer: PublicKey) -> Self {
        self.expected_peer = Some(peer);
        self
    }

    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&Session> {
        self.state.session()
    }

    /// Abandon an in-flight attempt and return to `Idle`.
    ///
    /// Terminal states stay put; a new handshake needs a new instance.
    pub fn reset(&mut self) -> Result<(), AuthError> {
        if self.state.is_terminal() {
            return Err(invalid_transition(&self.state, "reset"));
        }
        self.state = HandshakeState::Idle;
        Ok(())
    }

    /// Start a handshake with a fresh nonce.
    pub fn initiate(&mut self) -> Result<InitialRequest, AuthError> {
        let nonce = self.nonces.generate()?;
        self.initiate_with_nonce(nonce)
    }

    /// Start a handshake with a caller-chosen nonce.
    pub fn initiate_with_nonce(&mut self, nonce: Nonce) -> Result<InitialRequest, AuthError> {
        if !matches!(self.state, HandshakeState::Idle) {
            return Err(invalid_transition(&self.state, "initiate"));
        }

        self.state = HandshakeState::AwaitingResponse {
            initial_nonce: nonce,
            started_at: Instant::now(),
        };
        debug!(state = self.state.name(), "handshake initiated");

        Ok(InitialRequest {
            version: AUTH_VERSION.to_string(),
            identity_key: self.identity.identity_key(),
            initial_nonce: nonce.to_base64(),
        })
    }

    /// Verify the responder's signature.
    ///
    /// Returns the mutual proof to send back when the configuration
    /// requires one.
    pub fn handle_response(
        &mut self,
        response: &InitialResponse,
    ) -> Result<Option<MutualProof>, AuthError> {
        self.handle_response_at(response, Instant::now())
    }

    pub fn handle_response_at(
        &mut self,
        response: &InitialResponse,
        now: Instant,
    ) -> Result<Option<MutualProof>, AuthError> {
        let own_nonce = match &self.state {
            HandshakeState::AwaitingResponse { initial_nonce, .. } => *initial_nonce,
            other => return Err(invalid_transition(other, "handle response")),
        };
        self.check_timeout_at(now)?;

        match self.verify_response(response, own_nonce) {
            Ok((session, proof)) => {
                info!(
                    peer = %session.counterparty_identity_key,
                    mutual_proof = proof.is_some(),
                    "handshake authenticated"
                );
                self.state = HandshakeState::Authenticated { session };
                Ok(proof)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn verify_response(
        &self,
        response: &InitialResponse,
        own_nonce: Nonce,
    ) -> Result<(Session, Option<MutualProof>), AuthError> {
        check_version(&response.version)?;

        let peer = response.identity_key;
        if let Some(expected) = &self.expected_peer {
            if *expected != peer {
                return Err(AuthError::IdentityMismatch {
                    expected: expected.to_hex(),
                    received: peer.to_hex(),
                });
            }
        }

        if Nonce::from_base64(&response.your_nonce)? != own_nonce {
            return Err(AuthError::InvalidMessage(
                "yourNonce does not echo the initial nonce".into(),
            ));
        }

        // From here on "initial" is the responder's nonce and "session" ours.
        let peer_nonce = Nonce::from_base64(&response.initial_nonce)?;
        let initial = peer_nonce.to_base64();
        let session = own_nonce.to_base64();

        let key_id = handshake_key_id(Role::Verifier, &initial, &session)?;
        let payload = SignaturePayload::build(Role::Verifier, &initial, &session)?;
        let signature = decode_signature(&response.signature)?;

        let protocol = auth_protocol();
        let counterparty = Counterparty::other(peer);
        self.identity.verify_signature(
            payload.as_bytes(),
            &signature,
            &protocol,
            &key_id,
            &counterparty,
            false,
        )?;
        self.nonces.consume(&peer_nonce, &peer)?;

        let proof = if self.config.require_mutual_proof {
            let proof_key_id = handshake_key_id(Role::Signer, &initial, &session)?;
            let proof_payload = SignaturePayload::build(Role::Signer, &initial, &session)?;
            let signature = self.identity.create_signature(
                proof_payload.as_bytes(),
                &protocol,
                &proof_key_id,
                &counterparty,
            )?;
            Some(MutualProof {
                version: AUTH_VERSION.to_string(),
                identity_key: self.identity.identity_key(),
                nonce: session,
                your_nonce: initial,
                signature: encode_signature(&signature),
            })
        } else {
            None
        };

        let session = Session {
            counterparty_identity_key: peer,
            session_key_id: key_id,
            local_nonce: own_nonce,
            peer_nonce,
            established_at: Utc::now(),
        };
        Ok((session, proof))
    }

    pub fn check_timeout(&mut self) -> Result<(), AuthError> {
        self.check_timeout_at(Instant::now())
    }

    /// Move to `Failed` if the handshake has been open for at least the
    /// configured timeout at `now`.
    pub fn check_timeout_at(&mut self, now: Instant) -> Result<(), AuthError> {
        match self.state.timeout_error(self.config.handshake_timeout(), now) {
            Some(err) => Err(self.fail(err)),
            None => Ok(()),
        }
    }

    /// Abandon an in-progress handshake as timed out.
    pub fn expire(&mut self) -> Option<AuthError> {
        let err = self.state.expire(Instant::now())?;
        Some(self.fail(err))
    }

    pub(crate) fn fail(&mut self, error: AuthError) -> AuthError {
        warn!(role = "initiator", state = self.state.name(), error = %error, "handshake failed");
        self.state = HandshakeState::Failed {
            error: error.clone(),
        };
        error
    }
}

// ============================================================================
// Responder
// ============================================================================

/// Responder-side handshake.
pub struct HandshakeResponder<I: IdentityProvider> {
    state: HandshakeState,
    identity: Arc<I>,
    nonces: Arc<NonceManager>,
    config: AuthConfig,
}

impl<I: IdentityProvider> HandshakeResponder<I> {
    pub fn new(identity: Arc<I>, nonces: Arc<NonceManager>, config: AuthConfig) -> Self {
        Self {
            state: HandshakeState::Idle,
            identity,
            nonces,
            config,
        }
    }

    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&Session> {
        self.state.session()
    }

    pub fn reset(&mut self) -> Result<(), AuthError> {
        if self.state.is_terminal() {
            return Err(invalid_transition(&self.state, "reset"));
        }
        self.state = HandshakeState::Idle;
        Ok(())
    }

    /// Answer an initial request with a fresh session nonce.
    pub fn respond(&mut self, request: &InitialRequest) -> Result<InitialResponse, AuthError> {
        let nonce = self.nonces.generate()?;
        self.respond_with_nonce(request, nonce)
    }

    /// Answer an initial request with a caller-chosen session nonce.
    pub fn respond_with_nonce(
        &mut self,
        request: &InitialRequest,
        session_nonce: Nonce,
    ) -> Result<InitialResponse, AuthError> {
        if !matches!(self.state, HandshakeState::Idle) {
            return Err(invalid_transition(&self.state, "respond"));
        }

        let (response, initial_nonce, key_id) = match self.sign_response(request, session_nonce) {
            Ok(signed) => signed,
            Err(e) => return Err(self.fail(e)),
        };

        let peer = request.identity_key;
        if self.config.require_mutual_proof {
            self.state = HandshakeState::Responding {
                peer,
                initial_nonce,
                session_nonce,
                started_at: Instant::now(),
            };
            debug!(peer = %peer, state = self.state.name(), "initial response sent");
        } else {
            self.state = HandshakeState::Authenticated {
                session: Session {
                    counterparty_identity_key: peer,
                    session_key_id: key_id,
                    local_nonce: session_nonce,
                    peer_nonce: initial_nonce,
                    established_at: Utc::now(),
                },
            };
            info!(peer = %peer, mutual_proof = false, "handshake authenticated");
        }
        Ok(response)
    }

    fn sign_response(
        &self,
        request: &InitialRequest,
        session_nonce: Nonce,
    ) -> Result<(InitialResponse, Nonce, KeyId), AuthError> {
        check_version(&request.version)?;

        let peer = request.identity_key;
        let initial_nonce = Nonce::from_base64(&request.initial_nonce)?;
        let initial = initial_nonce.to_base64();
        let session = session_nonce.to_base64();

        let key_id = handshake_key_id(Role::Signer, &initial, &session)?;
        let payload = SignaturePayload::build(Role::Signer, &initial, &session)?;

        self.nonces.consume(&initial_nonce, &peer)?;
        let signature = self.identity.create_signature(
            payload.as_bytes(),
            &auth_protocol(),
            &key_id,
            &Counterparty::other(peer),
        )?;
        self.nonces.track(&session_nonce, &peer);

        let response = InitialResponse {
            version: AUTH_VERSION.to_string(),
            identity_key: self.identity.identity_key(),
            initial_nonce: session,
            your_nonce: initial,
            signature: encode_signature(&signature),
        };
        Ok((response, initial_nonce, key_id))
    }

    /// Verify the initiator's counter-signature.
    pub fn handle_proof(&mut self, proof: &MutualProof) -> Result<Session, AuthError> {
        self.handle_proof_at(proof, Instant::now())
    }

    pub fn handle_proof_at(
        &mut self,
        proof: &MutualProof,
        now: Instant,
    ) -> Result<Session, AuthError> {
        let (peer, initial_nonce, session_nonce) = match &self.state {
            HandshakeState::Responding {
                peer,
                initial_nonce,
                session_nonce,
                ..
            } => (*peer, *initial_nonce, *session_nonce),
            other => return Err(invalid_transition(other, "handle proof")),
        };
        self.check_timeout_at(now)?;

        match self.verify_proof(proof, peer, initial_nonce, session_nonce) {
            Ok(session) => {
                info!(peer = %peer, mutual_proof = true, "handshake authenticated");
                self.state = HandshakeState::Authenticated {
                    session: session.clone(),
                };
                Ok(session)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn verify_proof(
        &self,
        proof: &MutualProof,
        peer: PublicKey,
        initial_nonce: Nonce,
        session_nonce: Nonce,
    ) -> Result<Session, AuthError> {
        check_version(&proof.version)?;

        if proof.identity_key != peer {
            return Err(AuthError::IdentityMismatch {
                expected: peer.to_hex(),
                received: proof.identity_key.to_hex(),
            });
        }
        if Nonce::from_base64(&proof.your_nonce)? != session_nonce {
            return Err(AuthError::InvalidMessage(
                "yourNonce does not echo the session nonce".into(),
            ));
        }
        if Nonce::from_base64(&proof.nonce)? != initial_nonce {
            return Err(AuthError::InvalidMessage(
                "nonce does not match the initial request".into(),
            ));
        }

        let initial = initial_nonce.to_base64();
        let session = session_nonce.to_base64();
        let proof_key_id = handshake_key_id(Role::Verifier, &initial, &session)?;
        let payload = SignaturePayload::build(Role::Verifier, &initial, &session)?;
        let signature = decode_signature(&proof.signature)?;

        self.identity.verify_signature(
            payload.as_bytes(),
            &signature,
            &auth_protocol(),
            &proof_key_id,
            &Counterparty::other(peer),
            false,
        )?;
        self.nonces.consume(&session_nonce, &peer)?;

        Ok(Session {
            counterparty_identity_key: peer,
            session_key_id: handshake_key_id(Role::Signer, &initial, &session)?,
            local_nonce: session_nonce,
            peer_nonce: initial_nonce,
            established_at: Utc::now(),
        })
    }

    pub fn check_timeout(&mut self) -> Result<(), AuthError> {
        self.check_timeout_at(Instant::now())
    }

    pub fn check_timeout_at(&mut self, now: Instant) -> Result<(), AuthError> {
        match self.state.timeout_error(self.config.handshake_timeout(), now) {
            Some(err) => Err(self.fail(err)),
            None => Ok(()),
        }
    }

    pub fn expire(&mut self) -> Option<AuthError> {
        let err = self.state.expire(Instant::now())?;
        Some(self.fail(err))
    }

    pub(crate) fn fail(&mut self, error: AuthError) -> AuthError {
        warn!(role = "responder", state = self.state.name(), error = %error, "handshake failed");
        self.state = HandshakeState::Failed {
            error: error.clone(),
        };
        error
    }
}
