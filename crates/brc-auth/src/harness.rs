//! Async handshake driver.
//!
//! Runs a [`HandshakeInitiator`] or [`HandshakeResponder`] to completion
//! over an [`AuthTransport`], bounded by the configured handshake timeout.
//! [`loopback_pair`] gives an in-process transport that carries messages as
//! JSON text, used by the integration tests.

use std::sync::Arc;

use async_trait::async_trait;
use brc_crypto::IdentityProvider;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::handshake::{elapsed_millis, HandshakeInitiator, HandshakeResponder};
use crate::messages::AuthMessage;
use crate::nonce::NonceManager;
use crate::session::Session;

/// Message carrier between two peers. Framing is up to the implementor.
#[async_trait]
pub trait AuthTransport: Send {
    async fn send(&mut self, message: AuthMessage) -> Result<(), AuthError>;
    async fn recv(&mut self) -> Result<AuthMessage, AuthError>;
}

/// One end of an in-process transport.
pub struct LoopbackTransport {
    tx: mpsc::Sender<String>,
    rx: mpsc::Receiver<String>,
}

/// Two connected loopback ends.
pub fn loopback_pair(buffer: usize) -> (LoopbackTransport, LoopbackTransport) {
    let (a_tx, b_rx) = mpsc::channel(buffer);
    let (b_tx, a_rx) = mpsc::channel(buffer);
    (
        LoopbackTransport { tx: a_tx, rx: a_rx },
        LoopbackTransport { tx: b_tx, rx: b_rx },
    )
}

#[async_trait]
impl AuthTransport for LoopbackTransport {
    async fn send(&mut self, message: AuthMessage) -> Result<(), AuthError> {
        let text = message.to_json()?;
        self.tx
            .send(text)
            .await
            .map_err(|_| AuthError::Transport("peer closed".into()))
    }

    async fn recv(&mut self) -> Result<AuthMessage, AuthError> {
        let text = self
            .rx
            .recv()
            .await
            .ok_or_else(|| AuthError::Transport("peer closed".into()))?;
        AuthMessage::from_json(&text)
    }
}

fn unexpected(expected: &str, got: &AuthMessage) -> AuthError {
    AuthError::InvalidMessage(format!("expected {}, got {}", expected, got.kind()))
}

/// Drive the initiator from `Idle` to a terminal state.
pub async fn run_initiator<I, T>(
    initiator: &mut HandshakeInitiator<I>,
    transport: &mut T,
) -> Result<Session, AuthError>
where
    I: IdentityProvider,
    T: AuthTransport,
{
    let timeout = initiator.config().handshake_timeout();
    match tokio::time::timeout(timeout, drive_initiator(initiator, transport)).await {
        Ok(Ok(session)) => Ok(session),
        Ok(Err(e)) => Err(fail_initiator(initiator, e)),
        Err(_) => {
            let err = AuthError::HandshakeTimeout {
                elapsed_ms: elapsed_millis(timeout),
            };
            Err(initiator.expire().unwrap_or_else(|| fail_initiator(initiator, err)))
        }
    }
}

async fn drive_initiator<I, T>(
    initiator: &mut HandshakeInitiator<I>,
    transport: &mut T,
) -> Result<Session, AuthError>
where
    I: IdentityProvider,
    T: AuthTransport,
{
    let request = initiator.initiate()?;
    transport.send(AuthMessage::InitialRequest(request)).await?;

    let response = match transport.recv().await? {
        AuthMessage::InitialResponse(r) => r,
        other => return Err(unexpected("initialResponse", &other)),
    };
    if let Some(proof) = initiator.handle_response(&response)? {
        debug!("sending mutual proof");
        transport.send(AuthMessage::MutualProof(proof)).await?;
    }

    initiator
        .session()
        .cloned()
        .ok_or_else(|| AuthError::InvalidState("initiator did not authenticate".into()))
}

fn fail_initiator<I: IdentityProvider>(
    initiator: &mut HandshakeInitiator<I>,
    error: AuthError,
) -> AuthError {
    // Errors raised by the machine itself already moved it to a terminal state.
    if initiator.state().is_terminal() {
        error
    } else {
        initiator.fail(error)
    }
}

/// Wait for an initial request and drive the responder to a terminal state.
pub async fn run_responder<I, T>(
    responder: &mut HandshakeResponder<I>,
    transport: &mut T,
) -> Result<Session, AuthError>
where
    I: IdentityProvider,
    T: AuthTransport,
{
    let timeout = responder.config().handshake_timeout();
    match tokio::time::timeout(timeout, drive_responder(responder, transport)).await {
        Ok(Ok(session)) => Ok(session),
        Ok(Err(e)) => Err(fail_responder(responder, e)),
        Err(_) => {
            let err = AuthError::HandshakeTimeout {
                elapsed_ms: elapsed_millis(timeout),
            };
            Err(responder.expire().unwrap_or_else(|| fail_responder(responder, err)))
        }
    }
}

async fn drive_responder<I, T>(
    responder: &mut HandshakeResponder<I>,
    transport: &mut T,
) -> Result<Session, AuthError>
where
    I: IdentityProvider,
    T: AuthTransport,
{
    let request = match transport.recv().await? {
        AuthMessage::InitialRequest(r) => r,
        other => return Err(unexpected("initialRequest", &other)),
    };
    let response = responder.respond(&request)?;
    transport.send(AuthMessage::InitialResponse(response)).await?;

    if let Some(session) = responder.session() {
        return Ok(session.clone());
    }

    let proof = match transport.recv().await? {
        AuthMessage::MutualProof(p) => p,
        other => return Err(unexpected("mutualProof", &other)),
    };
    responder.handle_proof(&proof)
}

fn fail_responder<I: IdentityProvider>(
    responder: &mut HandshakeResponder<I>,
    error: AuthError,
) -> AuthError {
    if responder.state().is_terminal() {
        error
    } else {
        responder.fail(error)
    }
}

/// Run a complete handshake between two identities over a loopback
/// transport.
///
/// Returns `(initiator_session, responder_session)`.
pub async fn run_handshake_flow<A, B>(
    initiator_identity: Arc<A>,
    responder_identity: Arc<B>,
    config: AuthConfig,
) -> Result<(Session, Session), AuthError>
where
    A: IdentityProvider,
    B: IdentityProvider,
{
    let nonce_capacity = config.nonce_capacity;
    let mut initiator = HandshakeInitiator::new(
        initiator_identity,
        Arc::new(NonceManager::new(nonce_capacity)),
        config.clone(),
    );
    let mut responder = HandshakeResponder::new(
        responder_identity,
        Arc::new(NonceManager::new(nonce_capacity)),
        config,
    );
    let (mut initiator_end, mut responder_end) = loopback_pair(4);

    let (initiator_result, responder_result) = tokio::join!(
        run_initiator(&mut initiator, &mut initiator_end),
        run_responder(&mut responder, &mut responder_end),
    );
    Ok((initiator_result?, responder_result?))
}
