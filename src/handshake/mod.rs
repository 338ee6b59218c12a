//! TLS 1.2 full handshake, one state machine per role.
//!
//! Client: ClientHello, then ServerHello, Certificate, ServerKeyExchange
//! and ServerHelloDone from the server. The client answers with
//! ClientKeyExchange, ChangeCipherSpec and Finished, and the server closes
//! with ChangeCipherSpec and Finished.
//!
//! Each machine is a `State` enum dispatched over `(state, event)`. The
//! ECDH agreement and the key derivation run in a delegated task between
//! the key exchange and the ChangeCipherSpec.

use std::sync::Arc;

use zeroize::Zeroize;

use crate::buffer::Buf;
use crate::config::MAX_FRAGMENT_LENGTH;
use crate::crypto::{ActiveKeyExchange, CertVerifier, KeyMaterial, SupportedCipherSuite};
use crate::layer::{Completion, RecordLayer};
use crate::message::{Body, Handshake, MessageType, ProtocolVersion, Random};
use crate::record::ContentType;
use crate::result::HandshakeStatus;
use crate::rng::SeededRng;
use crate::task::TaskQueue;
use crate::{Config, Error, ProtocolError, Role};

mod client;
mod server;

/// Largest handshake message accepted from the peer.
pub(crate) const MAX_MESSAGE_LEN: usize = 65_536;

/// Input to a state machine.
#[derive(Debug)]
pub(crate) enum Event<'a> {
    /// The caller called `wrap`. Send states produce their flight.
    Flight,
    /// A whole handshake message with its raw encoding.
    Message(Handshake<'a>, &'a [u8]),
    /// The peer's ChangeCipherSpec.
    ChangeCipherSpec,
    /// Outcome of the key derivation task.
    KeysReady(KeyMaterial),
}

impl Event<'_> {
    fn describe(&self) -> String {
        match self {
            Event::Flight => "wrap".to_string(),
            Event::Message(message, _) => format!("{:?}", message.msg_type),
            Event::ChangeCipherSpec => "ChangeCipherSpec".to_string(),
            Event::KeysReady(_) => "derived keys".to_string(),
        }
    }
}

/// What the state machines may touch besides their own session.
pub(crate) struct Context<'a> {
    pub config: &'a Arc<Config>,
    pub layer: &'a mut RecordLayer,
    pub tasks: &'a mut TaskQueue,
    pub rng: &'a mut SeededRng,
}

/// Parameters negotiated so far.
#[derive(Default)]
pub(crate) struct Session {
    /// Every handshake message sent or received, in order.
    transcript: Buf,
    client_random: Option<Random>,
    server_random: Option<Random>,
    suite: Option<&'static dyn SupportedCipherSuite>,
    version: Option<ProtocolVersion>,
    kx: Option<Box<dyn ActiveKeyExchange>>,
    /// Our ECDH public key, kept for the ClientKeyExchange.
    own_public: Buf,
    peer_public: Buf,
    peer_certificates: Vec<Vec<u8>>,
    master_secret: Buf,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.master_secret.zeroize();
        self.transcript.zeroize();
    }
}

impl Session {
    fn suite(&self) -> Result<&'static dyn SupportedCipherSuite, Error> {
        self.suite
            .ok_or_else(|| Error::CryptoError("no cipher suite negotiated".to_string()))
    }

    /// Serialize `body` onto `flight` and record it in the transcript.
    fn push_message(&mut self, flight: &mut Vec<u8>, body: Body) {
        let start = flight.len();
        Handshake::new(body).serialize(flight);
        self.transcript.extend_from_slice(&flight[start..]);
    }

    fn verify_data(&self, label: &str) -> Result<Vec<u8>, Error> {
        self.suite()?
            .verify_data(&self.master_secret, label, &self.transcript)
            .map_err(Error::CryptoError)
    }

    /// Compare the peer's Finished against the transcript so far.
    fn check_finished(&self, label: &str, received: &[u8]) -> Result<(), Error> {
        let expected = self.verify_data(label)?;
        if !crate::crypto::verify_data_matches(&expected, received) {
            warn!("Finished verify_data mismatch");
            return Err(ProtocolError::BadFinished.into());
        }
        Ok(())
    }

    /// Queue the ECDH completion and key derivation as a delegated task.
    ///
    /// The client also verifies the server chain inside the task.
    fn spawn_key_derivation(
        &mut self,
        ctx: &mut Context<'_>,
        verifier: Option<Arc<dyn CertVerifier>>,
    ) -> Result<(), Error> {
        let suite = self.suite()?;
        let kx = self
            .kx
            .take()
            .ok_or_else(|| Error::CryptoError("no active key exchange".to_string()))?;
        let peer_public = std::mem::take(&mut self.peer_public);
        let chain = self.peer_certificates.clone();
        let (Some(client_random), Some(server_random)) = (self.client_random, self.server_random)
        else {
            return Err(Error::CryptoError("hello randoms missing".to_string()));
        };
        let client_random = client_random.to_bytes();
        let server_random = server_random.to_bytes();

        debug!("Queue key derivation for {:?}", suite.suite());
        ctx.tasks.push(move || {
            if let Some(verifier) = verifier {
                verifier
                    .verify_certificate(&chain)
                    .map_err(Error::CertificateError)?;
            }

            let mut pre_master = kx.complete(&peer_public).map_err(Error::CryptoError)?;
            let keys = suite.derive_keys(&pre_master, &client_random, &server_random);
            pre_master.zeroize();

            keys.map_err(Error::CryptoError)
        });

        Ok(())
    }

    /// Stage the record ciphers for `role` and keep the master secret.
    fn install_keys(
        &mut self,
        ctx: &mut Context<'_>,
        keys: KeyMaterial,
        role: Role,
    ) -> Result<(), Error> {
        let suite = self.suite()?;
        let client = suite
            .create_cipher(&keys.client_write_key, &keys.client_write_iv)
            .map_err(Error::CryptoError)?;
        let server = suite
            .create_cipher(&keys.server_write_key, &keys.server_write_iv)
            .map_err(Error::CryptoError)?;

        match role {
            Role::Client => ctx.layer.stage(client, server),
            Role::Server => ctx.layer.stage(server, client),
        }

        self.master_secret = keys.master_secret.clone();
        Ok(())
    }
}

/// Seal handshake bytes into as many records as needed.
///
/// `completion` is attached to the last record.
fn seal_flight(
    layer: &mut RecordLayer,
    flight: &[u8],
    completion: Option<Completion>,
) -> Result<(), Error> {
    let mut chunks = flight.chunks(MAX_FRAGMENT_LENGTH).peekable();
    while let Some(chunk) = chunks.next() {
        let completion = if chunks.peek().is_none() {
            completion
        } else {
            None
        };
        layer.seal(ContentType::Handshake, chunk, completion)?;
    }
    Ok(())
}

fn seal_change_cipher_spec(layer: &mut RecordLayer) -> Result<(), Error> {
    layer.seal(ContentType::ChangeCipherSpec, &[1], None)
}

fn unexpected(state: impl std::fmt::Debug, event: &Event) -> Error {
    warn!("Unexpected {} in {:?}", event.describe(), state);
    ProtocolError::UnexpectedMessage(format!("{} in {:?}", event.describe(), state)).into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Client(client::State),
    Server(server::State),
}

impl State {
    fn wants_wrap(&self) -> bool {
        match self {
            State::Client(s) => s.wants_wrap(),
            State::Server(s) => s.wants_wrap(),
        }
    }

    fn awaits_message(&self) -> bool {
        match self {
            State::Client(s) => s.awaits_message(),
            State::Server(s) => s.awaits_message(),
        }
    }

    fn awaits_change_cipher_spec(&self) -> bool {
        match self {
            State::Client(s) => s.awaits_change_cipher_spec(),
            State::Server(s) => s.awaits_change_cipher_spec(),
        }
    }

    fn awaits_keys(&self) -> bool {
        match self {
            State::Client(s) => *s == client::State::AwaitKeys,
            State::Server(s) => *s == server::State::AwaitKeys,
        }
    }

    fn is_complete(&self) -> bool {
        match self {
            State::Client(s) => *s == client::State::Complete,
            State::Server(s) => *s == server::State::Complete,
        }
    }
}

/// Handshake driver shared by both roles.
pub(crate) struct Handshaker {
    state: State,
    session: Session,
    /// Partial handshake message bytes carried across records.
    inbox: Buf,
}

impl Handshaker {
    pub fn new(role: Role) -> Self {
        let state = match role {
            Role::Client => State::Client(client::State::SendClientHello),
            Role::Server => State::Server(server::State::AwaitClientHello),
        };
        Handshaker {
            state,
            session: Session::default(),
            inbox: Buf::new(),
        }
    }

    fn role(&self) -> Role {
        match self.state {
            State::Client(_) => Role::Client,
            State::Server(_) => Role::Server,
        }
    }

    /// The machine has a flight to produce on the next wrap.
    pub fn wants_wrap(&self) -> bool {
        self.state.wants_wrap()
    }

    /// The machine will act on the next inbound record.
    pub fn wants_record(&self) -> bool {
        self.state.awaits_message() || self.state.awaits_change_cipher_spec()
    }

    pub fn is_complete(&self) -> bool {
        self.state.is_complete()
    }

    pub fn peer_certificates(&self) -> &[Vec<u8>] {
        &self.session.peer_certificates
    }

    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        self.session.version
    }

    pub fn cipher_suite(&self) -> Option<&'static dyn SupportedCipherSuite> {
        self.session.suite
    }

    /// What the caller should do next for the handshake to progress.
    pub fn status(&self, tasks_pending: bool) -> HandshakeStatus {
        if tasks_pending {
            HandshakeStatus::NeedTask
        } else if self.state.wants_wrap() {
            HandshakeStatus::NeedWrap
        } else if self.state.awaits_keys() {
            // Keys are in, the next call absorbs them.
            match self.role() {
                Role::Client => HandshakeStatus::NeedWrap,
                Role::Server => HandshakeStatus::NeedUnwrap,
            }
        } else if self.state.is_complete() {
            HandshakeStatus::NotHandshaking
        } else {
            HandshakeStatus::NeedUnwrap
        }
    }

    /// Produce the pending flight into the record layer.
    pub fn produce(&mut self, ctx: &mut Context<'_>) -> Result<(), Error> {
        self.dispatch(Event::Flight, ctx)
    }

    /// Feed the plaintext of a handshake record.
    pub fn receive(&mut self, fragment: &[u8], ctx: &mut Context<'_>) -> Result<(), Error> {
        if !self.state.awaits_message() {
            return Err(ProtocolError::UnexpectedMessage(format!(
                "handshake record in {:?}",
                self.state
            ))
            .into());
        }
        self.inbox.extend_from_slice(fragment);

        while let Some(len) = Handshake::framed_len(&self.inbox) {
            if len > MAX_MESSAGE_LEN {
                return Err(ProtocolError::Decode(format!(
                    "handshake message of {} bytes",
                    len
                ))
                .into());
            }
            if self.inbox.len() < len {
                break;
            }
            if !self.state.awaits_message() {
                return Err(ProtocolError::UnexpectedMessage(format!(
                    "handshake data after flight in {:?}",
                    self.state
                ))
                .into());
            }

            let raw = Buf::from_slice(&self.inbox[..len]);
            self.inbox.consume(len);
            let (_, message) = Handshake::parse(&raw)?;
            trace!("Received {:?} ({} bytes)", message.msg_type, len);

            // Finished is added after its verify_data has been checked.
            if message.msg_type != MessageType::Finished {
                self.session.transcript.extend_from_slice(&raw);
            }
            self.dispatch(Event::Message(message, &raw), ctx)?;
        }

        Ok(())
    }

    /// The peer's ChangeCipherSpec record arrived.
    pub fn change_cipher_spec(&mut self, ctx: &mut Context<'_>) -> Result<(), Error> {
        if !self.inbox.is_empty() {
            return Err(ProtocolError::UnexpectedMessage(
                "ChangeCipherSpec inside a handshake message".to_string(),
            )
            .into());
        }
        self.dispatch(Event::ChangeCipherSpec, ctx)
    }

    /// Hand over the outcome of the key derivation task.
    pub fn keys_ready(&mut self, keys: KeyMaterial, ctx: &mut Context<'_>) -> Result<(), Error> {
        self.dispatch(Event::KeysReady(keys), ctx)
    }

    fn dispatch(&mut self, event: Event<'_>, ctx: &mut Context<'_>) -> Result<(), Error> {
        let prev = self.state;
        let next = match prev {
            State::Client(s) => State::Client(s.handle(event, &mut self.session, ctx)?),
            State::Server(s) => State::Server(s.handle(event, &mut self.session, ctx)?),
        };
        if prev != next {
            trace!("{:?} -> {:?}", prev, next);
            self.state = next;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Handshaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handshaker")
            .field("state", &self.state)
            .field("inbox", &self.inbox.len())
            .finish()
    }
}
