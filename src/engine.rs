//! The public engine.
//!
//! [`Engine`] turns application bytes into records with `wrap` and records
//! into application bytes with `unwrap`. It never touches a socket. Every
//! call reports how many bytes it produced and consumed, and what the caller
//! should do next.

use std::sync::Arc;

use crate::close::{classify_alert, AlertAction, CloseState};
use crate::config::MAX_FRAGMENT_LENGTH;
use crate::handshake::{Context, Handshaker};
use crate::layer::{Completion, RecordLayer};
use crate::message::{Alert, CipherSuite, ProtocolVersion};
use crate::record::{ContentType, Decoded, Record};
use crate::result::{HandshakeStatus, OperationResult, Status};
use crate::rng::SeededRng;
use crate::task::{DelegatedTask, TaskQueue};
use crate::{Config, Error, ProtocolError};

/// Slack on top of the largest record for the protection overhead.
const PACKET_SLACK: usize = 256;

/// Which end of the connection an engine is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// Coarse lifecycle of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationalState {
    /// Before and during the handshake.
    Handshaking,
    /// Handshake complete, application data flows.
    Application,
    /// A close_notify has been requested, sent or received.
    Closing,
    /// Both directions are closed. Terminal.
    Closed,
}

/// A TLS 1.2 endpoint driven through caller supplied buffers.
///
/// ```
/// use std::sync::Arc;
/// use tlsengine::{Config, Engine, HandshakeStatus};
///
/// let config = Arc::new(Config::default());
/// let mut client = Engine::client(config);
/// client.begin_handshake().unwrap();
///
/// let mut packet = vec![0; client.packet_buffer_size()];
/// let res = client.wrap(&[], &mut packet).unwrap();
///
/// // The ClientHello is ready to go out.
/// assert!(res.bytes_produced() > 0);
/// assert_eq!(res.handshake_status(), HandshakeStatus::NeedUnwrap);
/// ```
pub struct Engine {
    config: Arc<Config>,
    role: Role,
    state: OperationalState,

    /// Set by `begin_handshake`.
    started: bool,

    /// The fatal error that closed the engine, replayed on every call.
    failed: Option<Error>,

    handshaker: Handshaker,
    layer: RecordLayer,
    tasks: TaskQueue,
    close: CloseState,
    rng: SeededRng,
}

impl Engine {
    pub fn new(config: Arc<Config>, role: Role) -> Self {
        let rng = SeededRng::new(config.rng_seed());
        Engine {
            config,
            role,
            state: OperationalState::Handshaking,
            started: false,
            failed: None,
            handshaker: Handshaker::new(role),
            layer: RecordLayer::new(),
            tasks: TaskQueue::new(),
            close: CloseState::default(),
            rng,
        }
    }

    pub fn client(config: Arc<Config>) -> Self {
        Self::new(config, Role::Client)
    }

    pub fn server(config: Arc<Config>) -> Self {
        Self::new(config, Role::Server)
    }

    /// Start the handshake.
    ///
    /// Calling it again during the handshake does nothing. Once the
    /// handshake is complete it fails with `ProtocolError::Renegotiation`,
    /// and on a closing or closed engine with `ProtocolError::EngineClosed`.
    pub fn begin_handshake(&mut self) -> Result<(), Error> {
        match self.state {
            OperationalState::Closing | OperationalState::Closed => {
                Err(ProtocolError::EngineClosed.into())
            }
            OperationalState::Application => Err(ProtocolError::Renegotiation.into()),
            OperationalState::Handshaking => {
                if !self.started {
                    debug!("Begin handshake as {:?}", self.role);
                    self.started = true;
                }
                Ok(())
            }
        }
    }

    /// Produce records for the peer into `dst`.
    ///
    /// During the handshake `src` is ignored and handshake flights are
    /// produced. Afterwards at most `max_fragment_length` bytes of `src` are
    /// sealed into one record.
    pub fn wrap(&mut self, src: &[u8], dst: &mut [u8]) -> Result<OperationResult, Error> {
        if let Some(err) = &self.failed {
            if !self.layer.has_outgoing() {
                return Err(err.clone());
            }
            // The fatal alert goes out once.
            let flushed = self.layer.flush(dst);
            if flushed.blocked {
                return Ok(OperationResult::new(
                    Status::BufferOverflow,
                    HandshakeStatus::NeedWrap,
                    0,
                    0,
                ));
            }
            return Ok(OperationResult::new(
                Status::Closed,
                HandshakeStatus::NotHandshaking,
                flushed.produced,
                0,
            ));
        }

        if self.state == OperationalState::Closed {
            return Ok(closed());
        }
        if !self.started {
            return Err(ProtocolError::NotStarted.into());
        }

        let result = match self.state {
            OperationalState::Handshaking => self.wrap_handshake(dst),
            OperationalState::Application => self.wrap_application(src, dst),
            OperationalState::Closing => self.wrap_closing(dst),
            OperationalState::Closed => Ok(closed()),
        };

        result.map_err(|e| self.fail(e))
    }

    /// Consume records from the peer in `src`, writing any plaintext to
    /// `dst`.
    ///
    /// During the handshake a whole flight is consumed. Afterwards one
    /// record is opened per call.
    pub fn unwrap(&mut self, src: &[u8], dst: &mut [u8]) -> Result<OperationResult, Error> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        if self.state == OperationalState::Closed {
            return Ok(closed());
        }
        if !self.started {
            return Err(ProtocolError::NotStarted.into());
        }
        if self.close.is_inbound_done() {
            if src.is_empty() {
                return Ok(OperationResult::new(
                    Status::Closed,
                    self.handshake_status(),
                    0,
                    0,
                ));
            }
            return Err(Error::InboundClosed);
        }

        let result = match self.state {
            OperationalState::Handshaking => self.unwrap_handshake(src),
            OperationalState::Application | OperationalState::Closing => {
                self.unwrap_record(src, dst)
            }
            OperationalState::Closed => Ok(closed()),
        };

        result.map_err(|e| self.fail(e))
    }

    /// Request an orderly close of the outbound side.
    ///
    /// Nothing is produced here. The next `wrap` emits the close_notify.
    /// Any unsent handshake flight and pending delegated tasks are dropped.
    pub fn close_outbound(&mut self) {
        if self.state == OperationalState::Closed {
            return;
        }
        if !self.started {
            debug!("Close unstarted engine");
            self.close.close_all();
            self.set_state(OperationalState::Closed);
            return;
        }
        if self.close.close_outbound() {
            debug!("Close outbound");
            self.abandon_handshake();
            self.enter_closing();
        }
    }

    /// Close the inbound side.
    ///
    /// Returns `Error::InboundTruncated` if the peer's close_notify never
    /// arrived. The inbound side is closed regardless, and a close_notify is
    /// then owed to the peer.
    pub fn close_inbound(&mut self) -> Result<(), Error> {
        if self.state == OperationalState::Closed {
            return Ok(());
        }
        if !self.started {
            debug!("Close unstarted engine");
            self.close.close_all();
            self.set_state(OperationalState::Closed);
            return Ok(());
        }

        let received_notify = self.close.close_inbound();
        self.abandon_handshake();
        self.enter_closing();

        if received_notify {
            Ok(())
        } else {
            warn!("Inbound closed without close_notify");
            Err(Error::InboundTruncated)
        }
    }

    /// Take the next task that must run before the handshake can continue.
    pub fn delegated_task(&mut self) -> Option<DelegatedTask> {
        self.tasks.next()
    }

    /// What the caller should do next.
    pub fn handshake_status(&self) -> HandshakeStatus {
        match self.state {
            OperationalState::Handshaking if !self.started => HandshakeStatus::NotHandshaking,
            OperationalState::Handshaking => {
                if self.layer.has_outgoing() {
                    HandshakeStatus::NeedWrap
                } else {
                    self.handshaker.status(self.tasks.is_pending())
                }
            }
            OperationalState::Application => HandshakeStatus::NotHandshaking,
            OperationalState::Closing => self.close.handshake_status(),
            OperationalState::Closed => {
                if self.layer.has_outgoing() {
                    HandshakeStatus::NeedWrap
                } else {
                    HandshakeStatus::NotHandshaking
                }
            }
        }
    }

    pub fn is_outbound_done(&self) -> bool {
        self.close.is_outbound_done()
    }

    pub fn is_inbound_done(&self) -> bool {
        self.close.is_inbound_done()
    }

    pub fn state(&self) -> OperationalState {
        self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Negotiated protocol version, once the hellos are exchanged.
    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        self.handshaker.protocol_version()
    }

    /// Negotiated cipher suite, once the hellos are exchanged.
    pub fn cipher_suite(&self) -> Option<CipherSuite> {
        self.handshaker.cipher_suite().map(|cs| cs.suite())
    }

    /// DER certificates the server presented, leaf first. Empty on servers.
    pub fn peer_certificates(&self) -> &[Vec<u8>] {
        self.handshaker.peer_certificates()
    }

    /// A `dst` of this size always fits the next outbound record, and a
    /// `src` of this size always fits one inbound record.
    pub fn packet_buffer_size(&self) -> usize {
        Record::HEADER_LEN + MAX_FRAGMENT_LENGTH + PACKET_SLACK
    }

    /// A `dst` of this size always fits the plaintext of one record.
    pub fn application_buffer_size(&self) -> usize {
        MAX_FRAGMENT_LENGTH
    }

    fn wrap_handshake(&mut self, dst: &mut [u8]) -> Result<OperationResult, Error> {
        self.absorb_tasks()?;
        if self.tasks.is_pending() {
            return Ok(OperationResult::new(
                Status::Ok,
                HandshakeStatus::NeedTask,
                0,
                0,
            ));
        }

        if !self.layer.has_outgoing() && self.handshaker.wants_wrap() {
            let (handshaker, mut ctx) = self.parts();
            handshaker.produce(&mut ctx)?;
        }

        let flushed = self.layer.flush(dst);
        if flushed.handshake_finished {
            self.set_state(OperationalState::Application);
            return Ok(OperationResult::new(
                Status::Ok,
                HandshakeStatus::Finished,
                flushed.produced,
                0,
            ));
        }
        if flushed.blocked && flushed.produced == 0 {
            return Ok(OperationResult::new(
                Status::BufferOverflow,
                HandshakeStatus::NeedWrap,
                0,
                0,
            ));
        }

        Ok(OperationResult::new(
            Status::Ok,
            self.handshake_status(),
            flushed.produced,
            0,
        ))
    }

    fn wrap_application(&mut self, src: &[u8], dst: &mut [u8]) -> Result<OperationResult, Error> {
        if src.is_empty() {
            return Ok(OperationResult::new(
                Status::Ok,
                HandshakeStatus::NotHandshaking,
                0,
                0,
            ));
        }

        let len = src.len().min(self.config.max_fragment_length());
        if self.layer.sealed_len(len) > dst.len() {
            return Ok(OperationResult::new(
                Status::BufferOverflow,
                HandshakeStatus::NotHandshaking,
                0,
                0,
            ));
        }

        self.layer.seal(ContentType::ApplicationData, &src[..len], None)?;
        let flushed = self.layer.flush(dst);

        Ok(OperationResult::new(
            Status::Ok,
            HandshakeStatus::NotHandshaking,
            flushed.produced,
            len,
        ))
    }

    fn wrap_closing(&mut self, dst: &mut [u8]) -> Result<OperationResult, Error> {
        if self.close.is_outbound_done() {
            // Our close_notify is out. Only the peer's is missing.
            return Ok(OperationResult::new(
                Status::Closed,
                self.close.handshake_status(),
                0,
                0,
            ));
        }

        if self.close.owes_close_notify() {
            let mut payload = Vec::with_capacity(Alert::LEN);
            Alert::close_notify().serialize(&mut payload);
            self.layer.seal(
                ContentType::Alert,
                &payload,
                Some(Completion::CloseNotify),
            )?;
            self.close.close_notify_queued();
        }

        let flushed = self.layer.flush(dst);
        if flushed.close_notify {
            debug!("Sent close_notify");
            self.close.close_notify_sent();
            self.enter_closing();
            return Ok(OperationResult::new(
                Status::Closed,
                self.close.handshake_status(),
                flushed.produced,
                0,
            ));
        }
        if flushed.blocked && flushed.produced == 0 {
            return Ok(OperationResult::new(
                Status::BufferOverflow,
                HandshakeStatus::NeedWrap,
                0,
                0,
            ));
        }

        Ok(OperationResult::new(
            Status::Ok,
            HandshakeStatus::NeedWrap,
            flushed.produced,
            0,
        ))
    }

    fn unwrap_handshake(&mut self, src: &[u8]) -> Result<OperationResult, Error> {
        self.absorb_tasks()?;
        if self.tasks.is_pending() {
            return Ok(OperationResult::new(
                Status::Ok,
                HandshakeStatus::NeedTask,
                0,
                0,
            ));
        }
        if self.layer.has_outgoing() || !self.handshaker.wants_record() {
            return Ok(OperationResult::new(
                Status::Ok,
                self.handshake_status(),
                0,
                0,
            ));
        }

        let mut consumed = 0;

        // Read until the flight is in or the input runs out.
        while self.handshaker.wants_record() {
            let (record, n) = match Record::decode(&src[consumed..])? {
                Decoded::Record(record, n) => (record, n),
                Decoded::Incomplete if consumed == 0 => {
                    return Ok(OperationResult::new(
                        Status::BufferUnderflow,
                        self.handshake_status(),
                        0,
                        0,
                    ));
                }
                Decoded::Incomplete => break,
            };

            let plaintext = self.layer.open(&record)?;
            consumed += n;
            trace!("Open {:?} record, {} bytes", record.content_type, n);

            match record.content_type {
                ContentType::Handshake => {
                    let (handshaker, mut ctx) = self.parts();
                    handshaker.receive(&plaintext, &mut ctx)?;
                }
                ContentType::ChangeCipherSpec => {
                    check_change_cipher_spec(&plaintext)?;
                    let (handshaker, mut ctx) = self.parts();
                    handshaker.change_cipher_spec(&mut ctx)?;
                }
                ContentType::Alert => {
                    if let Some(result) = self.on_alert(&plaintext, consumed)? {
                        return Ok(result);
                    }
                }
                ContentType::ApplicationData => {
                    return Err(ProtocolError::UnexpectedMessage(
                        "application data during handshake".to_string(),
                    )
                    .into());
                }
                ContentType::Unknown(v) => {
                    return Err(ProtocolError::UnexpectedContentType(v).into());
                }
            }

            if self.handshaker.is_complete() {
                self.set_state(OperationalState::Application);
                return Ok(OperationResult::new(
                    Status::Ok,
                    HandshakeStatus::Finished,
                    0,
                    consumed,
                ));
            }
        }

        Ok(OperationResult::new(
            Status::Ok,
            self.handshake_status(),
            0,
            consumed,
        ))
    }

    fn unwrap_record(&mut self, src: &[u8], dst: &mut [u8]) -> Result<OperationResult, Error> {
        let (record, n) = match Record::decode(src)? {
            Decoded::Record(record, n) => (record, n),
            Decoded::Incomplete => {
                return Ok(OperationResult::new(
                    Status::BufferUnderflow,
                    self.handshake_status(),
                    0,
                    0,
                ));
            }
        };

        match record.content_type {
            ContentType::ApplicationData => {
                if self.layer.opened_len(&record) > dst.len() {
                    return Ok(OperationResult::new(
                        Status::BufferOverflow,
                        self.handshake_status(),
                        0,
                        0,
                    ));
                }
                let plaintext = self.layer.open(&record)?;
                dst[..plaintext.len()].copy_from_slice(&plaintext);
                Ok(OperationResult::new(
                    Status::Ok,
                    self.handshake_status(),
                    plaintext.len(),
                    n,
                ))
            }
            ContentType::Alert => {
                let plaintext = self.layer.open(&record)?;
                match self.on_alert(&plaintext, n)? {
                    Some(result) => Ok(result),
                    None => Ok(OperationResult::new(
                        Status::Ok,
                        self.handshake_status(),
                        0,
                        n,
                    )),
                }
            }
            ContentType::Handshake => {
                self.layer.open(&record)?;
                if self.state == OperationalState::Application {
                    return Err(ProtocolError::UnexpectedMessage(
                        "handshake message after the handshake".to_string(),
                    )
                    .into());
                }
                debug!("Discard handshake record while closing");
                Ok(OperationResult::new(
                    Status::Ok,
                    self.handshake_status(),
                    0,
                    n,
                ))
            }
            ContentType::ChangeCipherSpec => {
                let plaintext = self.layer.open(&record)?;
                check_change_cipher_spec(&plaintext)?;
                if self.state == OperationalState::Application {
                    return Err(ProtocolError::UnexpectedMessage(
                        "ChangeCipherSpec after the handshake".to_string(),
                    )
                    .into());
                }

                if self.layer.has_staged_rx() {
                    self.layer.activate_rx()?;
                    return Ok(OperationResult::new(
                        Status::Ok,
                        self.handshake_status(),
                        0,
                        n,
                    ));
                }

                // Without keys nothing after this record can be read.
                debug!("No keys for peer ChangeCipherSpec, close inbound");
                self.close.close_inbound();
                self.enter_closing();
                Ok(OperationResult::new(
                    Status::Closed,
                    self.handshake_status(),
                    0,
                    n,
                ))
            }
            ContentType::Unknown(v) => Err(ProtocolError::UnexpectedContentType(v).into()),
        }
    }

    /// Act on an alert. `Some` ends the current unwrap with that result.
    fn on_alert(
        &mut self,
        payload: &[u8],
        consumed: usize,
    ) -> Result<Option<OperationResult>, Error> {
        match classify_alert(payload)? {
            AlertAction::CloseNotify => {
                debug!("Received close_notify");
                self.close.on_close_notify();
                self.abandon_handshake();
                self.enter_closing();
                Ok(Some(OperationResult::new(
                    Status::Closed,
                    self.handshake_status(),
                    0,
                    consumed,
                )))
            }
            AlertAction::Ignore(description) => {
                debug!("Ignore warning alert {:?}", description);
                Ok(None)
            }
            AlertAction::Fatal(description) => {
                warn!("Peer sent fatal alert {:?}", description);
                Err(Error::PeerAlert(description))
            }
        }
    }

    fn absorb_tasks(&mut self) -> Result<(), Error> {
        for outcome in self.tasks.take_finished() {
            let keys = outcome?;
            let (handshaker, mut ctx) = self.parts();
            handshaker.keys_ready(keys, &mut ctx)?;
        }
        Ok(())
    }

    /// Drop handshake work that can no longer complete.
    fn abandon_handshake(&mut self) {
        if self.state == OperationalState::Handshaking {
            self.layer.clear_outgoing();
            self.tasks.clear();
        }
    }

    fn enter_closing(&mut self) {
        if self.close.is_fully_closed() {
            self.set_state(OperationalState::Closed);
        } else {
            self.set_state(OperationalState::Closing);
        }
    }

    /// Close the engine on a fatal error. The error is returned for the
    /// current call and replayed on every later one.
    fn fail(&mut self, err: Error) -> Error {
        warn!("{:?} engine failed: {}", self.role, err);

        self.tasks.clear();
        self.layer.clear_outgoing();

        if let Some(description) = err.alert() {
            let mut payload = Vec::with_capacity(Alert::LEN);
            Alert::fatal(description).serialize(&mut payload);
            if let Err(e) = self.layer.seal(ContentType::Alert, &payload, None) {
                debug!("Failed to seal fatal alert: {}", e);
            }
        }

        self.close.close_all();
        self.set_state(OperationalState::Closed);
        self.failed = Some(err.clone());
        err
    }

    fn set_state(&mut self, state: OperationalState) {
        if self.state != state {
            trace!("{:?} {:?} -> {:?}", self.role, self.state, state);
            self.state = state;
        }
    }

    fn parts(&mut self) -> (&mut Handshaker, Context<'_>) {
        (
            &mut self.handshaker,
            Context {
                config: &self.config,
                layer: &mut self.layer,
                tasks: &mut self.tasks,
                rng: &mut self.rng,
            },
        )
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("started", &self.started)
            .field("failed", &self.failed)
            .field("handshaker", &self.handshaker)
            .field("close", &self.close)
            .finish()
    }
}

fn closed() -> OperationResult {
    OperationResult::new(Status::Closed, HandshakeStatus::NotHandshaking, 0, 0)
}

fn check_change_cipher_spec(payload: &[u8]) -> Result<(), Error> {
    if payload != [1] {
        return Err(ProtocolError::Decode(format!(
            "ChangeCipherSpec payload {:?}",
            payload
        ))
        .into());
    }
    Ok(())
}
