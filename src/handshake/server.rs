use tinyvec::ArrayVec;

use super::{seal_change_cipher_spec, seal_flight, unexpected, Context, Event, Session};
use crate::buffer::Buf;
use crate::crypto::{CLIENT_FINISHED, SERVER_FINISHED};
use crate::layer::Completion;
use crate::message::{
    Body, Certificate, ClientHello, ClientKeyExchange, CompressionMethod, Finished, Handshake,
    ProtocolVersion, Random, ServerHello, ServerKeyExchange, MAX_CERTIFICATES,
};
use crate::{Error, ProtocolError, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum State {
    AwaitClientHello,
    SendServerHello,
    AwaitClientKeyExchange,
    AwaitKeys,
    AwaitChangeCipherSpec,
    AwaitFinished,
    SendServerFinished,
    Complete,
}

impl State {
    pub(super) fn wants_wrap(&self) -> bool {
        matches!(self, State::SendServerHello | State::SendServerFinished)
    }

    pub(super) fn awaits_message(&self) -> bool {
        matches!(
            self,
            State::AwaitClientHello | State::AwaitClientKeyExchange | State::AwaitFinished
        )
    }

    pub(super) fn awaits_change_cipher_spec(&self) -> bool {
        *self == State::AwaitChangeCipherSpec
    }

    pub(super) fn handle(
        self,
        event: Event<'_>,
        session: &mut Session,
        ctx: &mut Context<'_>,
    ) -> Result<Self, Error> {
        match (self, event) {
            (
                State::AwaitClientHello,
                Event::Message(
                    Handshake {
                        body: Body::ClientHello(hello),
                        ..
                    },
                    _,
                ),
            ) => self.await_client_hello(session, ctx, hello),

            (State::SendServerHello, Event::Flight) => self.send_server_hello(session, ctx),

            (
                State::AwaitClientKeyExchange,
                Event::Message(
                    Handshake {
                        body: Body::ClientKeyExchange(cke),
                        ..
                    },
                    _,
                ),
            ) => self.await_client_key_exchange(session, ctx, cke),

            (State::AwaitKeys, Event::KeysReady(keys)) => {
                session.install_keys(ctx, keys, Role::Server)?;
                Ok(State::AwaitChangeCipherSpec)
            }

            (State::AwaitChangeCipherSpec, Event::ChangeCipherSpec) => {
                ctx.layer.activate_rx()?;
                Ok(State::AwaitFinished)
            }

            (
                State::AwaitFinished,
                Event::Message(
                    Handshake {
                        body: Body::Finished(finished),
                        ..
                    },
                    raw,
                ),
            ) => {
                session.check_finished(CLIENT_FINISHED, finished.verify_data)?;
                // Our Finished covers the client's.
                session.transcript.extend_from_slice(raw);
                Ok(State::SendServerFinished)
            }

            (State::SendServerFinished, Event::Flight) => {
                self.send_server_finished(session, ctx)
            }

            (state, event) => Err(unexpected(state, &event)),
        }
    }

    fn await_client_hello(
        self,
        session: &mut Session,
        ctx: &mut Context<'_>,
        hello: ClientHello,
    ) -> Result<Self, Error> {
        // Anything from TLS 1.2 up is answered with TLS 1.2.
        if hello.client_version.as_u16() < ProtocolVersion::TLS1_2.as_u16() {
            warn!("Client offered {:?}", hello.client_version);
            return Err(ProtocolError::BadProtocolVersion(hello.client_version).into());
        }
        if !hello.compression_methods.contains(&CompressionMethod::Null) {
            return Err(ProtocolError::IllegalParameter(
                "null compression not offered".to_string(),
            )
            .into());
        }

        // Our preference order decides.
        let suite = ctx
            .config
            .cipher_suites()
            .find(|cs| hello.cipher_suites.contains(&cs.suite()))
            .ok_or_else(|| {
                warn!("No common cipher suite in {:?}", hello.cipher_suites);
                ProtocolError::NoCommonCipherSuite
            })?;
        debug!("Selected {:?}", suite.suite());

        session.client_random = Some(hello.random);
        session.suite = Some(suite);
        session.version = Some(ProtocolVersion::TLS1_2);

        Ok(State::SendServerHello)
    }

    fn send_server_hello(
        self,
        session: &mut Session,
        ctx: &mut Context<'_>,
    ) -> Result<Self, Error> {
        let suite = session.suite()?;
        let random = Random::new(ctx.rng);
        session.server_random = Some(random);

        let group = ctx
            .config
            .crypto_provider()
            .supported_kx_groups()
            .next()
            .ok_or_else(|| Error::CryptoError("no key exchange group".to_string()))?;
        let kx = group.start(ctx.rng).map_err(Error::CryptoError)?;

        // Bounded by ConfigBuilder::build.
        let mut chain: ArrayVec<[&[u8]; MAX_CERTIFICATES]> = ArrayVec::new();
        for cert in ctx.config.certificate_chain() {
            chain.push(cert.as_slice());
        }

        let mut flight = Vec::new();
        let hello = ServerHello::new(ProtocolVersion::TLS1_2, random, suite.suite());
        session.push_message(&mut flight, Body::ServerHello(hello));
        session.push_message(&mut flight, Body::Certificate(Certificate::new(chain)));
        let ske = ServerKeyExchange::new(group.name(), kx.public_key());
        session.push_message(&mut flight, Body::ServerKeyExchange(ske));
        session.push_message(&mut flight, Body::ServerHelloDone);
        seal_flight(ctx.layer, &flight, None)?;

        session.kx = Some(kx);

        Ok(State::AwaitClientKeyExchange)
    }

    fn await_client_key_exchange(
        self,
        session: &mut Session,
        ctx: &mut Context<'_>,
        cke: ClientKeyExchange,
    ) -> Result<Self, Error> {
        session.peer_public = Buf::from_slice(cke.public_key);
        session.spawn_key_derivation(ctx, None)?;

        Ok(State::AwaitKeys)
    }

    fn send_server_finished(
        self,
        session: &mut Session,
        ctx: &mut Context<'_>,
    ) -> Result<Self, Error> {
        seal_change_cipher_spec(ctx.layer)?;
        ctx.layer.activate_tx()?;

        let verify_data = session.verify_data(SERVER_FINISHED)?;
        let mut flight = Vec::new();
        session.push_message(&mut flight, Body::Finished(Finished::new(&verify_data)));
        seal_flight(ctx.layer, &flight, Some(Completion::HandshakeFinished))?;

        debug!("Handshake complete");
        Ok(State::Complete)
    }
}
