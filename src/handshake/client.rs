use tinyvec::ArrayVec;

use super::{seal_change_cipher_spec, seal_flight, unexpected, Context, Event, Session};
use crate::buffer::Buf;
use crate::crypto::{CLIENT_FINISHED, SERVER_FINISHED};
use crate::message::{
    Body, Certificate, CipherSuite, ClientHello, ClientKeyExchange, CompressionMethod, Finished,
    Handshake, ProtocolVersion, Random, ServerHello, ServerKeyExchange, MAX_CIPHER_SUITES,
};
use crate::{Error, ProtocolError, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum State {
    SendClientHello,
    AwaitServerHello,
    AwaitCertificate,
    AwaitServerKeyExchange,
    AwaitServerHelloDone,
    AwaitKeys,
    SendClientFinished,
    AwaitChangeCipherSpec,
    AwaitFinished,
    Complete,
}

impl State {
    pub(super) fn wants_wrap(&self) -> bool {
        matches!(self, State::SendClientHello | State::SendClientFinished)
    }

    pub(super) fn awaits_message(&self) -> bool {
        matches!(
            self,
            State::AwaitServerHello
                | State::AwaitCertificate
                | State::AwaitServerKeyExchange
                | State::AwaitServerHelloDone
                | State::AwaitFinished
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
            (State::SendClientHello, Event::Flight) => self.send_client_hello(session, ctx),

            (
                State::AwaitServerHello,
                Event::Message(
                    Handshake {
                        body: Body::ServerHello(hello),
                        ..
                    },
                    _,
                ),
            ) => self.await_server_hello(session, ctx, hello),

            (
                State::AwaitCertificate,
                Event::Message(
                    Handshake {
                        body: Body::Certificate(certificate),
                        ..
                    },
                    _,
                ),
            ) => self.await_certificate(session, certificate),

            (
                State::AwaitServerKeyExchange,
                Event::Message(
                    Handshake {
                        body: Body::ServerKeyExchange(ske),
                        ..
                    },
                    _,
                ),
            ) => self.await_server_key_exchange(session, ctx, ske),

            (
                State::AwaitServerHelloDone,
                Event::Message(
                    Handshake {
                        body: Body::ServerHelloDone,
                        ..
                    },
                    _,
                ),
            ) => self.await_server_hello_done(session, ctx),

            (State::AwaitKeys, Event::KeysReady(keys)) => {
                session.install_keys(ctx, keys, Role::Client)?;
                Ok(State::SendClientFinished)
            }

            (State::SendClientFinished, Event::Flight) => {
                self.send_client_finished(session, ctx)
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
                session.check_finished(SERVER_FINISHED, finished.verify_data)?;
                session.transcript.extend_from_slice(raw);
                debug!("Handshake complete");
                Ok(State::Complete)
            }

            (state, event) => Err(unexpected(state, &event)),
        }
    }

    fn send_client_hello(
        self,
        session: &mut Session,
        ctx: &mut Context<'_>,
    ) -> Result<Self, Error> {
        let random = Random::new(ctx.rng);
        session.client_random = Some(random);

        // Bounded by ConfigBuilder::build.
        let mut suites: ArrayVec<[CipherSuite; MAX_CIPHER_SUITES]> = ArrayVec::new();
        suites.extend(ctx.config.cipher_suites().map(|cs| cs.suite()));
        debug!("Offer cipher suites {:?}", suites);

        let mut flight = Vec::new();
        let hello = ClientHello::new(ProtocolVersion::TLS1_2, random, suites);
        session.push_message(&mut flight, Body::ClientHello(hello));
        seal_flight(ctx.layer, &flight, None)?;

        Ok(State::AwaitServerHello)
    }

    fn await_server_hello(
        self,
        session: &mut Session,
        ctx: &mut Context<'_>,
        hello: ServerHello,
    ) -> Result<Self, Error> {
        if hello.server_version != ProtocolVersion::TLS1_2 {
            return Err(ProtocolError::BadProtocolVersion(hello.server_version).into());
        }
        if hello.compression_method != CompressionMethod::Null {
            return Err(ProtocolError::IllegalParameter(format!(
                "compression {:?}",
                hello.compression_method
            ))
            .into());
        }

        // The server may only pick a suite we offered.
        let suite = ctx
            .config
            .cipher_suites()
            .find(|cs| cs.suite() == hello.cipher_suite)
            .ok_or(ProtocolError::NoCommonCipherSuite)?;
        debug!("Server selected {:?}", suite.suite());

        session.server_random = Some(hello.random);
        session.suite = Some(suite);
        session.version = Some(ProtocolVersion::TLS1_2);

        Ok(State::AwaitCertificate)
    }

    fn await_certificate(
        self,
        session: &mut Session,
        certificate: Certificate,
    ) -> Result<Self, Error> {
        session.peer_certificates = certificate
            .certificate_list
            .iter()
            .map(|cert| cert.to_vec())
            .collect();
        trace!(
            "Server chain of {} certificates",
            session.peer_certificates.len()
        );

        Ok(State::AwaitServerKeyExchange)
    }

    fn await_server_key_exchange(
        self,
        session: &mut Session,
        ctx: &mut Context<'_>,
        ske: ServerKeyExchange,
    ) -> Result<Self, Error> {
        let group = ctx
            .config
            .crypto_provider()
            .find_kx_group(ske.named_group)
            .ok_or_else(|| {
                ProtocolError::IllegalParameter(format!("named group {:?}", ske.named_group))
            })?;

        let kx = group.start(ctx.rng).map_err(Error::CryptoError)?;
        session.own_public = Buf::from_slice(kx.public_key());
        session.peer_public = Buf::from_slice(ske.public_key);
        session.kx = Some(kx);

        Ok(State::AwaitServerHelloDone)
    }

    fn await_server_hello_done(
        self,
        session: &mut Session,
        ctx: &mut Context<'_>,
    ) -> Result<Self, Error> {
        let verifier = ctx.config.cert_verifier().clone();
        session.spawn_key_derivation(ctx, Some(verifier))?;

        Ok(State::AwaitKeys)
    }

    fn send_client_finished(
        self,
        session: &mut Session,
        ctx: &mut Context<'_>,
    ) -> Result<Self, Error> {
        let own_public = std::mem::take(&mut session.own_public);

        let mut flight = Vec::new();
        let cke = ClientKeyExchange::new(&own_public);
        session.push_message(&mut flight, Body::ClientKeyExchange(cke));
        seal_flight(ctx.layer, &flight, None)?;

        seal_change_cipher_spec(ctx.layer)?;
        ctx.layer.activate_tx()?;

        let verify_data = session.verify_data(CLIENT_FINISHED)?;
        let mut flight = Vec::new();
        session.push_message(&mut flight, Body::Finished(Finished::new(&verify_data)));
        seal_flight(ctx.layer, &flight, None)?;

        Ok(State::AwaitChangeCipherSpec)
    }
}
