//! TLS 1.2 handshake tests.

use std::sync::Arc;

use tlsengine::crypto::CertVerifier;
use tlsengine::{
    AlertDescription, CipherSuite, Config, Engine, Error, HandshakeStatus, OperationResult,
    OperationalState, ProtocolError, ProtocolVersion, Status,
};

use crate::common::*;

#[test]
fn handshake_completes() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = pair(config(1), config(2));
    handshake(&mut client, &mut server);

    // FINISHED is reported exactly once per side.
    assert_eq!(client.finished, 1);
    assert_eq!(server.finished, 1);

    for side in [&client, &server] {
        assert_eq!(side.engine.state(), OperationalState::Application);
        assert_eq!(side.engine.handshake_status(), HandshakeStatus::NotHandshaking);
        assert_eq!(
            side.engine.protocol_version(),
            Some(ProtocolVersion::TLS1_2)
        );
        assert_eq!(
            side.engine.cipher_suite(),
            Some(CipherSuite::ECDHE_RSA_AES128_GCM_SHA256)
        );
        assert!(!side.engine.is_inbound_done());
        assert!(!side.engine.is_outbound_done());
    }
}

#[test]
fn handshake_step_by_step() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = pair(config(3), config(4));
    assert_eq!(client.engine.handshake_status(), HandshakeStatus::NeedWrap);
    assert_eq!(server.engine.handshake_status(), HandshakeStatus::NeedUnwrap);

    // ClientHello
    let (res, hello) = wrap(&mut client.engine, b"ignored");
    assert_eq!(res.status(), Status::Ok);
    assert_eq!(res.handshake_status(), HandshakeStatus::NeedUnwrap);
    assert_eq!(res.bytes_consumed(), 0);
    assert_eq!(records(&hello), vec![(22, hello.len())]);

    let (res, _) = unwrap(&mut server.engine, &hello);
    assert_eq!(res.handshake_status(), HandshakeStatus::NeedWrap);
    assert_eq!(res.bytes_consumed(), hello.len());

    // ServerHello..ServerHelloDone
    let (res, flight) = wrap(&mut server.engine, &[]);
    assert_eq!(res.handshake_status(), HandshakeStatus::NeedUnwrap);

    let (res, _) = unwrap(&mut client.engine, &flight);
    assert_eq!(res.handshake_status(), HandshakeStatus::NeedTask);
    assert_eq!(res.bytes_consumed(), flight.len());
    assert_eq!(client.engine.protocol_version(), Some(ProtocolVersion::TLS1_2));

    // Nothing moves until the task ran.
    let (res, packet) = wrap(&mut client.engine, &[]);
    assert_eq!(res.handshake_status(), HandshakeStatus::NeedTask);
    assert!(packet.is_empty());

    let task = client.engine.delegated_task().expect("key derivation task");
    assert!(client.engine.delegated_task().is_none());
    std::thread::spawn(move || task.run()).join().unwrap();

    // ClientKeyExchange, ChangeCipherSpec, Finished
    let (res, flight) = wrap(&mut client.engine, &[]);
    assert_eq!(res.handshake_status(), HandshakeStatus::NeedUnwrap);
    let types: Vec<u8> = records(&flight).into_iter().map(|(t, _)| t).collect();
    assert_eq!(types, vec![22, 20, 22]);

    // The server stops after the ClientKeyExchange to derive its keys.
    let (res, _) = unwrap(&mut server.engine, &flight);
    assert_eq!(res.handshake_status(), HandshakeStatus::NeedTask);
    let cke_len = records(&flight)[0].1;
    assert_eq!(res.bytes_consumed(), cke_len);
    assert_eq!(run_tasks(&mut server.engine), 1);

    let rest = &flight[cke_len..];
    let (res, _) = unwrap(&mut server.engine, rest);
    assert_eq!(res.handshake_status(), HandshakeStatus::NeedWrap);
    assert_eq!(res.bytes_consumed(), rest.len());

    let (res, flight) = wrap(&mut server.engine, &[]);
    assert_eq!(res.handshake_status(), HandshakeStatus::Finished);
    assert_eq!(server.engine.state(), OperationalState::Application);

    let (res, _) = unwrap(&mut client.engine, &flight);
    assert_eq!(res.handshake_status(), HandshakeStatus::Finished);
    assert_eq!(res.bytes_consumed(), flight.len());
    assert_eq!(client.engine.state(), OperationalState::Application);
}

#[test]
fn task_finishes_while_engine_is_polled() {
    let _ = env_logger::try_init();

    for seed in (100..140).step_by(2) {
        let (mut client, mut server) = pair(config(seed), config(seed + 1));
        let (_, hello) = wrap(&mut client.engine, &[]);
        unwrap(&mut server.engine, &hello);
        let (_, flight) = wrap(&mut server.engine, &[]);
        let (res, _) = unwrap(&mut client.engine, &flight);
        assert_eq!(res.handshake_status(), HandshakeStatus::NeedTask);

        let task = client.engine.delegated_task().expect("key derivation task");
        let handle = std::thread::spawn(move || task.run());

        let stalled = OperationResult::new(Status::Ok, HandshakeStatus::NeedTask, 0, 0);
        let (res, flight) = loop {
            let (res, packet) = wrap(&mut client.engine, &[]);
            if res != stalled {
                break (res, packet);
            }
            std::thread::yield_now();
        };
        handle.join().unwrap();

        assert_eq!(res.status(), Status::Ok);
        assert_eq!(res.handshake_status(), HandshakeStatus::NeedUnwrap);
        assert!(!flight.is_empty());

        server.inbox = flight;
        handshake(&mut client, &mut server);
        assert_eq!(client.engine.state(), OperationalState::Application);
        assert_eq!(server.engine.state(), OperationalState::Application);
    }
}

#[test]
fn server_preference_wins() {
    let _ = env_logger::try_init();

    let client_config = config_with_suites(
        5,
        &[
            CipherSuite::ECDHE_RSA_AES128_GCM_SHA256,
            CipherSuite::ECDHE_RSA_AES256_GCM_SHA384,
        ],
    );
    let server_config = config_with_suites(
        6,
        &[
            CipherSuite::ECDHE_RSA_AES256_GCM_SHA384,
            CipherSuite::ECDHE_RSA_AES128_GCM_SHA256,
        ],
    );

    let (mut client, mut server) = pair(client_config, server_config);
    handshake(&mut client, &mut server);

    assert_eq!(
        client.engine.cipher_suite(),
        Some(CipherSuite::ECDHE_RSA_AES256_GCM_SHA384)
    );
    assert_eq!(
        server.engine.cipher_suite(),
        Some(CipherSuite::ECDHE_RSA_AES256_GCM_SHA384)
    );

    // Keys derived with SHA-384 still carry data.
    assert_eq!(transfer(&mut client, &mut server, b"ping"), b"ping");
}

#[test]
fn no_common_cipher_suite() {
    let _ = env_logger::try_init();

    let client_config = config_with_suites(7, &[CipherSuite::ECDHE_RSA_AES128_GCM_SHA256]);
    let server_config = config_with_suites(8, &[CipherSuite::ECDHE_RSA_AES256_GCM_SHA384]);
    let (mut client, mut server) = pair(client_config, server_config);

    let (_, hello) = wrap(&mut client.engine, &[]);
    let mut app = vec![0; 64];
    let err = server.engine.unwrap(&hello, &mut app).unwrap_err();
    assert_eq!(err, Error::Protocol(ProtocolError::NoCommonCipherSuite));
    assert_eq!(server.engine.state(), OperationalState::Closed);

    // handshake_failure goes out in the clear.
    assert_eq!(server.engine.handshake_status(), HandshakeStatus::NeedWrap);
    let (res, alert) = wrap(&mut server.engine, &[]);
    assert_eq!(res.status(), Status::Closed);
    assert_eq!(alert, vec![21, 3, 3, 0, 2, 2, 40]);

    let err = client.engine.unwrap(&alert, &mut app).unwrap_err();
    assert_eq!(err, Error::PeerAlert(AlertDescription::HandshakeFailure));
    assert_eq!(client.engine.state(), OperationalState::Closed);
}

#[test]
fn peer_certificates_reach_client() {
    let _ = env_logger::try_init();

    let chain = vec![b"leaf certificate".to_vec(), b"root certificate".to_vec()];
    let server_config = Arc::new(
        Config::builder()
            .rng_seed(10)
            .certificate_chain(chain.clone())
            .build()
            .unwrap(),
    );

    let (mut client, mut server) = pair(config(9), server_config);
    handshake(&mut client, &mut server);

    assert_eq!(client.engine.peer_certificates(), chain.as_slice());
    assert!(server.engine.peer_certificates().is_empty());
}

#[derive(Debug)]
struct RejectAll;

impl CertVerifier for RejectAll {
    fn verify_certificate(&self, _chain: &[Vec<u8>]) -> Result<(), String> {
        Err("untrusted".to_string())
    }
}

#[test]
fn rejected_certificate_fails_client() {
    let _ = env_logger::try_init();

    let client_config = Arc::new(
        Config::builder()
            .rng_seed(11)
            .cert_verifier(Arc::new(RejectAll))
            .build()
            .unwrap(),
    );
    let (mut client, mut server) = pair(client_config, config(12));

    let (_, hello) = wrap(&mut client.engine, &[]);
    unwrap(&mut server.engine, &hello);
    let (_, flight) = wrap(&mut server.engine, &[]);
    let (res, _) = unwrap(&mut client.engine, &flight);
    assert_eq!(res.handshake_status(), HandshakeStatus::NeedTask);
    assert_eq!(run_tasks(&mut client.engine), 1);

    // The task outcome surfaces on the next call.
    let mut packet = vec![0; client.engine.packet_buffer_size()];
    let err = client.engine.wrap(&[], &mut packet).unwrap_err();
    assert_eq!(err, Error::CertificateError("untrusted".to_string()));

    let res = client.engine.wrap(&[], &mut packet).unwrap();
    assert_eq!(res.status(), Status::Closed);
    assert_eq!(&packet[..res.bytes_produced()], &[21, 3, 3, 0, 2, 2, 42]);

    let mut app = vec![0; 64];
    let err = server
        .engine
        .unwrap(&packet[..res.bytes_produced()], &mut app)
        .unwrap_err();
    assert_eq!(err, Error::PeerAlert(AlertDescription::BadCertificate));
}

#[test]
fn flight_split_across_records() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = pair(config(13), config(14));
    let (_, hello) = wrap(&mut client.engine, &[]);
    unwrap(&mut server.engine, &hello);
    let (_, flight) = wrap(&mut server.engine, &[]);
    assert_eq!(records(&flight).len(), 1);

    // Re-frame the server flight as three records with arbitrary cuts.
    let payload = &flight[5..];
    let cuts = [0, 3, payload.len() / 2, payload.len()];
    let mut reframed = Vec::new();
    for w in cuts.windows(2) {
        let chunk = &payload[w[0]..w[1]];
        reframed.extend_from_slice(&[22, 3, 3]);
        reframed.extend_from_slice(&(chunk.len() as u16).to_be_bytes());
        reframed.extend_from_slice(chunk);
    }

    // Fed one byte short, the last record is left for later.
    let short = &reframed[..reframed.len() - 1];
    let (res, _) = unwrap(&mut client.engine, short);
    assert_eq!(res.status(), Status::Ok);
    assert_eq!(res.handshake_status(), HandshakeStatus::NeedUnwrap);
    let consumed = res.bytes_consumed();
    assert!(consumed > 0 && consumed < reframed.len());

    let (res, _) = unwrap(&mut client.engine, &reframed[consumed..]);
    assert_eq!(res.handshake_status(), HandshakeStatus::NeedTask);
    assert_eq!(consumed + res.bytes_consumed(), reframed.len());

    handshake(&mut client, &mut server);
    assert_eq!(client.finished, 1);
    assert_eq!(server.finished, 1);
    assert_eq!(client.engine.state(), OperationalState::Application);
}

#[test]
fn begin_handshake_after_completion() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = connected(15);
    assert_eq!(
        client.engine.begin_handshake(),
        Err(Error::Protocol(ProtocolError::Renegotiation))
    );

    // Refusing renegotiation does not disturb the connection.
    assert_eq!(client.engine.state(), OperationalState::Application);
    assert_eq!(transfer(&mut client, &mut server, b"still here"), b"still here");
}

#[test]
fn tls10_client_hello_rejected() {
    let _ = env_logger::try_init();

    let mut server = Engine::server(config(16));
    server.begin_handshake().unwrap();

    // ClientHello { version: 3.1, random, no session, one suite, null compression }
    let mut body = vec![3, 1];
    body.extend_from_slice(&[7; 32]);
    body.push(0);
    body.extend_from_slice(&[0, 2, 0xC0, 0x2F]);
    body.extend_from_slice(&[1, 0]);

    let mut message = vec![1, 0, 0, body.len() as u8];
    message.extend_from_slice(&body);

    let mut record = vec![22, 3, 1, 0, message.len() as u8];
    record.extend_from_slice(&message);

    let mut app = vec![0; 64];
    let err = server.unwrap(&record, &mut app).unwrap_err();
    assert_eq!(
        err,
        Error::Protocol(ProtocolError::BadProtocolVersion(ProtocolVersion::TLS1_0))
    );

    let (res, alert) = wrap(&mut server, &[]);
    assert_eq!(res.status(), Status::Closed);
    assert_eq!(alert, vec![21, 3, 3, 0, 2, 2, 70]);
}
