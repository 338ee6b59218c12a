//! close_notify exchange tests.

use tlsengine::{Error, HandshakeStatus, OperationResult, OperationalState, Status};

use crate::common::*;

fn closed(produced: usize, consumed: usize, hs: HandshakeStatus) -> OperationResult {
    OperationResult::new(Status::Closed, hs, produced, consumed)
}

#[test]
fn orderly_close_initiated_by_client() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = connected(20);
    let l = PROTECTED_ALERT_LEN;

    client.engine.close_outbound();
    client.engine.close_outbound();
    assert_eq!(client.engine.state(), OperationalState::Closing);
    assert_eq!(client.engine.handshake_status(), HandshakeStatus::NeedWrap);
    assert!(!client.engine.is_outbound_done());

    // One byte short of the close_notify record.
    let mut dst = vec![0; l - 1];
    let res = client.engine.wrap(&[], &mut dst).unwrap();
    assert_eq!(res.status(), Status::BufferOverflow);
    assert_eq!(res.bytes_produced(), 0);
    assert!(!client.engine.is_outbound_done());

    let mut dst = vec![0; l];
    let res = client.engine.wrap(&[], &mut dst).unwrap();
    assert_eq!(res, closed(l, 0, HandshakeStatus::NeedUnwrap));
    assert!(client.engine.is_outbound_done());
    assert!(!client.engine.is_inbound_done());
    let notify = dst;

    // Nothing more to send, but the peer's close_notify is still owed.
    let res = client.engine.wrap(&[], &mut [0; 64]).unwrap();
    assert_eq!(res, closed(0, 0, HandshakeStatus::NeedUnwrap));

    // The responder does not need room to read a close_notify.
    let res = server.engine.unwrap(&notify, &mut []).unwrap();
    assert_eq!(res, closed(0, l, HandshakeStatus::NeedWrap));
    assert!(server.engine.is_inbound_done());
    assert!(!server.engine.is_outbound_done());

    let mut dst = vec![0; server.engine.packet_buffer_size()];
    let res = server.engine.wrap(&[], &mut dst).unwrap();
    assert_eq!(res, closed(l, 0, HandshakeStatus::NotHandshaking));
    assert_eq!(server.engine.state(), OperationalState::Closed);
    let reply = dst[..l].to_vec();

    let res = client.engine.unwrap(&reply, &mut []).unwrap();
    assert_eq!(res, closed(0, l, HandshakeStatus::NotHandshaking));
    assert_eq!(client.engine.state(), OperationalState::Closed);

    // Both engines are done for good and leave buffers alone.
    for side in [&mut client, &mut server] {
        let mut dst = [0xAA; 64];
        assert_eq!(
            side.engine.wrap(b"late", &mut dst).unwrap(),
            closed(0, 0, HandshakeStatus::NotHandshaking)
        );
        assert_eq!(
            side.engine.unwrap(&reply, &mut dst).unwrap(),
            closed(0, 0, HandshakeStatus::NotHandshaking)
        );
        assert_eq!(dst, [0xAA; 64]);
        assert!(side.engine.is_inbound_done());
        assert!(side.engine.is_outbound_done());
        side.engine.close_outbound();
        assert_eq!(side.engine.close_inbound(), Ok(()));
    }
}

#[test]
fn not_handshaking_only_when_fully_closed() {
    let _ = env_logger::try_init();

    let (mut client, _server) = connected(22);
    client.engine.close_outbound();

    for _ in 0..4 {
        let (res, _) = wrap(&mut client.engine, &[]);
        assert_eq!(res.status(), Status::Closed);
        assert_ne!(res.handshake_status(), HandshakeStatus::NotHandshaking);
        assert_ne!(
            client.engine.handshake_status(),
            HandshakeStatus::NotHandshaking
        );
    }
}

#[test]
fn data_in_flight_survives_close_outbound() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = connected(24);

    let (_, data) = wrap(&mut server.engine, b"last words");
    client.engine.close_outbound();

    // src is ignored once closing.
    let (res, notify) = wrap(&mut client.engine, b"more");
    assert_eq!(res.bytes_consumed(), 0);
    assert_eq!(res.bytes_produced(), PROTECTED_ALERT_LEN);

    let (res, plain) = unwrap(&mut client.engine, &data);
    assert_eq!(res.status(), Status::Ok);
    assert_eq!(res.handshake_status(), HandshakeStatus::NeedUnwrap);
    assert_eq!(plain, b"last words");

    let (res, _) = unwrap(&mut server.engine, &notify);
    assert_eq!(res.status(), Status::Closed);
}

#[test]
fn close_during_handshake() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = pair(config(26), config(27));
    let (_, hello) = wrap(&mut client.engine, &[]);
    unwrap(&mut server.engine, &hello);
    let (_, _flight) = wrap(&mut server.engine, &[]);

    client.engine.close_outbound();
    assert_eq!(client.engine.state(), OperationalState::Closing);

    // No keys yet, so the close_notify is in the clear.
    let (res, notify) = wrap(&mut client.engine, &[]);
    assert_eq!(res, closed(7, 0, HandshakeStatus::NeedUnwrap));
    assert_eq!(notify, vec![21, 3, 3, 0, 2, 1, 0]);

    let (res, _) = unwrap(&mut server.engine, &notify);
    assert_eq!(res, closed(0, 7, HandshakeStatus::NeedWrap));
    assert_eq!(server.engine.state(), OperationalState::Closing);

    let (res, reply) = wrap(&mut server.engine, &[]);
    assert_eq!(res, closed(7, 0, HandshakeStatus::NotHandshaking));
    assert_eq!(reply, vec![21, 3, 3, 0, 2, 1, 0]);

    let (res, _) = unwrap(&mut client.engine, &reply);
    assert_eq!(res, closed(0, 7, HandshakeStatus::NotHandshaking));
    assert_eq!(client.engine.state(), OperationalState::Closed);
    assert_eq!(server.engine.state(), OperationalState::Closed);
}

#[test]
fn close_inbound_without_notify() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = connected(28);

    assert_eq!(server.engine.close_inbound(), Err(Error::InboundTruncated));
    assert!(server.engine.is_inbound_done());
    assert_eq!(server.engine.handshake_status(), HandshakeStatus::NeedWrap);

    let (res, notify) = wrap(&mut server.engine, &[]);
    assert_eq!(
        res,
        closed(PROTECTED_ALERT_LEN, 0, HandshakeStatus::NotHandshaking)
    );
    assert_eq!(server.engine.state(), OperationalState::Closed);

    let (res, _) = unwrap(&mut client.engine, &notify);
    assert_eq!(
        res,
        closed(0, PROTECTED_ALERT_LEN, HandshakeStatus::NeedWrap)
    );

    let (res, _) = wrap(&mut client.engine, &[]);
    assert_eq!(
        res,
        closed(PROTECTED_ALERT_LEN, 0, HandshakeStatus::NotHandshaking)
    );
    assert_eq!(client.engine.state(), OperationalState::Closed);
}

#[test]
fn close_inbound_after_notify() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = connected(30);

    server.engine.close_outbound();
    let (_, notify) = wrap(&mut server.engine, &[]);
    unwrap(&mut client.engine, &notify);

    assert_eq!(client.engine.close_inbound(), Ok(()));
    assert_eq!(client.engine.handshake_status(), HandshakeStatus::NeedWrap);
}

#[test]
fn ciphertext_after_inbound_closed() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = connected(32);

    let (_, data) = wrap(&mut server.engine, b"too late");
    assert_eq!(client.engine.close_inbound(), Err(Error::InboundTruncated));

    let mut app = vec![0; 64];
    assert_eq!(
        client.engine.unwrap(&data, &mut app),
        Err(Error::InboundClosed)
    );

    // Empty input is a no-op, and the engine still owes its close_notify.
    let res = client.engine.unwrap(&[], &mut app).unwrap();
    assert_eq!(res, closed(0, 0, HandshakeStatus::NeedWrap));

    let (res, _) = wrap(&mut client.engine, &[]);
    assert_eq!(
        res,
        closed(PROTECTED_ALERT_LEN, 0, HandshakeStatus::NotHandshaking)
    );
}
