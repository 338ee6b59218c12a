//! Application data tests.

use std::sync::Arc;

use tlsengine::{Config, Engine, HandshakeStatus, Status, MAX_FRAGMENT_LENGTH};

use crate::common::*;

#[test]
fn data_both_directions() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = connected(40);

    assert_eq!(transfer(&mut client, &mut server, b"hello server"), b"hello server");
    assert_eq!(transfer(&mut server, &mut client, b"hello client"), b"hello client");

    for i in 0..10u8 {
        let msg = vec![i; 100 + i as usize];
        assert_eq!(transfer(&mut client, &mut server, &msg), msg);
    }
}

#[test]
fn large_write_is_fragmented() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = connected(42);
    let data: Vec<u8> = (0..40_000u32).map(|i| i as u8).collect();

    let (res, packet) = wrap(&mut client.engine, &data);
    assert_eq!(res.status(), Status::Ok);
    assert_eq!(res.handshake_status(), HandshakeStatus::NotHandshaking);
    assert_eq!(res.bytes_consumed(), MAX_FRAGMENT_LENGTH);
    assert_eq!(packet.len(), 5 + MAX_FRAGMENT_LENGTH + GCM_OVERHEAD);

    let (_, first) = unwrap(&mut server.engine, &packet);
    assert_eq!(first, &data[..MAX_FRAGMENT_LENGTH]);

    let rest = transfer(&mut client, &mut server, &data[MAX_FRAGMENT_LENGTH..]);
    assert_eq!(rest, &data[MAX_FRAGMENT_LENGTH..]);
}

#[test]
fn configured_fragment_length() {
    let _ = env_logger::try_init();

    let client_config = Arc::new(
        Config::builder()
            .rng_seed(44)
            .max_fragment_length(1024)
            .build()
            .unwrap(),
    );
    let (mut client, mut server) = pair(client_config, config(45));
    handshake(&mut client, &mut server);

    let data = vec![0x5A; 4000];
    let mut sealed = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        let (res, packet) = wrap(&mut client.engine, &data[offset..]);
        assert!(res.bytes_consumed() <= 1024);
        offset += res.bytes_consumed();
        sealed.extend_from_slice(&packet);
    }

    let lens: Vec<usize> = records(&sealed).into_iter().map(|(_, len)| len).collect();
    let overhead = 5 + GCM_OVERHEAD;
    assert_eq!(
        lens,
        vec![1024 + overhead, 1024 + overhead, 1024 + overhead, 928 + overhead]
    );

    server.inbox = sealed;
    let mut out = Vec::new();
    while !server.inbox.is_empty() {
        let (res, plain) = unwrap(&mut server.engine, &server.inbox);
        server.inbox.drain(..res.bytes_consumed());
        out.extend_from_slice(&plain);
    }
    assert_eq!(out, data);
}

#[test]
fn empty_wrap_produces_nothing() {
    let _ = env_logger::try_init();

    let (mut client, _server) = connected(46);
    let (res, packet) = wrap(&mut client.engine, &[]);
    assert_eq!(res.status(), Status::Ok);
    assert_eq!(res.bytes_consumed(), 0);
    assert!(packet.is_empty());
}

#[test]
fn wrap_overflow_consumes_nothing() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = connected(48);
    let needed = 5 + 5 + GCM_OVERHEAD;

    let mut dst = vec![0; needed - 1];
    let res = client.engine.wrap(b"hello", &mut dst).unwrap();
    assert_eq!(res.status(), Status::BufferOverflow);
    assert_eq!(res.bytes_consumed(), 0);
    assert_eq!(res.bytes_produced(), 0);

    let mut dst = vec![0; needed];
    let res = client.engine.wrap(b"hello", &mut dst).unwrap();
    assert_eq!(res.status(), Status::Ok);
    assert_eq!(res.bytes_consumed(), 5);
    assert_eq!(res.bytes_produced(), needed);

    let (_, plain) = unwrap(&mut server.engine, &dst);
    assert_eq!(plain, b"hello");
}

#[test]
fn unwrap_overflow_consumes_nothing() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = connected(50);
    let (_, packet) = wrap(&mut client.engine, &[7; 300]);

    let mut small = vec![0; 299];
    let res = server.engine.unwrap(&packet, &mut small).unwrap();
    assert_eq!(res.status(), Status::BufferOverflow);
    assert_eq!(res.bytes_consumed(), 0);
    assert_eq!(res.bytes_produced(), 0);

    let mut exact = vec![0; 300];
    let res = server.engine.unwrap(&packet, &mut exact).unwrap();
    assert_eq!(res.status(), Status::Ok);
    assert_eq!(res.bytes_consumed(), packet.len());
    assert_eq!(res.bytes_produced(), 300);
    assert_eq!(exact, vec![7; 300]);
}

#[test]
fn one_record_per_unwrap() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = connected(52);
    let (_, first) = wrap(&mut client.engine, b"first");
    let (_, second) = wrap(&mut client.engine, b"second");

    let mut both = first.clone();
    both.extend_from_slice(&second);

    let (res, plain) = unwrap(&mut server.engine, &both);
    assert_eq!(res.bytes_consumed(), first.len());
    assert_eq!(plain, b"first");

    let (res, plain) = unwrap(&mut server.engine, &both[first.len()..]);
    assert_eq!(res.bytes_consumed(), second.len());
    assert_eq!(plain, b"second");
}

#[test]
fn partial_record_underflows() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = connected(54);
    let (_, packet) = wrap(&mut client.engine, b"split me");

    for cut in [0, 3, 5, packet.len() - 1] {
        let (res, plain) = unwrap(&mut server.engine, &packet[..cut]);
        assert_eq!(res.status(), Status::BufferUnderflow);
        assert_eq!(res.bytes_consumed(), 0);
        assert!(plain.is_empty());
    }

    let (res, plain) = unwrap(&mut server.engine, &packet);
    assert_eq!(res.status(), Status::Ok);
    assert_eq!(plain, b"split me");
}

#[test]
fn buffer_sizes_fit_largest_record() {
    let engine = Engine::client(config(56));
    assert!(engine.packet_buffer_size() >= 5 + MAX_FRAGMENT_LENGTH + GCM_OVERHEAD);
    assert_eq!(engine.application_buffer_size(), MAX_FRAGMENT_LENGTH);
}
