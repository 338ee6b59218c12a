//! Shared helpers for TLS 1.2 engine tests.

#![allow(unused)]

use std::sync::Arc;

use tlsengine::{
    CipherSuite, Config, Engine, HandshakeStatus, OperationResult, OperationalState, Status,
};

/// Record overhead of the AES-GCM suites: explicit nonce plus tag.
pub const GCM_OVERHEAD: usize = 8 + 16;

/// Length of a protected alert record.
pub const PROTECTED_ALERT_LEN: usize = 5 + 2 + GCM_OVERHEAD;

/// One end of a connection plus the bytes it has not consumed yet.
#[derive(Debug)]
pub struct Side {
    pub engine: Engine,
    pub inbox: Vec<u8>,
    pub received: Vec<u8>,
    pub finished: usize,
}

impl Side {
    pub fn new(engine: Engine) -> Self {
        Side {
            engine,
            inbox: Vec::new(),
            received: Vec::new(),
            finished: 0,
        }
    }

    fn note(&mut self, res: &OperationResult) {
        if res.handshake_status() == HandshakeStatus::Finished {
            self.finished += 1;
        }
    }
}

pub fn config(seed: u64) -> Arc<Config> {
    Arc::new(Config::builder().rng_seed(seed).build().expect("config"))
}

pub fn config_with_suites(seed: u64, suites: &[CipherSuite]) -> Arc<Config> {
    Arc::new(
        Config::builder()
            .rng_seed(seed)
            .cipher_suites(suites)
            .build()
            .expect("config"),
    )
}

/// Client and server engines with the handshake begun.
pub fn pair(client_config: Arc<Config>, server_config: Arc<Config>) -> (Side, Side) {
    let mut client = Engine::client(client_config);
    let mut server = Engine::server(server_config);
    client.begin_handshake().expect("client begin");
    server.begin_handshake().expect("server begin");
    (Side::new(client), Side::new(server))
}

/// Run every delegated task on this thread. Returns how many ran.
pub fn run_tasks(engine: &mut Engine) -> usize {
    let mut n = 0;
    while let Some(task) = engine.delegated_task() {
        task.run();
        n += 1;
    }
    n
}

/// Wrap once into a fresh packet buffer.
pub fn wrap(engine: &mut Engine, src: &[u8]) -> (OperationResult, Vec<u8>) {
    let mut packet = vec![0; engine.packet_buffer_size()];
    let res = engine.wrap(src, &mut packet).expect("wrap");
    packet.truncate(res.bytes_produced());
    (res, packet)
}

/// Unwrap once into a fresh application buffer.
pub fn unwrap(engine: &mut Engine, src: &[u8]) -> (OperationResult, Vec<u8>) {
    let mut app = vec![0; engine.application_buffer_size()];
    let res = engine.unwrap(src, &mut app).expect("unwrap");
    app.truncate(res.bytes_produced());
    (res, app)
}

/// Let `me` run its tasks, wrap for `peer` and unwrap what `peer` sent.
///
/// Returns whether anything moved.
pub fn pump(me: &mut Side, peer: &mut Side) -> bool {
    let mut progressed = run_tasks(&mut me.engine) > 0;

    let (res, packet) = wrap(&mut me.engine, &[]);
    me.note(&res);
    if !packet.is_empty() {
        peer.inbox.extend_from_slice(&packet);
        progressed = true;
    }

    while !me.inbox.is_empty() {
        let (res, app) = unwrap(&mut me.engine, &me.inbox);
        me.note(&res);
        me.received.extend_from_slice(&app);
        me.inbox.drain(..res.bytes_consumed());
        if res.bytes_consumed() == 0 {
            break;
        }
        progressed = true;
    }

    progressed
}

/// Drive both sides until the handshake is complete on both.
pub fn handshake(client: &mut Side, server: &mut Side) {
    for _ in 0..32 {
        let a = pump(client, server);
        let b = pump(server, client);

        let done = client.engine.state() == OperationalState::Application
            && server.engine.state() == OperationalState::Application
            && client.inbox.is_empty()
            && server.inbox.is_empty();
        if done {
            return;
        }
        assert!(a || b, "handshake stalled: {:?} {:?}", client, server);
    }
    panic!("handshake did not complete");
}

/// A connected client and server.
pub fn connected(seed: u64) -> (Side, Side) {
    let (mut client, mut server) = pair(config(seed), config(seed + 1));
    handshake(&mut client, &mut server);
    (client, server)
}

/// Seal `data` at `from` and open it at `to`, returning the plaintext.
pub fn transfer(from: &mut Side, to: &mut Side, data: &[u8]) -> Vec<u8> {
    let mut offset = 0;
    while offset < data.len() {
        let (res, packet) = wrap(&mut from.engine, &data[offset..]);
        assert_eq!(res.status(), Status::Ok);
        offset += res.bytes_consumed();
        to.inbox.extend_from_slice(&packet);
    }

    let mut out = Vec::new();
    while !to.inbox.is_empty() {
        let (res, app) = unwrap(&mut to.engine, &to.inbox);
        assert_eq!(res.status(), Status::Ok);
        to.inbox.drain(..res.bytes_consumed());
        out.extend_from_slice(&app);
    }
    out
}

/// Split the records in `bytes` into `(content_type, record_len)` pairs.
pub fn records(bytes: &[u8]) -> Vec<(u8, usize)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i + 5 <= bytes.len() {
        let len = u16::from_be_bytes([bytes[i + 3], bytes[i + 4]]) as usize;
        out.push((bytes[i], 5 + len));
        i += 5 + len;
    }
    out
}
