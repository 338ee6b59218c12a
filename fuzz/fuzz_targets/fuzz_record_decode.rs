#![no_main]

//! Fuzz target for TLS record decoding and the server handshake.
//!
//! TLS 1.2 record format:
//! - ContentType: 1 byte (20-23 valid values)
//! - ProtocolVersion: 2 bytes (0x0303 for TLS 1.2)
//! - Length: 2 bytes
//! - Fragment: variable (up to 2^14 bytes of plaintext)

use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

use tlsengine::{Config, Decoded, Engine, Record};

const HEADER_LEN: usize = 5;
const MAX_FRAGMENT_SIZE: usize = 16384;

fuzz_target!(|data: &[u8]| {
    // Every decoded record must lie within the input.
    let mut rest = data;
    while let Ok(Decoded::Record(record, n)) = Record::decode(rest) {
        assert!(n <= rest.len());
        assert_eq!(n, HEADER_LEN + record.payload.len());
        rest = &rest[n..];
    }

    let config = Arc::new(Config::builder().rng_seed(0).build().unwrap());
    let mut server = Engine::server(config);
    server.begin_handshake().unwrap();

    let mut app = vec![0; server.application_buffer_size()];
    let mut packet = vec![0; server.packet_buffer_size()];

    // Test the input as-is.
    if let Ok(res) = server.unwrap(data, &mut app) {
        assert!(res.bytes_consumed() <= data.len());
    }
    let _ = server.wrap(&[], &mut packet);

    // Also as the payload of a handshake record.
    if !data.is_empty() {
        let frag_len = data.len().min(MAX_FRAGMENT_SIZE);

        let mut record = Vec::with_capacity(HEADER_LEN + frag_len);
        record.push(22u8); // ContentType::Handshake
        record.extend_from_slice(&[0x03, 0x03]); // TLS 1.2
        record.extend_from_slice(&(frag_len as u16).to_be_bytes());
        record.extend_from_slice(&data[..frag_len]);

        let mut server = Engine::server(Arc::new(Config::default()));
        server.begin_handshake().unwrap();
        let _ = server.unwrap(&record, &mut app);
        let _ = server.wrap(&[], &mut packet);
    }
});
