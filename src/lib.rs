//! Sans-IO TLS 1.2 engine.
//!
//! An [`Engine`] performs the TLS 1.2 handshake, application data
//! protection and the close_notify exchange by reading and writing caller
//! supplied buffers. It owns no socket and no thread. Expensive handshake
//! steps are handed out as [`DelegatedTask`]s.
//!
//! ```
//! use std::sync::Arc;
//! use tlsengine::{Config, Engine, Status};
//!
//! let config = Arc::new(Config::default());
//! let mut client = Engine::client(config.clone());
//! let mut server = Engine::server(config);
//! client.begin_handshake().unwrap();
//! server.begin_handshake().unwrap();
//!
//! // Move bytes between the two with wrap/unwrap until both report
//! // HandshakeStatus::Finished, running delegated tasks on NeedTask.
//! let mut packet = vec![0; client.packet_buffer_size()];
//! let res = client.wrap(&[], &mut packet).unwrap();
//! assert_eq!(res.status(), Status::Ok);
//!
//! let mut app = vec![0; server.application_buffer_size()];
//! let res = server.unwrap(&packet[..res.bytes_produced()], &mut app).unwrap();
//! assert!(res.bytes_consumed() > 0);
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]

#[macro_use]
extern crate log;

mod buffer;
mod close;
mod config;
pub mod crypto;
mod engine;
mod error;
mod handshake;
mod layer;
mod message;
mod record;
mod result;
mod rng;
mod task;
mod util;

pub use buffer::Buf;
pub use config::{Config, ConfigBuilder, MAX_FRAGMENT_LENGTH, MIN_FRAGMENT_LENGTH};
pub use engine::{Engine, OperationalState, Role};
pub use error::{Error, ProtocolError};
pub use message::{AlertDescription, CipherSuite, HashAlgorithm, NamedGroup, ProtocolVersion};
pub use record::{ContentType, Decoded, Overflow, Record, MAX_RECORD_PAYLOAD};
pub use result::{HandshakeStatus, OperationResult, Status};
pub use rng::SeededRng;
pub use task::DelegatedTask;
