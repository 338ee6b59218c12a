//! Cryptographic capabilities consumed by the engine.
//!
//! Record protection, key exchange and key derivation come from a
//! [`CryptoProvider`]. Certificate checking is delegated to a
//! [`CertVerifier`].

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::buffer::Buf;

pub mod provider;
pub mod rust_crypto;
mod validation;

pub use provider::{ActiveKeyExchange, CryptoProvider, CryptoSafe, RecordCipher};
pub use provider::{SupportedCipherSuite, SupportedKxGroup};

pub use crate::message::{CipherSuite, HashAlgorithm, NamedGroup};

/// Label for the client's Finished.
pub const CLIENT_FINISHED: &str = "client finished";

/// Label for the server's Finished.
pub const SERVER_FINISHED: &str = "server finished";

/// Secrets produced by the key derivation step.
///
/// Wiped on drop.
pub struct KeyMaterial {
    pub master_secret: Buf,
    pub client_write_key: Buf,
    pub server_write_key: Buf,
    pub client_write_iv: Buf,
    pub server_write_iv: Buf,
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.master_secret.zeroize();
        self.client_write_key.zeroize();
        self.server_write_key.zeroize();
        self.client_write_iv.zeroize();
        self.server_write_iv.zeroize();
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial").finish_non_exhaustive()
    }
}

/// Constant time compare of received against expected `verify_data`.
pub(crate) fn verify_data_matches(expected: &[u8], received: &[u8]) -> bool {
    expected.len() == received.len() && bool::from(expected.ct_eq(received))
}

/// Verifies the certificate chain presented by the server.
///
/// Invoked from a delegated task, so implementations may be slow.
pub trait CertVerifier: Send + Sync + fmt::Debug {
    /// `chain` is in wire order, leaf first. An `Err` fails the handshake
    /// with a bad_certificate alert.
    fn verify_certificate(&self, chain: &[Vec<u8>]) -> Result<(), String>;
}

/// Accepts any chain, including an empty one. For tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAnyCertificate;

impl CertVerifier for AcceptAnyCertificate {
    fn verify_certificate(&self, _chain: &[Vec<u8>]) -> Result<(), String> {
        Ok(())
    }
}
