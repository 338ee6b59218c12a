//! Cryptographic provider traits for pluggable crypto backends.
//!
//! The [`CryptoProvider`] struct holds static references to trait objects,
//! one per capability:
//!
//! - **Cipher Suites** ([`SupportedCipherSuite`]): key derivation, Finished
//!   computation and the factory for [`RecordCipher`] instances.
//! - **Key Exchange Groups** ([`SupportedKxGroup`]): factory for ephemeral
//!   ECDHE exchanges ([`ActiveKeyExchange`]).
//!
//! # Example: a custom cipher suite
//!
//! ```
//! use tlsengine::crypto::{KeyMaterial, RecordCipher, SupportedCipherSuite};
//! use tlsengine::{Buf, CipherSuite, HashAlgorithm};
//!
//! #[derive(Debug)]
//! struct NullCipher;
//!
//! impl RecordCipher for NullCipher {
//!     fn encrypt(&mut self, _seq: u64, _aad: &[u8], _data: &mut Buf) -> Result<(), String> {
//!         Ok(())
//!     }
//!     fn decrypt(&mut self, _seq: u64, _aad: &[u8], _data: &mut Buf) -> Result<(), String> {
//!         Ok(())
//!     }
//!     fn overhead(&self) -> usize {
//!         0
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct NullSuite;
//!
//! impl SupportedCipherSuite for NullSuite {
//!     fn suite(&self) -> CipherSuite {
//!         CipherSuite::Unknown(0)
//!     }
//!     fn hash_algorithm(&self) -> HashAlgorithm {
//!         HashAlgorithm::SHA256
//!     }
//!     fn key_lengths(&self) -> (usize, usize) {
//!         (0, 0)
//!     }
//!     fn derive_keys(&self, _: &[u8], _: &[u8; 32], _: &[u8; 32]) -> Result<KeyMaterial, String> {
//!         Err("not implemented".into())
//!     }
//!     fn verify_data(&self, _: &[u8], _: &str, _: &[u8]) -> Result<Vec<u8>, String> {
//!         Err("not implemented".into())
//!     }
//!     fn create_cipher(&self, _: &[u8], _: &[u8]) -> Result<Box<dyn RecordCipher>, String> {
//!         Ok(Box::new(NullCipher))
//!     }
//! }
//!
//! static NULL_SUITE: NullSuite = NullSuite;
//! static SUITES: &[&dyn SupportedCipherSuite] = &[&NULL_SUITE];
//! ```

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};

use super::KeyMaterial;
use crate::buffer::Buf;
use crate::message::{CipherSuite, HashAlgorithm, NamedGroup};
use crate::rng::SeededRng;

/// Marker trait for types that are safe to use in crypto provider components.
pub trait CryptoSafe: Send + Sync + Debug + UnwindSafe + RefUnwindSafe {}

impl<T: Send + Sync + Debug + UnwindSafe + RefUnwindSafe> CryptoSafe for T {}

/// Per-direction record protection.
///
/// `encrypt` turns the plaintext in `data` into the full record payload
/// (explicit nonce, ciphertext and tag). `decrypt` reverses that in place.
pub trait RecordCipher: CryptoSafe {
    fn encrypt(&mut self, seq: u64, aad: &[u8], data: &mut Buf) -> Result<(), String>;

    fn decrypt(&mut self, seq: u64, aad: &[u8], data: &mut Buf) -> Result<(), String>;

    /// Bytes a sealed record payload carries on top of the plaintext.
    fn overhead(&self) -> usize;
}

/// Ephemeral key exchange for one handshake.
pub trait ActiveKeyExchange: CryptoSafe {
    fn public_key(&self) -> &[u8];

    /// Complete exchange with peer's public key, returning the shared secret.
    fn complete(self: Box<Self>, peer_pub: &[u8]) -> Result<Buf, String>;

    fn group(&self) -> NamedGroup;
}

/// Cipher suite support.
pub trait SupportedCipherSuite: CryptoSafe {
    /// The cipher suite this supports.
    fn suite(&self) -> CipherSuite;

    /// Hash algorithm used by the PRF and the Finished transcript hash.
    fn hash_algorithm(&self) -> HashAlgorithm;

    /// Key material lengths: (enc_key_len, fixed_iv_len).
    fn key_lengths(&self) -> (usize, usize);

    /// Derive the master secret and the key block from the ECDHE secret.
    fn derive_keys(
        &self,
        pre_master: &[u8],
        client_random: &[u8; 32],
        server_random: &[u8; 32],
    ) -> Result<KeyMaterial, String>;

    /// Finished `verify_data` over the handshake transcript.
    fn verify_data(&self, master: &[u8], label: &str, transcript: &[u8])
        -> Result<Vec<u8>, String>;

    /// Create a record cipher for one direction.
    fn create_cipher(&self, key: &[u8], iv: &[u8]) -> Result<Box<dyn RecordCipher>, String>;
}

/// Key exchange group support.
pub trait SupportedKxGroup: CryptoSafe {
    fn name(&self) -> NamedGroup;

    /// Start a new key exchange, generating an ephemeral keypair.
    fn start(&self, rng: &mut SeededRng) -> Result<Box<dyn ActiveKeyExchange>, String>;
}

/// Cryptographic provider for the engine.
#[derive(Debug, Clone)]
pub struct CryptoProvider {
    /// Supported cipher suites, in preference order.
    pub cipher_suites: &'static [&'static dyn SupportedCipherSuite],

    /// Supported key exchange groups, in preference order.
    pub kx_groups: &'static [&'static dyn SupportedKxGroup],
}
