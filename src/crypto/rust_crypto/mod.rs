//! RustCrypto cryptographic provider.
//!
//! Pure Rust backend built on crates from the
//! [RustCrypto](https://github.com/RustCrypto) organization and
//! `x25519-dalek`.
//!
//! ```
//! use std::sync::Arc;
//! use tlsengine::{Config, Engine};
//! use tlsengine::crypto::rust_crypto;
//!
//! let config = Arc::new(
//!     Config::builder()
//!         .with_crypto_provider(rust_crypto::default_provider())
//!         .build()
//!         .unwrap(),
//! );
//! let engine = Engine::client(config);
//! ```

mod cipher_suite;
mod kx_group;
mod prf;

use crate::crypto::provider::CryptoProvider;

/// Get the default RustCrypto-based crypto provider.
///
/// # Supported Cipher Suites
///
/// - `TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256` (0xC02F)
/// - `TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384` (0xC030)
///
/// # Supported Key Exchange Groups
///
/// - `x25519`
pub fn default_provider() -> CryptoProvider {
    CryptoProvider {
        cipher_suites: cipher_suite::ALL_CIPHER_SUITES,
        kx_groups: kx_group::ALL_KX_GROUPS,
    }
}
