use std::sync::Arc;

use crate::crypto::{rust_crypto, AcceptAnyCertificate, CertVerifier, CryptoProvider};
use crate::crypto::SupportedCipherSuite;
use crate::handshake::MAX_MESSAGE_LEN;
use crate::message::{CipherSuite, HANDSHAKE_HEADER_LEN, MAX_CERTIFICATES, MAX_CIPHER_SUITES};
use crate::Error;

/// Largest plaintext fragment a record may carry.
pub const MAX_FRAGMENT_LENGTH: usize = 16_384;

/// Smallest `max_fragment_length` the builder accepts.
pub const MIN_FRAGMENT_LENGTH: usize = 512;

/// Engine configuration.
///
/// Immutable once built. Share it between engines with an `Arc`.
#[derive(Clone)]
pub struct Config {
    max_fragment_length: usize,
    crypto_provider: CryptoProvider,
    cipher_suites: Vec<CipherSuite>,
    cert_verifier: Arc<dyn CertVerifier>,
    certificate_chain: Vec<Vec<u8>>,
    rng_seed: Option<u64>,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            max_fragment_length: MAX_FRAGMENT_LENGTH,
            crypto_provider: None,
            cipher_suites: None,
            cert_verifier: None,
            certificate_chain: Vec::new(),
            rng_seed: None,
        }
    }

    /// Largest application data fragment `wrap` seals into one record.
    #[inline(always)]
    pub fn max_fragment_length(&self) -> usize {
        self.max_fragment_length
    }

    /// Cryptographic provider.
    #[inline(always)]
    pub fn crypto_provider(&self) -> &CryptoProvider {
        &self.crypto_provider
    }

    /// Cipher suites in preference order. Never empty.
    ///
    /// The client offers these in its ClientHello. The server picks the first
    /// of these that the client offered.
    pub fn cipher_suites(&self) -> impl Iterator<Item = &'static dyn SupportedCipherSuite> + '_ {
        self.cipher_suites
            .iter()
            .filter_map(|s| self.crypto_provider.find_cipher_suite(*s))
    }

    /// Verifier for the server certificate chain (used by clients).
    #[inline(always)]
    pub fn cert_verifier(&self) -> &Arc<dyn CertVerifier> {
        &self.cert_verifier
    }

    /// Certificate chain a server presents, leaf first.
    #[inline(always)]
    pub fn certificate_chain(&self) -> &[Vec<u8>] {
        &self.certificate_chain
    }

    /// Seed for deterministic randomness. Tests only.
    #[inline(always)]
    pub fn rng_seed(&self) -> Option<u64> {
        self.rng_seed
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("max_fragment_length", &self.max_fragment_length)
            .field("cipher_suites", &self.cipher_suites)
            .field("cert_verifier", &self.cert_verifier)
            .field("certificate_chain", &self.certificate_chain.len())
            .field("rng_seed", &self.rng_seed)
            .finish()
    }
}

/// Builder for engine configuration.
pub struct ConfigBuilder {
    max_fragment_length: usize,
    crypto_provider: Option<CryptoProvider>,
    cipher_suites: Option<Vec<CipherSuite>>,
    cert_verifier: Option<Arc<dyn CertVerifier>>,
    certificate_chain: Vec<Vec<u8>>,
    rng_seed: Option<u64>,
}

impl ConfigBuilder {
    /// Set the largest plaintext fragment per application data record.
    ///
    /// Must be within 512..=16384. Defaults to 16384.
    pub fn max_fragment_length(mut self, len: usize) -> Self {
        self.max_fragment_length = len;
        self
    }

    /// Set a custom crypto provider.
    ///
    /// Defaults to [`rust_crypto::default_provider()`].
    pub fn with_crypto_provider(mut self, provider: CryptoProvider) -> Self {
        self.crypto_provider = Some(provider);
        self
    }

    /// Restrict and order the cipher suites.
    ///
    /// Defaults to every suite the provider supports, in provider order.
    pub fn cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.cipher_suites = Some(suites.to_vec());
        self
    }

    /// Set the verifier clients use for the server certificate chain.
    ///
    /// Defaults to [`AcceptAnyCertificate`].
    pub fn cert_verifier(mut self, verifier: Arc<dyn CertVerifier>) -> Self {
        self.cert_verifier = Some(verifier);
        self
    }

    /// Set the DER certificate chain a server sends, leaf first.
    pub fn certificate_chain(mut self, chain: Vec<Vec<u8>>) -> Self {
        self.certificate_chain = chain;
        self
    }

    /// Make hello randoms and key shares deterministic.
    ///
    /// Never use this outside tests.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Build the configuration.
    ///
    /// Returns `Error::ConfigError` if the provider fails validation, the
    /// fragment length is out of range, or no usable cipher suite remains.
    pub fn build(self) -> Result<Config, Error> {
        let crypto_provider = self
            .crypto_provider
            .unwrap_or_else(rust_crypto::default_provider);

        crypto_provider.validate()?;

        if !(MIN_FRAGMENT_LENGTH..=MAX_FRAGMENT_LENGTH).contains(&self.max_fragment_length) {
            return Err(Error::ConfigError(format!(
                "max_fragment_length {} outside {}..={}",
                self.max_fragment_length, MIN_FRAGMENT_LENGTH, MAX_FRAGMENT_LENGTH
            )));
        }

        let cipher_suites: Vec<CipherSuite> = match self.cipher_suites {
            Some(wanted) => {
                let mut suites = Vec::new();
                for suite in wanted {
                    if crypto_provider.find_cipher_suite(suite).is_none() {
                        return Err(Error::ConfigError(format!(
                            "cipher suite {:?} not supported by provider",
                            suite
                        )));
                    }
                    if !suites.contains(&suite) {
                        suites.push(suite);
                    }
                }
                suites
            }
            None => crypto_provider
                .supported_cipher_suites()
                .map(|cs| cs.suite())
                .collect(),
        };

        check_cipher_suites(&cipher_suites)?;
        check_certificate_chain(&self.certificate_chain)?;

        Ok(Config {
            max_fragment_length: self.max_fragment_length,
            crypto_provider,
            cipher_suites,
            cert_verifier: self
                .cert_verifier
                .unwrap_or_else(|| Arc::new(AcceptAnyCertificate)),
            certificate_chain: self.certificate_chain,
            rng_seed: self.rng_seed,
        })
    }
}

fn check_cipher_suites(suites: &[CipherSuite]) -> Result<(), Error> {
    if suites.is_empty() {
        return Err(Error::ConfigError("no cipher suites configured".to_string()));
    }
    if suites.len() > MAX_CIPHER_SUITES {
        return Err(Error::ConfigError(format!(
            "{} cipher suites configured, at most {} allowed",
            suites.len(),
            MAX_CIPHER_SUITES
        )));
    }
    Ok(())
}

/// The chain must fit one Certificate message the peer accepts.
fn check_certificate_chain(chain: &[Vec<u8>]) -> Result<(), Error> {
    if chain.len() > MAX_CERTIFICATES {
        return Err(Error::ConfigError(format!(
            "certificate chain of {} entries, at most {} allowed",
            chain.len(),
            MAX_CERTIFICATES
        )));
    }

    if let Some(cert) = chain.iter().find(|c| c.len() >= 1 << 24) {
        return Err(Error::ConfigError(format!(
            "certificate of {} bytes does not fit a 24 bit length",
            cert.len()
        )));
    }

    let message_len = HANDSHAKE_HEADER_LEN + 3 + chain.iter().map(|c| 3 + c.len()).sum::<usize>();
    if message_len > MAX_MESSAGE_LEN {
        return Err(Error::ConfigError(format!(
            "certificate message of {} bytes exceeds {}",
            message_len, MAX_MESSAGE_LEN
        )));
    }

    Ok(())
}

impl Default for Config {
    fn default() -> Self {
        Config::builder()
            .build()
            .expect("Default config should always validate")
    }
}
