//! Validation and filtering for crypto providers.

use crate::buffer::Buf;
use crate::crypto::provider::{CryptoProvider, SupportedCipherSuite, SupportedKxGroup};
use crate::message::{CipherSuite, NamedGroup};
use crate::Error;

impl CryptoProvider {
    /// Cipher suites the engine can negotiate.
    pub fn supported_cipher_suites(
        &self,
    ) -> impl Iterator<Item = &'static dyn SupportedCipherSuite> {
        self.cipher_suites.iter().copied().filter(|cs| {
            matches!(
                cs.suite(),
                CipherSuite::ECDHE_RSA_AES128_GCM_SHA256 | CipherSuite::ECDHE_RSA_AES256_GCM_SHA384
            )
        })
    }

    /// Key exchange groups the engine can use. Only X25519 is wired up.
    pub fn supported_kx_groups(&self) -> impl Iterator<Item = &'static dyn SupportedKxGroup> {
        self.kx_groups
            .iter()
            .copied()
            .filter(|kx| kx.name() == NamedGroup::X25519)
    }

    pub fn find_cipher_suite(
        &self,
        suite: CipherSuite,
    ) -> Option<&'static dyn SupportedCipherSuite> {
        self.supported_cipher_suites().find(|cs| cs.suite() == suite)
    }

    pub fn find_kx_group(&self, group: NamedGroup) -> Option<&'static dyn SupportedKxGroup> {
        self.supported_kx_groups().find(|kx| kx.name() == group)
    }

    /// Validates the provider before it goes into a `Config`.
    ///
    /// Returns `Error::ConfigError` if validation fails.
    pub fn validate(&self) -> Result<(), Error> {
        self.validate_cipher_suites()?;
        self.validate_kx_groups()?;
        self.validate_key_derivation()?;
        Ok(())
    }

    fn validate_cipher_suites(&self) -> Result<(), Error> {
        if self.supported_cipher_suites().count() == 0 {
            return Err(Error::ConfigError(
                "CryptoProvider has no supported cipher suites".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_kx_groups(&self) -> Result<(), Error> {
        if self.supported_kx_groups().count() == 0 {
            return Err(Error::ConfigError(
                "CryptoProvider has no supported key exchange groups".to_string(),
            ));
        }
        Ok(())
    }

    /// Derive keys from a fixed secret and seal/open a probe record with them.
    fn validate_key_derivation(&self) -> Result<(), Error> {
        const PROBE: &[u8] = b"probe";
        let pre_master = [0x42; 32];
        let client_random = [1; 32];
        let server_random = [2; 32];

        for cs in self.supported_cipher_suites() {
            let suite = cs.suite();
            let keys = cs
                .derive_keys(&pre_master, &client_random, &server_random)
                .map_err(|e| Error::ConfigError(format!("{:?} key derivation: {}", suite, e)))?;

            let (key_len, iv_len) = cs.key_lengths();
            if keys.client_write_key.len() != key_len || keys.client_write_iv.len() != iv_len {
                return Err(Error::ConfigError(format!(
                    "{:?} derived wrong key lengths",
                    suite
                )));
            }

            let mut sealer = cs
                .create_cipher(&keys.client_write_key, &keys.client_write_iv)
                .map_err(|e| Error::ConfigError(format!("{:?} cipher: {}", suite, e)))?;
            let mut opener = cs
                .create_cipher(&keys.client_write_key, &keys.client_write_iv)
                .map_err(|e| Error::ConfigError(format!("{:?} cipher: {}", suite, e)))?;

            let mut data = Buf::from_slice(PROBE);
            sealer
                .encrypt(0, PROBE, &mut data)
                .map_err(|e| Error::ConfigError(format!("{:?} encrypt: {}", suite, e)))?;
            if data.len() != PROBE.len() + sealer.overhead() {
                return Err(Error::ConfigError(format!(
                    "{:?} overhead does not match sealed length",
                    suite
                )));
            }
            opener
                .decrypt(0, PROBE, &mut data)
                .map_err(|e| Error::ConfigError(format!("{:?} decrypt: {}", suite, e)))?;
            if &*data != PROBE {
                return Err(Error::ConfigError(format!(
                    "{:?} record cipher did not round trip",
                    suite
                )));
            }
        }

        Ok(())
    }
}
