//! AES-GCM cipher suites using RustCrypto.
//!
//! Record payload layout (RFC 5288): `explicit_nonce(8) | ciphertext | tag(16)`.
//! The GCM nonce is the 4 byte implicit IV followed by the explicit nonce,
//! which is the record sequence number.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm};

use super::prf::{prf_tls12, transcript_hash};
use crate::buffer::Buf;
use crate::crypto::provider::{RecordCipher, SupportedCipherSuite};
use crate::crypto::KeyMaterial;
use crate::message::{CipherSuite, HashAlgorithm, VERIFY_DATA_LEN};

const EXPLICIT_NONCE_LEN: usize = 8;
const FIXED_IV_LEN: usize = 4;
const TAG_LEN: usize = 16;
const MASTER_SECRET_LEN: usize = 48;

enum AesGcm {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

struct GcmRecordCipher {
    aead: AesGcm,
    fixed_iv: [u8; FIXED_IV_LEN],
}

impl std::fmt::Debug for GcmRecordCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.aead {
            AesGcm::Aes128(_) => f.debug_tuple("AesGcm::Aes128").finish(),
            AesGcm::Aes256(_) => f.debug_tuple("AesGcm::Aes256").finish(),
        }
    }
}

impl GcmRecordCipher {
    fn new(key: &[u8], iv: &[u8]) -> Result<Self, String> {
        let aead = match key.len() {
            16 => AesGcm::Aes128(Box::new(
                Aes128Gcm::new_from_slice(key).map_err(|_| "Invalid AES-128 key")?,
            )),
            32 => AesGcm::Aes256(Box::new(
                Aes256Gcm::new_from_slice(key).map_err(|_| "Invalid AES-256 key")?,
            )),
            _ => return Err(format!("Invalid key size for AES-GCM: {}", key.len())),
        };

        let fixed_iv: [u8; FIXED_IV_LEN] = iv
            .try_into()
            .map_err(|_| format!("Invalid implicit IV length: {}", iv.len()))?;

        Ok(GcmRecordCipher { aead, fixed_iv })
    }

    fn nonce(&self, explicit: &[u8]) -> [u8; 12] {
        let mut nonce = [0u8; 12];
        nonce[..FIXED_IV_LEN].copy_from_slice(&self.fixed_iv);
        nonce[FIXED_IV_LEN..].copy_from_slice(explicit);
        nonce
    }
}

impl RecordCipher for GcmRecordCipher {
    fn encrypt(&mut self, seq: u64, aad: &[u8], data: &mut Buf) -> Result<(), String> {
        let explicit = seq.to_be_bytes();
        let nonce = self.nonce(&explicit);
        let nonce = GenericArray::from_slice(&nonce);

        match &self.aead {
            AesGcm::Aes128(cipher) => cipher.encrypt_in_place(nonce, aad, data),
            AesGcm::Aes256(cipher) => cipher.encrypt_in_place(nonce, aad, data),
        }
        .map_err(|_| "AES-GCM encryption failed".to_string())?;

        let v = data.as_vec_mut();
        v.extend_from_slice(&explicit);
        v.rotate_right(EXPLICIT_NONCE_LEN);
        Ok(())
    }

    fn decrypt(&mut self, _seq: u64, aad: &[u8], data: &mut Buf) -> Result<(), String> {
        if data.len() < EXPLICIT_NONCE_LEN + TAG_LEN {
            return Err(format!("Ciphertext too short: {}", data.len()));
        }

        let nonce = self.nonce(&data[..EXPLICIT_NONCE_LEN]);
        let nonce = GenericArray::from_slice(&nonce);
        data.consume(EXPLICIT_NONCE_LEN);

        match &self.aead {
            AesGcm::Aes128(cipher) => cipher.decrypt_in_place(nonce, aad, data),
            AesGcm::Aes256(cipher) => cipher.decrypt_in_place(nonce, aad, data),
        }
        .map_err(|_| "AES-GCM decryption failed".to_string())
    }

    fn overhead(&self) -> usize {
        EXPLICIT_NONCE_LEN + TAG_LEN
    }
}

/// TLS_ECDHE_RSA_WITH_AES_*_GCM_SHA* suites. They differ only in key size
/// and PRF hash.
#[derive(Debug)]
struct GcmSuite {
    suite: CipherSuite,
    hash: HashAlgorithm,
    key_len: usize,
}

impl SupportedCipherSuite for GcmSuite {
    fn suite(&self) -> CipherSuite {
        self.suite
    }

    fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash
    }

    fn key_lengths(&self) -> (usize, usize) {
        (self.key_len, FIXED_IV_LEN)
    }

    fn derive_keys(
        &self,
        pre_master: &[u8],
        client_random: &[u8; 32],
        server_random: &[u8; 32],
    ) -> Result<KeyMaterial, String> {
        let mut seed = Buf::new();
        seed.extend_from_slice(client_random);
        seed.extend_from_slice(server_random);
        let master_secret = prf_tls12(
            self.hash,
            pre_master,
            "master secret",
            &seed,
            MASTER_SECRET_LEN,
        )?;

        // Key expansion uses the randoms in the opposite order.
        seed.clear();
        seed.extend_from_slice(server_random);
        seed.extend_from_slice(client_random);
        let (key_len, iv_len) = self.key_lengths();
        let block = prf_tls12(
            self.hash,
            &master_secret,
            "key expansion",
            &seed,
            2 * key_len + 2 * iv_len,
        )?;

        let (client_write_key, rest) = block.split_at(key_len);
        let (server_write_key, rest) = rest.split_at(key_len);
        let (client_write_iv, server_write_iv) = rest.split_at(iv_len);

        Ok(KeyMaterial {
            client_write_key: Buf::from_slice(client_write_key),
            server_write_key: Buf::from_slice(server_write_key),
            client_write_iv: Buf::from_slice(client_write_iv),
            server_write_iv: Buf::from_slice(server_write_iv),
            master_secret,
        })
    }

    fn verify_data(
        &self,
        master: &[u8],
        label: &str,
        transcript: &[u8],
    ) -> Result<Vec<u8>, String> {
        let hash = transcript_hash(self.hash, transcript)?;
        let out = prf_tls12(self.hash, master, label, &hash, VERIFY_DATA_LEN)?;
        Ok(out.into_vec())
    }

    fn create_cipher(&self, key: &[u8], iv: &[u8]) -> Result<Box<dyn RecordCipher>, String> {
        Ok(Box::new(GcmRecordCipher::new(key, iv)?))
    }
}

static AES_128_GCM_SHA256: GcmSuite = GcmSuite {
    suite: CipherSuite::ECDHE_RSA_AES128_GCM_SHA256,
    hash: HashAlgorithm::SHA256,
    key_len: 16,
};

static AES_256_GCM_SHA384: GcmSuite = GcmSuite {
    suite: CipherSuite::ECDHE_RSA_AES256_GCM_SHA384,
    hash: HashAlgorithm::SHA384,
    key_len: 32,
};

/// All supported cipher suites, in preference order.
pub(super) static ALL_CIPHER_SUITES: &[&dyn SupportedCipherSuite] =
    &[&AES_128_GCM_SHA256, &AES_256_GCM_SHA384];
