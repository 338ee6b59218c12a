//! Record protection and the outbound record queue.
//!
//! Each direction has a sequence number and, once ChangeCipherSpec has been
//! crossed, an active cipher. Keys are staged by the handshake and switched
//! on per direction. Sealed records wait in a queue until a caller buffer is
//! big enough to take them whole.

use std::collections::VecDeque;

use crate::buffer::{Buf, BufferPool};
use crate::config::MAX_FRAGMENT_LENGTH;
use crate::crypto::RecordCipher;
use crate::message::ProtocolVersion;
use crate::record::{ContentType, Record};
use crate::{Error, ProtocolError};

/// Something the engine must act on once a record has left the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
    /// The last record of the server's final flight.
    HandshakeFinished,
    /// Our close_notify.
    CloseNotify,
}

#[derive(Debug)]
struct Outgoing {
    bytes: Buf,
    completion: Option<Completion>,
}

/// Result of copying queued records into a caller buffer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Flushed {
    pub produced: usize,
    pub handshake_finished: bool,
    pub close_notify: bool,
    /// Records remain because the next one did not fit.
    pub blocked: bool,
}

#[derive(Debug, Default)]
struct Direction {
    cipher: Option<Box<dyn RecordCipher>>,
    staged: Option<Box<dyn RecordCipher>>,
    seq: u64,
}

impl Direction {
    fn activate(&mut self) -> Result<(), Error> {
        let Some(cipher) = self.staged.take() else {
            return Err(ProtocolError::UnexpectedMessage(
                "ChangeCipherSpec before keys were derived".to_string(),
            )
            .into());
        };
        self.cipher = Some(cipher);
        self.seq = 0;
        Ok(())
    }
}

fn next_seq(seq: &mut u64) -> Result<u64, Error> {
    let current = *seq;
    *seq = current
        .checked_add(1)
        .ok_or_else(|| Error::CryptoError("sequence number exhausted".to_string()))?;
    Ok(current)
}

#[derive(Debug, Default)]
pub(crate) struct RecordLayer {
    tx: Direction,
    rx: Direction,
    outgoing: VecDeque<Outgoing>,
    pool: BufferPool,
}

/// seq_num(8) | type(1) | version(2) | length(2)
fn aad(seq: u64, content_type: ContentType, plain_len: usize) -> [u8; 13] {
    let mut aad = [0u8; 13];
    aad[..8].copy_from_slice(&seq.to_be_bytes());
    aad[8] = content_type.as_u8();
    aad[9..11].copy_from_slice(&ProtocolVersion::TLS1_2.as_u16().to_be_bytes());
    aad[11..].copy_from_slice(&(plain_len as u16).to_be_bytes());
    aad
}

impl RecordLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage the ciphers that take over at ChangeCipherSpec.
    pub fn stage(&mut self, tx: Box<dyn RecordCipher>, rx: Box<dyn RecordCipher>) {
        self.tx.staged = Some(tx);
        self.rx.staged = Some(rx);
    }

    pub fn activate_tx(&mut self) -> Result<(), Error> {
        self.tx.activate()
    }

    pub fn activate_rx(&mut self) -> Result<(), Error> {
        self.rx.activate()
    }

    pub fn has_staged_rx(&self) -> bool {
        self.rx.staged.is_some()
    }

    /// Size on the wire of a record carrying `plain_len` bytes.
    pub fn sealed_len(&self, plain_len: usize) -> usize {
        let overhead = self.tx.cipher.as_ref().map(|c| c.overhead()).unwrap_or(0);
        Record::HEADER_LEN + plain_len + overhead
    }

    /// Plaintext length `record` will open to.
    pub fn opened_len(&self, record: &Record) -> usize {
        let overhead = self.rx.cipher.as_ref().map(|c| c.overhead()).unwrap_or(0);
        record.payload.len().saturating_sub(overhead)
    }

    /// Protect `plaintext` as one record and queue it.
    pub fn seal(
        &mut self,
        content_type: ContentType,
        plaintext: &[u8],
        completion: Option<Completion>,
    ) -> Result<(), Error> {
        debug_assert!(plaintext.len() <= MAX_FRAGMENT_LENGTH);

        let mut data = self.pool.pop();
        data.extend_from_slice(plaintext);

        if let Some(cipher) = self.tx.cipher.as_mut() {
            let seq = next_seq(&mut self.tx.seq)?;
            let aad = aad(seq, content_type, plaintext.len());
            cipher
                .encrypt(seq, &aad, &mut data)
                .map_err(Error::CryptoError)?;
        }

        let mut bytes = self.pool.pop();
        Record::new(content_type, &data).serialize(&mut bytes);
        self.pool.push(data);

        trace!(
            "Queue {:?} record, {} bytes{}",
            content_type,
            bytes.len(),
            if self.tx.cipher.is_some() { " (protected)" } else { "" }
        );
        self.outgoing.push_back(Outgoing { bytes, completion });
        Ok(())
    }

    /// Remove protection from an inbound record.
    pub fn open(&mut self, record: &Record) -> Result<Buf, Error> {
        if record.version.as_u16() >> 8 != 3 {
            return Err(ProtocolError::BadProtocolVersion(record.version).into());
        }

        let Some(cipher) = self.rx.cipher.as_mut() else {
            if record.payload.len() > MAX_FRAGMENT_LENGTH {
                return Err(ProtocolError::RecordOverflow(record.payload.len()).into());
            }
            return Ok(Buf::from_slice(record.payload));
        };

        let overhead = cipher.overhead();
        if record.payload.len() < overhead {
            return Err(ProtocolError::BadRecordMac.into());
        }
        let plain_len = record.payload.len() - overhead;
        if plain_len > MAX_FRAGMENT_LENGTH {
            return Err(ProtocolError::RecordOverflow(plain_len).into());
        }

        let seq = next_seq(&mut self.rx.seq)?;
        let aad = aad(seq, record.content_type, plain_len);
        let mut data = Buf::from_slice(record.payload);
        cipher.decrypt(seq, &aad, &mut data).map_err(|e| {
            debug!("Failed to open record {}: {}", seq, e);
            Error::from(ProtocolError::BadRecordMac)
        })?;

        Ok(data)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Drop all queued records.
    pub fn clear_outgoing(&mut self) {
        while let Some(out) = self.outgoing.pop_front() {
            self.pool.push(out.bytes);
        }
    }

    /// Copy whole queued records into `dst`, front first.
    pub fn flush(&mut self, dst: &mut [u8]) -> Flushed {
        let mut flushed = Flushed::default();

        while let Some(front) = self.outgoing.front() {
            let len = front.bytes.len();
            if dst.len() - flushed.produced < len {
                flushed.blocked = true;
                break;
            }

            let Some(out) = self.outgoing.pop_front() else {
                break;
            };
            dst[flushed.produced..flushed.produced + len].copy_from_slice(&out.bytes);
            flushed.produced += len;

            match out.completion {
                Some(Completion::HandshakeFinished) => flushed.handshake_finished = true,
                Some(Completion::CloseNotify) => flushed.close_notify = true,
                None => {}
            }
            self.pool.push(out.bytes);
        }

        flushed
    }
}
