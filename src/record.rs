//! Record framing: `type(1) | version(2) | length(2) | payload`.
//!
//! The codec knows nothing about handshake state or protection. Decoding is
//! restartable: a short buffer yields [`Decoded::Incomplete`] and consumes
//! nothing.

use nom::bytes::streaming::take;
use nom::number::streaming::{be_u16, be_u8};
use nom::IResult;

use crate::buffer::Buf;
use crate::message::ProtocolVersion;
use crate::ProtocolError;

/// Largest payload accepted on the wire (RFC 5246 TLSCiphertext bound).
pub const MAX_RECORD_PAYLOAD: usize = 16_384 + 2_048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    ChangeCipherSpec,
    Alert,
    Handshake,
    ApplicationData,
    Unknown(u8),
}

impl Default for ContentType {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl ContentType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            20 => ContentType::ChangeCipherSpec,
            21 => ContentType::Alert,
            22 => ContentType::Handshake,
            23 => ContentType::ApplicationData,
            _ => ContentType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            ContentType::ChangeCipherSpec => 20,
            ContentType::Alert => 21,
            ContentType::Handshake => 22,
            ContentType::ApplicationData => 23,
            ContentType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ContentType> {
        let (input, byte) = be_u8(input)?;
        Ok((input, Self::from_u8(byte)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<'a> {
    pub content_type: ContentType,
    pub version: ProtocolVersion,
    pub payload: &'a [u8],
}

/// Outcome of [`Record::decode`].
#[derive(Debug, PartialEq, Eq)]
pub enum Decoded<'a> {
    /// A whole record and the number of bytes it occupied.
    Record(Record<'a>, usize),
    /// More bytes are needed. Nothing was consumed.
    Incomplete,
}

/// The destination cannot hold the encoded record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overflow {
    pub needed: usize,
}

impl<'a> Record<'a> {
    /// content_type(1) + version(2) + length(2)
    pub const HEADER_LEN: usize = 5;

    pub fn new(content_type: ContentType, payload: &'a [u8]) -> Self {
        Record {
            content_type,
            version: ProtocolVersion::TLS1_2,
            payload,
        }
    }

    pub fn encoded_len(&self) -> usize {
        Self::HEADER_LEN + self.payload.len()
    }

    fn parse(input: &'a [u8]) -> IResult<&'a [u8], (ContentType, ProtocolVersion, u16)> {
        let (input, content_type) = ContentType::parse(input)?;
        let (input, version) = be_u16(input)?;
        let (input, length) = be_u16(input)?;
        Ok((input, (content_type, ProtocolVersion::from_u16(version), length)))
    }

    /// Decode one record from the front of `src`.
    pub fn decode(src: &'a [u8]) -> Result<Decoded<'a>, ProtocolError> {
        let (rest, (content_type, version, length)) = match Self::parse(src) {
            Ok(v) => v,
            Err(nom::Err::Incomplete(_)) => return Ok(Decoded::Incomplete),
            Err(e) => return Err(ProtocolError::Decode(format!("record header: {:?}", e))),
        };

        // Header checks run before the payload is complete.
        if let ContentType::Unknown(v) = content_type {
            return Err(ProtocolError::UnexpectedContentType(v));
        }
        if length as usize > MAX_RECORD_PAYLOAD {
            return Err(ProtocolError::RecordOverflow(length as usize));
        }

        let payload: IResult<&[u8], &[u8]> = take(length as usize)(rest);
        match payload {
            Ok((_, payload)) => {
                let record = Record {
                    content_type,
                    version,
                    payload,
                };
                let consumed = record.encoded_len();
                Ok(Decoded::Record(record, consumed))
            }
            Err(_) => Ok(Decoded::Incomplete),
        }
    }

    /// Encode into `dst`. Writes nothing if it does not fit.
    pub fn encode(&self, dst: &mut [u8]) -> Result<usize, Overflow> {
        let needed = self.encoded_len();
        if dst.len() < needed {
            return Err(Overflow { needed });
        }

        dst[0] = self.content_type.as_u8();
        dst[1..3].copy_from_slice(&self.version.as_u16().to_be_bytes());
        dst[3..5].copy_from_slice(&(self.payload.len() as u16).to_be_bytes());
        dst[5..needed].copy_from_slice(self.payload);

        Ok(needed)
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(self.content_type.as_u8());
        output.extend_from_slice(&self.version.as_u16().to_be_bytes());
        output.extend_from_slice(&(self.payload.len() as u16).to_be_bytes());
        output.extend_from_slice(self.payload);
    }
}
