use nom::error::{Error, ErrorKind};
use nom::{Err, IResult};
use tinyvec::ArrayVec;

use super::{CipherSuite, CompressionMethod, ProtocolVersion, Random};
use crate::util::{many0_capped, opaque_u16, opaque_u8};

/// Most cipher suites a ClientHello offers or accepts.
pub const MAX_CIPHER_SUITES: usize = 32;

#[derive(Debug, PartialEq, Eq)]
pub struct ClientHello<'a> {
    pub client_version: ProtocolVersion,
    pub random: Random,
    pub session_id: &'a [u8],
    pub cipher_suites: ArrayVec<[CipherSuite; MAX_CIPHER_SUITES]>,
    pub compression_methods: ArrayVec<[CompressionMethod; 4]>,
    /// Raw extension block. Parsed only to be skipped, no extensions are acted on.
    pub extensions: &'a [u8],
}

impl<'a> ClientHello<'a> {
    pub fn new(
        client_version: ProtocolVersion,
        random: Random,
        cipher_suites: ArrayVec<[CipherSuite; MAX_CIPHER_SUITES]>,
    ) -> Self {
        let mut compression_methods = ArrayVec::new();
        compression_methods.push(CompressionMethod::Null);

        ClientHello {
            client_version,
            random,
            session_id: &[],
            cipher_suites,
            compression_methods,
            extensions: &[],
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ClientHello<'a>> {
        let (input, client_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = opaque_u8(input)?;
        if session_id.len() > 32 {
            return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
        }

        let (input, input_cipher) = opaque_u16(input)?;
        if input_cipher.is_empty() || input_cipher.len() % 2 != 0 {
            return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
        }
        let (_, cipher_suites) = many0_capped(CipherSuite::parse)(input_cipher)?;

        let (input, input_compression) = opaque_u8(input)?;
        if input_compression.is_empty() {
            return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
        }
        let (_, compression_methods) = many0_capped(CompressionMethod::parse)(input_compression)?;

        // Extensions are optional in TLS 1.2.
        let (input, extensions) = if input.is_empty() {
            (input, &input[..0])
        } else {
            let (input, extensions) = opaque_u16(input)?;
            (input, extensions)
        };

        Ok((
            input,
            ClientHello {
                client_version,
                random,
                session_id,
                cipher_suites,
                compression_methods,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.client_version.serialize(output);
        self.random.serialize(output);
        output.push(self.session_id.len() as u8);
        output.extend_from_slice(self.session_id);
        output.extend_from_slice(&(self.cipher_suites.len() as u16 * 2).to_be_bytes());
        for suite in &self.cipher_suites {
            output.extend_from_slice(&suite.as_u16().to_be_bytes());
        }
        output.push(self.compression_methods.len() as u8);
        for method in &self.compression_methods {
            output.push(method.as_u8());
        }
        if !self.extensions.is_empty() {
            output.extend_from_slice(&(self.extensions.len() as u16).to_be_bytes());
            output.extend_from_slice(self.extensions);
        }
    }
}
