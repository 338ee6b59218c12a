use nom::error::{Error, ErrorKind};
use nom::{Err, IResult};

use super::{CipherSuite, CompressionMethod, ProtocolVersion, Random};
use crate::util::{opaque_u16, opaque_u8};

#[derive(Debug, PartialEq, Eq)]
pub struct ServerHello<'a> {
    pub server_version: ProtocolVersion,
    pub random: Random,
    pub session_id: &'a [u8],
    pub cipher_suite: CipherSuite,
    pub compression_method: CompressionMethod,
}

impl<'a> ServerHello<'a> {
    pub fn new(server_version: ProtocolVersion, random: Random, cipher_suite: CipherSuite) -> Self {
        ServerHello {
            server_version,
            random,
            // No session resumption, so the id is always empty.
            session_id: &[],
            cipher_suite,
            compression_method: CompressionMethod::Null,
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ServerHello<'a>> {
        let (input, server_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = opaque_u8(input)?;
        if session_id.len() > 32 {
            return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
        }
        let (input, cipher_suite) = CipherSuite::parse(input)?;
        let (input, compression_method) = CompressionMethod::parse(input)?;

        let input = if input.is_empty() {
            input
        } else {
            opaque_u16(input)?.0
        };

        Ok((
            input,
            ServerHello {
                server_version,
                random,
                session_id,
                cipher_suite,
                compression_method,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.server_version.serialize(output);
        self.random.serialize(output);
        output.push(self.session_id.len() as u8);
        output.extend_from_slice(self.session_id);
        output.extend_from_slice(&self.cipher_suite.as_u16().to_be_bytes());
        output.push(self.compression_method.as_u8());
    }
}
