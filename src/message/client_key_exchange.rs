use nom::error::{Error, ErrorKind};
use nom::{Err, IResult};

use crate::util::opaque_u8;

/// ECDHE ClientKeyExchange: the client's ephemeral public point.
#[derive(Debug, PartialEq, Eq)]
pub struct ClientKeyExchange<'a> {
    pub public_key: &'a [u8],
}

impl<'a> ClientKeyExchange<'a> {
    pub fn new(public_key: &'a [u8]) -> Self {
        ClientKeyExchange { public_key }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ClientKeyExchange<'a>> {
        let (input, public_key) = opaque_u8(input)?;
        if public_key.is_empty() {
            return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
        }
        Ok((input, ClientKeyExchange { public_key }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.public_key.len() as u8);
        output.extend_from_slice(self.public_key);
    }
}
