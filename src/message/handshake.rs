use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::{be_u24, be_u8};
use nom::{Err, IResult};

use super::{Certificate, ClientHello, ClientKeyExchange, Finished, ServerHello, ServerKeyExchange};

/// msg_type(1) + length(3)
pub const HANDSHAKE_HEADER_LEN: usize = 4;

#[derive(Debug, PartialEq, Eq)]
pub struct Handshake<'a> {
    pub msg_type: MessageType,
    pub body: Body<'a>,
}

impl<'a> Handshake<'a> {
    pub fn new(body: Body<'a>) -> Self {
        Handshake {
            msg_type: body.message_type(),
            body,
        }
    }

    /// Total length (header included) of the handshake message starting at
    /// `input`, if at least the header is available.
    pub fn framed_len(input: &[u8]) -> Option<usize> {
        if input.len() < HANDSHAKE_HEADER_LEN {
            return None;
        }
        let length = u32::from_be_bytes([0, input[1], input[2], input[3]]) as usize;
        Some(HANDSHAKE_HEADER_LEN + length)
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Handshake<'a>> {
        let (input, msg_type) = MessageType::parse(input)?;
        let (input, length) = be_u24(input)?;
        let (input, body_bytes) = take(length as usize)(input)?;
        let (rest, body) = Body::parse(body_bytes, msg_type)?;

        if !rest.is_empty() {
            return Err(Err::Failure(Error::new(rest, ErrorKind::Eof)));
        }

        Ok((input, Handshake { msg_type, body }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.msg_type.as_u8());
        let length_at = output.len();
        output.extend_from_slice(&[0, 0, 0]);

        self.body.serialize(output);

        let length = (output.len() - length_at - 3) as u32;
        output[length_at..length_at + 3].copy_from_slice(&length.to_be_bytes()[1..]);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    ClientHello,
    ServerHello,
    Certificate,
    ServerKeyExchange,
    ServerHelloDone, // empty
    ClientKeyExchange,
    Finished,
    Unknown(u8),
}

impl Default for MessageType {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl MessageType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => MessageType::ClientHello,
            2 => MessageType::ServerHello,
            11 => MessageType::Certificate,
            12 => MessageType::ServerKeyExchange,
            14 => MessageType::ServerHelloDone,
            16 => MessageType::ClientKeyExchange,
            20 => MessageType::Finished,
            _ => MessageType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            MessageType::ClientHello => 1,
            MessageType::ServerHello => 2,
            MessageType::Certificate => 11,
            MessageType::ServerKeyExchange => 12,
            MessageType::ServerHelloDone => 14,
            MessageType::ClientKeyExchange => 16,
            MessageType::Finished => 20,
            MessageType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], MessageType> {
        let (input, byte) = be_u8(input)?;
        Ok((input, Self::from_u8(byte)))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Body<'a> {
    ClientHello(ClientHello<'a>),
    ServerHello(ServerHello<'a>),
    Certificate(Certificate<'a>),
    ServerKeyExchange(ServerKeyExchange<'a>),
    ServerHelloDone,
    ClientKeyExchange(ClientKeyExchange<'a>),
    Finished(Finished<'a>),
}

impl<'a> Body<'a> {
    pub fn message_type(&self) -> MessageType {
        match self {
            Body::ClientHello(_) => MessageType::ClientHello,
            Body::ServerHello(_) => MessageType::ServerHello,
            Body::Certificate(_) => MessageType::Certificate,
            Body::ServerKeyExchange(_) => MessageType::ServerKeyExchange,
            Body::ServerHelloDone => MessageType::ServerHelloDone,
            Body::ClientKeyExchange(_) => MessageType::ClientKeyExchange,
            Body::Finished(_) => MessageType::Finished,
        }
    }

    pub fn parse(input: &'a [u8], m: MessageType) -> IResult<&'a [u8], Body<'a>> {
        match m {
            MessageType::ClientHello => {
                let (input, client_hello) = ClientHello::parse(input)?;
                Ok((input, Body::ClientHello(client_hello)))
            }
            MessageType::ServerHello => {
                let (input, server_hello) = ServerHello::parse(input)?;
                Ok((input, Body::ServerHello(server_hello)))
            }
            MessageType::Certificate => {
                let (input, certificate) = Certificate::parse(input)?;
                Ok((input, Body::Certificate(certificate)))
            }
            MessageType::ServerKeyExchange => {
                let (input, server_key_exchange) = ServerKeyExchange::parse(input)?;
                Ok((input, Body::ServerKeyExchange(server_key_exchange)))
            }
            MessageType::ServerHelloDone => Ok((input, Body::ServerHelloDone)),
            MessageType::ClientKeyExchange => {
                let (input, client_key_exchange) = ClientKeyExchange::parse(input)?;
                Ok((input, Body::ClientKeyExchange(client_key_exchange)))
            }
            MessageType::Finished => {
                let (input, finished) = Finished::parse(input)?;
                Ok((input, Body::Finished(finished)))
            }
            MessageType::Unknown(_) => Err(Err::Failure(Error::new(input, ErrorKind::Switch))),
        }
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        match self {
            Body::ClientHello(v) => v.serialize(output),
            Body::ServerHello(v) => v.serialize(output),
            Body::Certificate(v) => v.serialize(output),
            Body::ServerKeyExchange(v) => v.serialize(output),
            Body::ServerHelloDone => {}
            Body::ClientKeyExchange(v) => v.serialize(output),
            Body::Finished(v) => v.serialize(output),
        }
    }
}
