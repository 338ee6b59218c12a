use nom::error::{Error, ErrorKind};
use nom::{Err, IResult};

use super::{CurveType, NamedGroup};
use crate::util::opaque_u8;

/// ECDHE ServerKeyExchange parameters.
///
/// The engine does not sign its key share. Peer authentication is left to
/// the certificate verifier, so the signature block is absent.
#[derive(Debug, PartialEq, Eq)]
pub struct ServerKeyExchange<'a> {
    pub curve_type: CurveType,
    pub named_group: NamedGroup,
    pub public_key: &'a [u8],
}

impl<'a> ServerKeyExchange<'a> {
    pub fn new(named_group: NamedGroup, public_key: &'a [u8]) -> Self {
        ServerKeyExchange {
            curve_type: CurveType::NamedCurve,
            named_group,
            public_key,
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ServerKeyExchange<'a>> {
        let (input, curve_type) = CurveType::parse(input)?;
        if curve_type != CurveType::NamedCurve {
            return Err(Err::Failure(Error::new(input, ErrorKind::Tag)));
        }
        let (input, named_group) = NamedGroup::parse(input)?;
        let (input, public_key) = opaque_u8(input)?;
        if public_key.is_empty() {
            return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
        }

        Ok((
            input,
            ServerKeyExchange {
                curve_type,
                named_group,
                public_key,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.curve_type.as_u8());
        output.extend_from_slice(&self.named_group.as_u16().to_be_bytes());
        output.push(self.public_key.len() as u8);
        output.extend_from_slice(self.public_key);
    }
}
