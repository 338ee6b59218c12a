use nom::error::{Error, ErrorKind};
use nom::{Err, IResult};
use tinyvec::ArrayVec;

use crate::util::opaque_u24;

/// Most certificates a Certificate message carries.
pub const MAX_CERTIFICATES: usize = 16;

/// Certificate message. The entries are opaque DER blobs; the engine never
/// looks inside them, that is the certificate verifier's business.
#[derive(Debug, PartialEq, Eq)]
pub struct Certificate<'a> {
    pub certificate_list: ArrayVec<[&'a [u8]; MAX_CERTIFICATES]>,
}

impl<'a> Certificate<'a> {
    pub fn new(certificate_list: ArrayVec<[&'a [u8]; MAX_CERTIFICATES]>) -> Self {
        Certificate { certificate_list }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Certificate<'a>> {
        let (rest, mut list) = opaque_u24(input)?;
        let mut certificate_list = ArrayVec::new();

        while !list.is_empty() {
            let (more, cert) = opaque_u24(list)?;
            if certificate_list.len() == certificate_list.capacity() {
                return Err(Err::Failure(Error::new(list, ErrorKind::TooLarge)));
            }
            certificate_list.push(cert);
            list = more;
        }

        Ok((rest, Certificate { certificate_list }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        let total_len: usize = self
            .certificate_list
            .iter()
            .map(|cert| 3 + cert.len())
            .sum();
        output.extend_from_slice(&(total_len as u32).to_be_bytes()[1..]);

        for cert in &self.certificate_list {
            output.extend_from_slice(&(cert.len() as u32).to_be_bytes()[1..]);
            output.extend_from_slice(cert);
        }
    }
}
