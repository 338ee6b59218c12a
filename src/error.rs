use thiserror::Error;

use crate::message::{AlertDescription, ProtocolVersion};

/// Errors returned by the engine.
///
/// Whether an error is fatal depends on where it came from. A fatal error
/// closes the engine and is replayed by every later `wrap`/`unwrap`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A protocol rule was broken, either by the peer or by the caller.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The peer sent a fatal alert.
    #[error("peer sent fatal alert: {0:?}")]
    PeerAlert(AlertDescription),

    /// The certificate verifier rejected the peer chain.
    #[error("certificate error: {0}")]
    CertificateError(String),

    /// A cryptographic operation failed.
    #[error("crypto error: {0}")]
    CryptoError(String),

    /// Ciphertext was supplied after the inbound side was closed.
    #[error("inbound side is closed")]
    InboundClosed,

    /// Inbound was closed without receiving the peer's close_notify.
    #[error("inbound closed before receiving close_notify")]
    InboundTruncated,

    /// The configuration is invalid.
    #[error("config error: {0}")]
    ConfigError(String),
}

/// Record and handshake level faults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("handshake not started")]
    NotStarted,

    #[error("engine is closed")]
    EngineClosed,

    #[error("renegotiation is not supported")]
    Renegotiation,

    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("unexpected content type {0}")]
    UnexpectedContentType(u8),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("bad protocol version {0:?}")]
    BadProtocolVersion(ProtocolVersion),

    #[error("record too big ({0} bytes)")]
    RecordOverflow(usize),

    #[error("bad record mac")]
    BadRecordMac,

    #[error("illegal parameter: {0}")]
    IllegalParameter(String),

    #[error("no cipher suite in common")]
    NoCommonCipherSuite,

    #[error("finished verify data mismatch")]
    BadFinished,
}

impl Error {
    /// The fatal alert to send to the peer when failing with this error.
    ///
    /// `None` when the peer already sent an alert or no alert applies.
    pub fn alert(&self) -> Option<AlertDescription> {
        let desc = match self {
            Error::Protocol(p) => match p {
                ProtocolError::NotStarted
                | ProtocolError::EngineClosed
                | ProtocolError::Renegotiation => return None,
                ProtocolError::UnexpectedMessage(_) => AlertDescription::UnexpectedMessage,
                ProtocolError::UnexpectedContentType(_) => AlertDescription::UnexpectedMessage,
                ProtocolError::Decode(_) => AlertDescription::DecodeError,
                ProtocolError::BadProtocolVersion(_) => AlertDescription::ProtocolVersion,
                ProtocolError::RecordOverflow(_) => AlertDescription::RecordOverflow,
                ProtocolError::BadRecordMac => AlertDescription::BadRecordMac,
                ProtocolError::IllegalParameter(_) => AlertDescription::IllegalParameter,
                ProtocolError::NoCommonCipherSuite => AlertDescription::HandshakeFailure,
                ProtocolError::BadFinished => AlertDescription::DecryptError,
            },
            Error::PeerAlert(_) => return None,
            Error::CertificateError(_) => AlertDescription::BadCertificate,
            Error::CryptoError(_) => AlertDescription::InternalError,
            Error::InboundClosed | Error::InboundTruncated | Error::ConfigError(_) => return None,
        };
        Some(desc)
    }
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(value: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        let msg = match value {
            nom::Err::Incomplete(_) => "incomplete".to_string(),
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                format!("{:?} with {} bytes left", e.code, e.input.len())
            }
        };
        Error::Protocol(ProtocolError::Decode(msg))
    }
}
