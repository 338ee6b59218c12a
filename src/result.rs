/// Outcome of a `wrap` or `unwrap` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The operation completed.
    Ok,
    /// The engine is closed in the direction of the operation.
    Closed,
    /// More inbound bytes are needed to make progress.
    BufferUnderflow,
    /// The destination cannot hold the next record or plaintext.
    BufferOverflow,
}

/// What the caller should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    /// No handshake or close handshake is in progress.
    NotHandshaking,
    /// Call `wrap` to produce bytes for the peer.
    NeedWrap,
    /// Call `unwrap` with bytes from the peer.
    NeedUnwrap,
    /// Drain and run `Engine::delegated_task`.
    NeedTask,
    /// The handshake completed during this call. Reported once.
    Finished,
}

/// Result of a single `wrap` or `unwrap` call.
///
/// The caller advances its own cursors by `bytes_produced` and
/// `bytes_consumed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationResult {
    status: Status,
    handshake_status: HandshakeStatus,
    bytes_produced: usize,
    bytes_consumed: usize,
}

impl OperationResult {
    pub fn new(
        status: Status,
        handshake_status: HandshakeStatus,
        bytes_produced: usize,
        bytes_consumed: usize,
    ) -> Self {
        OperationResult {
            status,
            handshake_status,
            bytes_produced,
            bytes_consumed,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn handshake_status(&self) -> HandshakeStatus {
        self.handshake_status
    }

    pub fn bytes_produced(&self) -> usize {
        self.bytes_produced
    }

    pub fn bytes_consumed(&self) -> usize {
        self.bytes_consumed
    }
}

impl std::fmt::Display for OperationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?}/{:?} produced={} consumed={}",
            self.status, self.handshake_status, self.bytes_produced, self.bytes_consumed
        )
    }
}
