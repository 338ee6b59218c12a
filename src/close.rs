//! The close_notify exchange.
//!
//! Each direction closes independently. Outbound goes
//! `Open -> Pending -> Queued -> Done`: pending once close is requested,
//! queued once the close_notify record is sealed and done once it has been
//! copied into a caller buffer. Inbound is done after the peer's close_notify
//! or a local `close_inbound`.

use crate::message::{Alert, AlertDescription, AlertLevel};
use crate::result::HandshakeStatus;
use crate::{Error, ProtocolError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outbound {
    Open,
    Pending,
    Queued,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inbound {
    Open,
    Done { received_notify: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CloseState {
    outbound: Outbound,
    inbound: Inbound,
}

impl Default for CloseState {
    fn default() -> Self {
        CloseState {
            outbound: Outbound::Open,
            inbound: Inbound::Open,
        }
    }
}

impl CloseState {
    /// Request a close_notify. Returns false if one was already requested.
    pub fn close_outbound(&mut self) -> bool {
        if self.outbound != Outbound::Open {
            return false;
        }
        self.transition_outbound(Outbound::Pending);
        true
    }

    /// A close_notify must be sealed on the next wrap.
    pub fn owes_close_notify(&self) -> bool {
        self.outbound == Outbound::Pending
    }

    /// The close_notify record is sealed and waiting in the queue.
    pub fn close_notify_queued(&mut self) {
        if self.outbound == Outbound::Pending {
            self.transition_outbound(Outbound::Queued);
        }
    }

    /// The close_notify record left the queue.
    pub fn close_notify_sent(&mut self) {
        self.transition_outbound(Outbound::Done);
    }

    /// The peer sent close_notify. We owe one back if not already closing.
    pub fn on_close_notify(&mut self) {
        self.inbound = Inbound::Done {
            received_notify: true,
        };
        if self.outbound == Outbound::Open {
            self.transition_outbound(Outbound::Pending);
        }
    }

    /// Close inbound locally.
    ///
    /// Returns whether the peer's close_notify had arrived before.
    pub fn close_inbound(&mut self) -> bool {
        match self.inbound {
            Inbound::Done { received_notify } => received_notify,
            Inbound::Open => {
                self.inbound = Inbound::Done {
                    received_notify: false,
                };
                if self.outbound == Outbound::Open {
                    self.transition_outbound(Outbound::Pending);
                }
                false
            }
        }
    }

    /// Close both directions without any exchange.
    pub fn close_all(&mut self) {
        if let Inbound::Open = self.inbound {
            self.inbound = Inbound::Done {
                received_notify: false,
            };
        }
        self.transition_outbound(Outbound::Done);
    }

    pub fn is_outbound_done(&self) -> bool {
        self.outbound == Outbound::Done
    }

    pub fn is_inbound_done(&self) -> bool {
        matches!(self.inbound, Inbound::Done { .. })
    }

    pub fn is_fully_closed(&self) -> bool {
        self.is_outbound_done() && self.is_inbound_done()
    }

    /// Next step of the close handshake for the caller.
    pub fn handshake_status(&self) -> HandshakeStatus {
        if self.is_fully_closed() {
            HandshakeStatus::NotHandshaking
        } else if !self.is_outbound_done() {
            HandshakeStatus::NeedWrap
        } else {
            HandshakeStatus::NeedUnwrap
        }
    }

    fn transition_outbound(&mut self, next: Outbound) {
        if self.outbound != next {
            trace!("Outbound {:?} -> {:?}", self.outbound, next);
            self.outbound = next;
        }
    }
}

/// What an inbound alert record asks of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AlertAction {
    CloseNotify,
    Ignore(AlertDescription),
    Fatal(AlertDescription),
}

/// Classify the plaintext of an alert record.
pub(crate) fn classify_alert(payload: &[u8]) -> Result<AlertAction, Error> {
    if payload.len() != Alert::LEN {
        return Err(ProtocolError::Decode(format!(
            "alert of {} bytes",
            payload.len()
        ))
        .into());
    }
    let (_, alert) = Alert::parse(payload)?;

    let action = match (alert.level, alert.description) {
        (_, AlertDescription::CloseNotify) => AlertAction::CloseNotify,
        (AlertLevel::Warning, description) => AlertAction::Ignore(description),
        (_, description) => AlertAction::Fatal(description),
    };
    Ok(action)
}
