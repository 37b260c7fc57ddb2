//! Finite-state-machine types for both ends of a session.
//!
//! Transitions live in [`crate::sender`] and [`crate::receiver`]; this
//! module only names the states.
//!
//! ```text
//!  Sender:    Idle ──frame sent──▶ AwaitingAck ──matching ack──▶ Idle
//!                                    │    ▲                        │
//!                        reject /    │    │ resend                 │ no chunks left,
//!                        timeout     └────┘                        ▼ DONE sent
//!                                    │ limit hit                  Done
//!                                    ▼
//!                                 Aborted
//!
//!  Receiver:  Listening ──DONE──▶ Done
//!                 │
//!                 └──timeout limit hit──▶ Aborted
//! ```

/// State of the sending side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SenderState {
    /// Ready to build and transmit the next frame.
    #[default]
    Idle,
    /// One frame is in flight.
    AwaitingAck,
    /// All chunks acknowledged and `DONE` sent.
    Done,
    /// A retry or reject limit was hit.
    Aborted,
}

impl SenderState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SenderState::Done | SenderState::Aborted)
    }
}

/// State of the receiving side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiverState {
    /// Waiting for frames.
    #[default]
    Listening,
    /// `DONE` received.
    Done,
    /// The timeout limit was hit.
    Aborted,
}

impl ReceiverState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ReceiverState::Listening)
    }
}

impl std::fmt::Display for SenderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
