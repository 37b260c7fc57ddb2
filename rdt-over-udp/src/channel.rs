//! The Channel Port: an unreliable, message-oriented, blocking link.
//!
//! Both state machines talk to their peer only through [`Channel`].  A
//! channel moves opaque byte messages; it may lose, corrupt, duplicate or
//! reorder them, and every receive is bounded by a timeout that surfaces as
//! [`Incoming::Timeout`] instead of an error.
//!
//! Implementations:
//! - [`MemoryChannel`]: in-process pair over `std::sync::mpsc`.
//! - [`ScriptedChannel`]: replays a fixed script; used to drive a single
//!   state machine deterministically.
//! - [`crate::socket::UdpChannel`]: blocking UDP sockets.
//! - [`crate::simulator::Simulator`]: fault-injecting wrapper around any of
//!   the above.

use std::collections::VecDeque;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use thiserror::Error;

/// Outcome of a bounded wait on the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A datagram arrived.
    Message(Vec<u8>),
    /// Nothing arrived within the configured wait.
    Timeout,
}

/// Fatal transport failures.  Timeouts are **not** errors.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid channel address: {0}")]
    Address(String),
}

/// Blocking send / receive-with-timeout of byte messages.
pub trait Channel {
    /// Best-effort send; delivery is not confirmed.
    fn send(&mut self, message: &[u8]) -> Result<(), ChannelError>;

    /// Wait for the next message, up to the channel's timeout.
    fn receive(&mut self) -> Result<Incoming, ChannelError>;

    /// Push out anything the channel is still holding back.  Called once a
    /// session has sent its last message.
    fn flush(&mut self) -> Result<(), ChannelError> {
        Ok(())
    }
}

impl<C: Channel + ?Sized> Channel for &mut C {
    fn send(&mut self, message: &[u8]) -> Result<(), ChannelError> {
        (**self).send(message)
    }

    fn receive(&mut self) -> Result<Incoming, ChannelError> {
        (**self).receive()
    }

    fn flush(&mut self) -> Result<(), ChannelError> {
        (**self).flush()
    }
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn send(&mut self, message: &[u8]) -> Result<(), ChannelError> {
        (**self).send(message)
    }

    fn receive(&mut self) -> Result<Incoming, ChannelError> {
        (**self).receive()
    }

    fn flush(&mut self) -> Result<(), ChannelError> {
        (**self).flush()
    }
}

// ---------------------------------------------------------------------------
// MemoryChannel
// ---------------------------------------------------------------------------

/// One end of an in-process channel pair.
///
/// Delivery is lossless and ordered; wrap it in a
/// [`crate::simulator::Simulator`] to add faults.  Once the peer end is
/// dropped, sends are discarded and receives wait out the timeout, which is
/// what a departed peer looks like on a datagram network.
#[derive(Debug)]
pub struct MemoryChannel {
    tx: mpsc::Sender<Vec<u8>>,
    rx: mpsc::Receiver<Vec<u8>>,
    timeout: Duration,
}

impl MemoryChannel {
    /// Create two connected ends sharing the same receive timeout.
    pub fn pair(timeout: Duration) -> (MemoryChannel, MemoryChannel) {
        let (a_tx, b_rx) = mpsc::channel();
        let (b_tx, a_rx) = mpsc::channel();
        (
            MemoryChannel {
                tx: a_tx,
                rx: a_rx,
                timeout,
            },
            MemoryChannel {
                tx: b_tx,
                rx: b_rx,
                timeout,
            },
        )
    }

    /// Change this end's receive timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }
}

impl Channel for MemoryChannel {
    fn send(&mut self, message: &[u8]) -> Result<(), ChannelError> {
        if self.tx.send(message.to_vec()).is_err() {
            log::trace!("[mem] peer gone; dropping {} bytes", message.len());
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<Incoming, ChannelError> {
        match self.rx.recv_timeout(self.timeout) {
            Ok(message) => Ok(Incoming::Message(message)),
            Err(RecvTimeoutError::Timeout) => Ok(Incoming::Timeout),
            Err(RecvTimeoutError::Disconnected) => {
                thread::sleep(self.timeout);
                Ok(Incoming::Timeout)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptedChannel
// ---------------------------------------------------------------------------

/// A channel that replays a fixed list of receive outcomes and records every
/// message sent through it.
///
/// When the script runs out every further receive reports
/// [`Incoming::Timeout`].
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    script: VecDeque<Incoming>,
    sent: Vec<Vec<u8>>,
    receives: usize,
}

impl ScriptedChannel {
    pub fn new(script: impl IntoIterator<Item = Incoming>) -> Self {
        Self {
            script: script.into_iter().collect(),
            sent: Vec::new(),
            receives: 0,
        }
    }

    /// Append one more outcome to the script.
    pub fn push(&mut self, incoming: Incoming) {
        self.script.push_back(incoming);
    }

    /// Every message sent so far, oldest first.
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// Number of `receive` calls made so far.
    pub fn receives(&self) -> usize {
        self.receives
    }
}

impl Channel for ScriptedChannel {
    fn send(&mut self, message: &[u8]) -> Result<(), ChannelError> {
        self.sent.push(message.to_vec());
        Ok(())
    }

    fn receive(&mut self) -> Result<Incoming, ChannelError> {
        self.receives += 1;
        Ok(self.script.pop_front().unwrap_or(Incoming::Timeout))
    }
}
