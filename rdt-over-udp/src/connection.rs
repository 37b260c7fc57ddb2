//! Per-session configuration and the session error taxonomy.
//!
//! A session is one sender or one receiver run from start to `DONE` (or to
//! a fatal abort).  Both sides take a [`SessionConfig`]; each side only
//! reads the fields that concern it.
//!
//! Transient faults (timeouts, corruption, stale duplicates) are handled
//! inside the state machines and never reach the caller.  What does reach
//! the caller is a [`SessionError`]: an exhausted limit, a broken channel,
//! or an output sink that refused bytes.  After an abort, delivery is only
//! confirmed up to the last acknowledged chunk.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::channel::ChannelError;
use crate::frame::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
use crate::seq::Seq;

/// Consecutive silent waits the sender tolerates for one frame.
pub const RETRY_LIMIT: u32 = 3;

/// Consecutive negative replies the sender tolerates for one frame.
pub const REJECT_LIMIT: u32 = 8;

/// Consecutive silent waits the receiver tolerates.
pub const TIMEOUT_LIMIT: u32 = 2;

/// How the receiver must be able to interpret each payload before it is
/// delivered.  A chunk that fails the check is answered with
/// `UNICODE_ERROR` and not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Any bytes are accepted.
    #[default]
    Bytes,
    /// Only 7-bit ASCII.
    Ascii,
    /// Each chunk must be valid UTF-8 on its own.
    Utf8,
}

impl Encoding {
    /// `true` when `payload` is acceptable under this encoding.
    pub fn accepts(self, payload: &[u8]) -> bool {
        match self {
            Encoding::Bytes => true,
            Encoding::Ascii => payload.is_ascii(),
            Encoding::Utf8 => std::str::from_utf8(payload).is_ok(),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Encoding::Bytes => "bytes",
            Encoding::Ascii => "ascii",
            Encoding::Utf8 => "utf8",
        })
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bytes" | "binary" => Ok(Encoding::Bytes),
            "ascii" => Ok(Encoding::Ascii),
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            other => Err(format!("unknown encoding '{other}' (bytes, ascii, utf8)")),
        }
    }
}

/// Tunables for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum payload bytes per frame.
    pub chunk_size: usize,
    /// Sender: silent waits for one frame before aborting.
    pub retry_limit: u32,
    /// Sender: negative replies for one frame before aborting.
    pub reject_limit: u32,
    /// Receiver: consecutive silent waits before aborting.
    pub timeout_limit: u32,
    /// Receiver: payload check applied before delivery.
    pub encoding: Encoding,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry_limit: RETRY_LIMIT,
            reject_limit: REJECT_LIMIT,
            timeout_limit: TIMEOUT_LIMIT,
            encoding: Encoding::Bytes,
        }
    }
}

/// Why a session ended without reaching `DONE`.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Every transmission of `seq` went unanswered.
    #[error("no reply for frame {seq} after {attempts} attempts")]
    RetryLimitExceeded { seq: Seq, attempts: u32 },

    /// The receiver kept rejecting frame `seq`.
    #[error("frame {seq} rejected {rejects} times in a row")]
    RejectLimitExceeded { seq: Seq, rejects: u32 },

    /// The receiver heard nothing for too long; the sender is presumed gone.
    #[error("sender silent for {waits} consecutive waits")]
    TimeoutLimitExceeded { waits: u32 },

    /// The session configuration cannot work.
    #[error("invalid session configuration: {0}")]
    Config(&'static str),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Delivered bytes could not be written out.
    #[error("output error: {0}")]
    Output(#[source] std::io::Error),
}

impl SessionConfig {
    /// Reject configurations that would never terminate or never send.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.chunk_size == 0 {
            return Err(SessionError::Config("chunk_size must be at least 1"));
        }
        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(SessionError::Config(
                "chunk_size too large for a single UDP datagram",
            ));
        }
        if self.retry_limit == 0 {
            return Err(SessionError::Config("retry_limit must be at least 1"));
        }
        if self.reject_limit == 0 {
            return Err(SessionError::Config("reject_limit must be at least 1"));
        }
        if self.timeout_limit == 0 {
            return Err(SessionError::Config("timeout_limit must be at least 1"));
        }
        Ok(())
    }
}
