//! Wire-format definitions for everything exchanged between the peers.
//!
//! Three kinds of datagram travel over the channel:
//! - **Frames** (sender → receiver) carrying one payload chunk.
//! - **Acks** (receiver → sender), a single byte equal to the acknowledged
//!   sequence tag.
//! - **Control tokens**, short ASCII literals used for session control.
//!
//! No I/O happens here; this is pure data transformation.
//!
//! # Frame layout
//!
//! ```text
//! +---------------------------- ... ---+----------------------+-----+
//! |        payload (0..=chunk_size)    |  checksum (9 bytes)  | seq |
//! +---------------------------- ... ---+----------------------+-----+
//! ```
//!
//! The suffix is read at fixed offsets from the end: the last byte is the
//! sequence tag and the nine bytes before it are the checksum.  A frame is
//! therefore never shorter than [`SUFFIX_LEN`] = 10 bytes, while every
//! control token is shorter, which keeps the two unambiguous.

use thiserror::Error;

use crate::checksum::{self, CHECKSUM_LEN};
use crate::seq::Seq;

/// Default payload bytes per frame.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Checksum plus sequence tag.
pub const SUFFIX_LEN: usize = CHECKSUM_LEN + 1;

/// Largest chunk whose frame still fits one IPv4 UDP datagram (65 507 bytes).
pub const MAX_CHUNK_SIZE: usize = 65_507 - SUFFIX_LEN;

/// Length of an encoded ack.
pub const ACK_LEN: usize = 1;

/// Errors that can arise when parsing a raw frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer bytes than the checksum and tag need.
    #[error("frame too short: {0} bytes, need at least {}", SUFFIX_LEN)]
    TooShort(usize),
}

// ---------------------------------------------------------------------------
// Chunking
// ---------------------------------------------------------------------------

/// Split `payload` into consecutive slices of at most `chunk_size` bytes.
///
/// Every slice but the last is exactly `chunk_size` long; an empty payload
/// yields no chunks.
///
/// # Panics
///
/// Panics if `chunk_size` is zero.
pub fn chunk(payload: &[u8], chunk_size: usize) -> Vec<&[u8]> {
    assert!(chunk_size > 0, "chunk_size must be at least 1");
    payload.chunks(chunk_size).collect()
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// One decoded data frame.
///
/// `checksum` is the value found on the wire; call [`Frame::is_intact`] to
/// compare it against the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub payload: Vec<u8>,
    pub checksum: [u8; CHECKSUM_LEN],
    pub seq: Seq,
}

impl Frame {
    /// Build a frame for `payload`, computing its checksum.
    pub fn new(payload: &[u8], seq: Seq) -> Self {
        Self {
            payload: payload.to_vec(),
            checksum: checksum::compute(payload),
            seq,
        }
    }

    /// Serialise as `payload || checksum || seq`.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.payload.len() + SUFFIX_LEN);
        buf.extend_from_slice(&self.payload);
        buf.extend_from_slice(&self.checksum);
        buf.push(self.seq.to_wire());
        buf
    }

    /// `true` when the carried checksum matches the payload.
    pub fn is_intact(&self) -> bool {
        checksum::verify(&self.payload, &self.checksum)
    }
}

/// Encode `chunk` with its checksum and tag.
pub fn encode(chunk: &[u8], seq: Seq) -> Vec<u8> {
    Frame::new(chunk, seq).encode()
}

/// Split `wire` at fixed offsets into payload, checksum and tag.
///
/// Does **not** verify the checksum.
pub fn decode(wire: &[u8]) -> Result<Frame, FrameError> {
    if wire.len() < SUFFIX_LEN {
        return Err(FrameError::TooShort(wire.len()));
    }
    let payload_end = wire.len() - SUFFIX_LEN;
    let mut checksum = [0u8; CHECKSUM_LEN];
    checksum.copy_from_slice(&wire[payload_end..payload_end + CHECKSUM_LEN]);
    Ok(Frame {
        payload: wire[..payload_end].to_vec(),
        checksum,
        seq: Seq::from_wire(wire[wire.len() - 1]),
    })
}

// ---------------------------------------------------------------------------
// Control tokens and acks
// ---------------------------------------------------------------------------

/// Out-of-band session control messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlToken {
    /// Sender has no more data.
    Done,
    /// Receiver waited for a frame and got nothing.
    Timeout,
    /// Receiver could not decode a payload in the expected encoding.
    UnicodeError,
    /// Receiver rejected a frame (bad checksum or unexpected tag).
    Mismatch,
}

impl ControlToken {
    pub const ALL: [ControlToken; 4] = [
        ControlToken::Done,
        ControlToken::Timeout,
        ControlToken::UnicodeError,
        ControlToken::Mismatch,
    ];

    /// ASCII literal sent on the wire.
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            ControlToken::Done => b"DONE",
            ControlToken::Timeout => b"Timeout",
            ControlToken::UnicodeError => b"Unicode",
            ControlToken::Mismatch => b"NotSame",
        }
    }

    /// Recognise a control token; anything else is `None`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_bytes() == bytes)
    }
}

impl std::fmt::Display for ControlToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ControlToken::Done => "DONE",
            ControlToken::Timeout => "TIMEOUT",
            ControlToken::UnicodeError => "UNICODE_ERROR",
            ControlToken::Mismatch => "MISMATCH",
        })
    }
}

/// Encode an acknowledgement for `seq`: one byte whose content is the tag.
pub fn encode_ack(seq: Seq) -> Vec<u8> {
    vec![seq.to_wire()]
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// An inbound datagram after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Token(ControlToken),
    Ack(Seq),
    Frame(Frame),
    /// Not a token and too short to be a frame.
    Malformed(Vec<u8>),
}

impl Message {
    /// Classify raw bytes.  Tokens are matched before any frame decoding is
    /// attempted.
    pub fn classify(bytes: &[u8]) -> Self {
        if let Some(token) = ControlToken::from_bytes(bytes) {
            return Message::Token(token);
        }
        if bytes.len() == ACK_LEN {
            return Message::Ack(Seq::from_wire(bytes[0]));
        }
        match decode(bytes) {
            Ok(frame) => Message::Frame(frame),
            Err(_) => Message::Malformed(bytes.to_vec()),
        }
    }
}
