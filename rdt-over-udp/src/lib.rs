//! `rdt-over-udp`: stop-and-wait reliable delivery over a lossy datagram
//! channel (the classic "rdt3.0" protocol).
//!
//! # Architecture
//!
//! ```text
//!  payload bytes                                   output sink
//!       │                                               ▲
//!  ┌────▼─────┐    frames (chunk|checksum|seq)    ┌─────┴────┐
//!  │  Sender  │──────────────────────────────────▶│ Receiver │
//!  │          │◀──────────────────────────────────│          │
//!  └────┬─────┘    acks (1 byte) / control tokens └─────┬────┘
//!       │                                               │
//!  ┌────▼───────────────────────────────────────────────▼────┐
//!  │             Channel (send / receive-with-timeout)       │
//!  │   MemoryChannel │ UdpChannel │ Simulator<any channel>   │
//!  └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`seq`]       : cyclic sequence tags over `1..=256`
//! - [`checksum`]  : 9-byte additive digest
//! - [`frame`]     : chunking, frame wire format, acks, control tokens
//! - [`channel`]   : the channel trait plus in-memory and scripted channels
//! - [`socket`]    : blocking UDP channel
//! - [`simulator`] : loss / corruption / duplication / reorder injection
//! - [`connection`]: session configuration and errors
//! - [`state`]     : finite-state-machine types
//! - [`sender`]    : send-side state machine and driver
//! - [`receiver`]  : receive-side state machine and driver

pub mod channel;
pub mod checksum;
pub mod connection;
pub mod frame;
pub mod receiver;
pub mod sender;
pub mod seq;
pub mod simulator;
pub mod socket;
pub mod state;

pub use channel::{Channel, ChannelError, Incoming, MemoryChannel, ScriptedChannel};
pub use connection::{Encoding, SessionConfig, SessionError};
pub use receiver::{receive, ReceiveReport};
pub use sender::{send, SendReport};
pub use seq::Seq;
pub use simulator::{Simulator, SimulatorConfig};
pub use socket::{UdpChannel, UdpConfig};
