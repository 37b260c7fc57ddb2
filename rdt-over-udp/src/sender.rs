//! Sending side of the stop-and-wait protocol.
//!
//! [`Sender`] is the state machine; it never touches the channel.  The
//! [`send`] driver owns the loop: it asks the machine what to transmit,
//! puts it on the channel, and feeds every receive outcome back in.
//!
//! # Stop-and-wait contract
//! - At most **one** frame is in flight at any moment.
//! - The frame for a chunk is built once; every retransmission sends the
//!   exact same bytes.
//! - On the matching ack: advance `expected_ack`, reset both counters.
//! - On any other reply: resend; `reject_count` grows toward `reject_limit`.
//! - On a silent wait: `retry_count` grows; at `retry_limit` the session
//!   aborts, otherwise resend.
//! - After the last chunk is acknowledged, `DONE` is sent once and the
//!   channel is flushed.
//!
//! The reject bound goes beyond plain rdt3.0, where only silent waits are
//! limited.  Here a peer that keeps answering `MISMATCH` is cut off after
//! `reject_limit` replies, counted apart from `retry_limit` timeouts.

use std::collections::VecDeque;

use crate::channel::{Channel, Incoming};
use crate::connection::{SessionConfig, SessionError};
use crate::frame::{self, ControlToken, Message};
use crate::seq::Seq;
use crate::state::SenderState;

/// What the driver must do after feeding an event to the [`Sender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The in-flight frame was acknowledged.
    Advanced,
    /// Transmit these bytes again (always the in-flight frame, unchanged).
    Resend(Vec<u8>),
    /// The event arrived while nothing was in flight.
    Ignored,
}

/// Counters collected over a sending session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendReport {
    /// Chunks the payload was split into.
    pub chunks: usize,
    /// Payload bytes acknowledged by the receiver.
    pub bytes_acked: usize,
    /// Frames put on the channel, first sends and resends together.
    pub transmissions: u64,
    pub retransmissions: u64,
    /// Silent waits.
    pub timeouts: u64,
    /// Replies other than the expected ack.
    pub rejects: u64,
}

/// Stop-and-wait send-side state for one session.
#[derive(Debug)]
pub struct Sender {
    state: SenderState,
    config: SessionConfig,
    /// Chunks not yet framed, in payload order.
    pending: VecDeque<Vec<u8>>,
    /// Encoded bytes of the frame awaiting its ack.
    in_flight: Option<Vec<u8>>,
    in_flight_len: usize,
    expected_ack: Seq,
    retry_count: u32,
    reject_count: u32,
    resend_pending: bool,
    report: SendReport,
}

impl Sender {
    /// Split `payload` into chunks and prepare to send them.
    pub fn new(payload: &[u8], config: SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let pending: VecDeque<Vec<u8>> = frame::chunk(payload, config.chunk_size)
            .into_iter()
            .map(<[u8]>::to_vec)
            .collect();
        let report = SendReport {
            chunks: pending.len(),
            ..SendReport::default()
        };
        Ok(Self {
            state: SenderState::Idle,
            config,
            pending,
            in_flight: None,
            in_flight_len: 0,
            expected_ack: Seq::FIRST,
            retry_count: 0,
            reject_count: 0,
            resend_pending: false,
            report,
        })
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    /// Tag of the frame in flight (or the next one to be built).
    pub fn expected_ack(&self) -> Seq {
        self.expected_ack
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn reject_count(&self) -> u32 {
        self.reject_count
    }

    /// `true` while the in-flight frame is being replayed.
    pub fn resend_pending(&self) -> bool {
        self.resend_pending
    }

    pub fn report(&self) -> SendReport {
        self.report
    }

    /// Produce the next message to transmit when idle.
    ///
    /// Returns the next frame (entering `AwaitingAck`), or the `DONE` token
    /// once every chunk is acknowledged (entering `Done`).  Returns `None`
    /// in any other state.
    pub fn next_transmission(&mut self) -> Option<Vec<u8>> {
        if self.state != SenderState::Idle {
            return None;
        }
        match self.pending.pop_front() {
            Some(chunk) => {
                let bytes = frame::encode(&chunk, self.expected_ack);
                log::debug!(
                    "[sender] → frame seq={} len={}",
                    self.expected_ack,
                    chunk.len()
                );
                self.in_flight_len = chunk.len();
                self.in_flight = Some(bytes.clone());
                self.resend_pending = false;
                self.report.transmissions += 1;
                self.state = SenderState::AwaitingAck;
                Some(bytes)
            }
            None => {
                log::info!(
                    "[sender] all {} chunk(s) acknowledged; → DONE",
                    self.report.chunks
                );
                self.state = SenderState::Done;
                Some(ControlToken::Done.as_bytes().to_vec())
            }
        }
    }

    /// Feed one receive outcome to the machine.
    ///
    /// Errors are the two exhaustion faults; the machine is `Aborted`
    /// afterwards.
    pub fn on_incoming(&mut self, incoming: Incoming) -> Result<Outcome, SessionError> {
        if self.state != SenderState::AwaitingAck {
            return Ok(Outcome::Ignored);
        }
        match incoming {
            Incoming::Timeout => self.on_timeout(),
            Incoming::Message(bytes) => match Message::classify(&bytes) {
                Message::Ack(ack) if ack == self.expected_ack => Ok(self.on_matching_ack()),
                Message::Ack(ack) => {
                    log::warn!("[sender] ← ack {} instead of {}", ack, self.expected_ack);
                    self.on_reject()
                }
                Message::Token(token) => {
                    log::warn!(
                        "[sender] ← {} while waiting for ack {}",
                        token,
                        self.expected_ack
                    );
                    self.on_reject()
                }
                Message::Frame(_) | Message::Malformed(_) => {
                    log::warn!(
                        "[sender] ← unexpected {}-byte message while waiting for ack {}",
                        bytes.len(),
                        self.expected_ack
                    );
                    self.on_reject()
                }
            },
        }
    }

    fn on_matching_ack(&mut self) -> Outcome {
        log::debug!("[sender] ← ack {}", self.expected_ack);
        self.report.bytes_acked += self.in_flight_len;
        self.expected_ack = self.expected_ack.next();
        self.retry_count = 0;
        self.reject_count = 0;
        self.resend_pending = false;
        self.in_flight = None;
        self.in_flight_len = 0;
        self.state = SenderState::Idle;
        Outcome::Advanced
    }

    fn on_timeout(&mut self) -> Result<Outcome, SessionError> {
        self.retry_count += 1;
        self.report.timeouts += 1;
        if self.retry_count >= self.config.retry_limit {
            log::error!(
                "[sender] frame {} unanswered after {} attempts; aborting",
                self.expected_ack,
                self.retry_count
            );
            self.state = SenderState::Aborted;
            return Err(SessionError::RetryLimitExceeded {
                seq: self.expected_ack,
                attempts: self.retry_count,
            });
        }
        log::warn!(
            "[sender] timeout {}/{} on frame {}",
            self.retry_count,
            self.config.retry_limit,
            self.expected_ack
        );
        Ok(self.resend())
    }

    fn on_reject(&mut self) -> Result<Outcome, SessionError> {
        self.reject_count += 1;
        self.report.rejects += 1;
        if self.reject_count >= self.config.reject_limit {
            log::error!(
                "[sender] frame {} rejected {} times; aborting",
                self.expected_ack,
                self.reject_count
            );
            self.state = SenderState::Aborted;
            return Err(SessionError::RejectLimitExceeded {
                seq: self.expected_ack,
                rejects: self.reject_count,
            });
        }
        Ok(self.resend())
    }

    fn resend(&mut self) -> Outcome {
        match &self.in_flight {
            Some(bytes) => {
                self.resend_pending = true;
                self.report.transmissions += 1;
                self.report.retransmissions += 1;
                log::debug!("[sender] → resend frame {}", self.expected_ack);
                Outcome::Resend(bytes.clone())
            }
            None => Outcome::Ignored,
        }
    }
}

/// Deliver `payload` over `channel` and return once `DONE` has been sent.
///
/// Blocks for the whole session.  On error nothing past the last
/// acknowledged chunk is known to have arrived.
pub fn send<C: Channel + ?Sized>(
    channel: &mut C,
    payload: &[u8],
    config: &SessionConfig,
) -> Result<SendReport, SessionError> {
    let mut sender = Sender::new(payload, config.clone())?;
    log::info!(
        "[sender] sending {} bytes in {} chunk(s) of up to {}",
        payload.len(),
        sender.report().chunks,
        config.chunk_size
    );

    while let Some(message) = sender.next_transmission() {
        channel.send(&message)?;
        while sender.state() == SenderState::AwaitingAck {
            let incoming = channel.receive()?;
            if let Outcome::Resend(bytes) = sender.on_incoming(incoming)? {
                channel.send(&bytes)?;
            }
        }
    }
    channel.flush()?;

    let report = sender.report();
    log::info!(
        "[sender] done: {} bytes, {} transmissions ({} resends)",
        report.bytes_acked,
        report.transmissions,
        report.retransmissions
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ScriptedChannel;

    fn ack(v: u16) -> Incoming {
        Incoming::Message(frame::encode_ack(Seq::new(v).unwrap()))
    }

    fn token(t: ControlToken) -> Incoming {
        Incoming::Message(t.as_bytes().to_vec())
    }

    fn config(chunk_size: usize) -> SessionConfig {
        SessionConfig {
            chunk_size,
            ..SessionConfig::default()
        }
    }

    #[test]
    fn initial_state() {
        let s = Sender::new(b"abc", SessionConfig::default()).unwrap();
        assert_eq!(s.state(), SenderState::Idle);
        assert_eq!(s.expected_ack(), Seq::FIRST);
        assert_eq!(s.retry_count(), 0);
        assert!(!s.resend_pending());
        assert_eq!(s.report().chunks, 1);
    }

    #[test]
    fn invalid_config_is_refused() {
        let err = Sender::new(b"abc", config(0)).unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
    }

    #[test]
    fn oversized_chunks_fail_before_anything_is_sent() {
        let mut ch = ScriptedChannel::default();
        let err = send(&mut ch, b"abc", &config(frame::MAX_CHUNK_SIZE + 1)).unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
        assert!(ch.sent().is_empty());
    }

    #[test]
    fn helloworld_two_frames_then_done() {
        let mut ch = ScriptedChannel::new([ack(1), ack(2)]);
        let report = send(&mut ch, b"HELLOWORLD", &config(5)).unwrap();

        let sent = ch.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0], frame::encode(b"HELLO", Seq::new(1).unwrap()));
        assert_eq!(sent[1], frame::encode(b"WORLD", Seq::new(2).unwrap()));
        assert_eq!(sent[2], b"DONE");
        assert_eq!(report.chunks, 2);
        assert_eq!(report.bytes_acked, 10);
        assert_eq!(report.retransmissions, 0);
    }

    #[test]
    fn empty_payload_sends_only_done() {
        let mut ch = ScriptedChannel::default();
        let report = send(&mut ch, b"", &SessionConfig::default()).unwrap();
        assert_eq!(ch.sent(), &[b"DONE".to_vec()]);
        assert_eq!(ch.receives(), 0);
        assert_eq!(report.chunks, 0);
    }

    #[test]
    fn wrong_ack_resends_identical_frame() {
        let mut ch = ScriptedChannel::new([ack(2), ack(1)]);
        let report = send(&mut ch, b"HELLO", &config(5)).unwrap();

        let sent = ch.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0], sent[1]);
        assert_eq!(sent[2], b"DONE");
        assert_eq!(report.rejects, 1);
        assert_eq!(report.retransmissions, 1);
    }

    #[test]
    fn negative_tokens_trigger_resend() {
        let mut ch = ScriptedChannel::new([
            token(ControlToken::Mismatch),
            token(ControlToken::UnicodeError),
            token(ControlToken::Timeout),
            ack(1),
        ]);
        send(&mut ch, b"x", &SessionConfig::default()).unwrap();
        let sent = ch.sent();
        assert_eq!(sent.len(), 5);
        assert!(sent[..4].iter().all(|m| m == &sent[0]));
    }

    #[test]
    fn retry_limit_aborts_after_exactly_limit_attempts() {
        let mut ch = ScriptedChannel::default(); // every wait is silent
        let err = send(&mut ch, b"lost", &SessionConfig::default()).unwrap_err();

        match err {
            SessionError::RetryLimitExceeded { seq, attempts } => {
                assert_eq!(seq, Seq::FIRST);
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        // First send plus two resends; no resend after the third timeout.
        assert_eq!(ch.sent().len(), 3);
        assert_eq!(ch.receives(), 3);
        assert!(!ch.sent().iter().any(|m| m == b"DONE"));
    }

    #[test]
    fn ack_resets_retry_count() {
        let mut ch = ScriptedChannel::new([
            Incoming::Timeout,
            Incoming::Timeout,
            ack(1),
            Incoming::Timeout,
            Incoming::Timeout,
            ack(2),
        ]);
        let report = send(&mut ch, b"HELLOWORLD", &config(5)).unwrap();
        assert_eq!(report.timeouts, 4);
        assert_eq!(report.transmissions, 6);
    }

    #[test]
    fn reject_limit_aborts() {
        let limit = SessionConfig {
            reject_limit: 4,
            ..SessionConfig::default()
        };
        let mut ch =
            ScriptedChannel::new(std::iter::repeat(token(ControlToken::Mismatch)).take(10));
        let err = send(&mut ch, b"doomed", &limit).unwrap_err();
        assert!(matches!(
            err,
            SessionError::RejectLimitExceeded { rejects: 4, .. }
        ));
        // First send plus three resends.
        assert_eq!(ch.sent().len(), 4);
    }

    #[test]
    fn timeouts_and_rejects_are_counted_separately() {
        let mut s = Sender::new(b"z", SessionConfig::default()).unwrap();
        s.next_transmission().unwrap();
        s.on_incoming(Incoming::Timeout).unwrap();
        s.on_incoming(token(ControlToken::Mismatch)).unwrap();
        s.on_incoming(Incoming::Timeout).unwrap();
        assert_eq!(s.retry_count(), 2);
        assert_eq!(s.reject_count(), 1);
        assert!(s.resend_pending());
        assert_eq!(s.state(), SenderState::AwaitingAck);

        assert_eq!(s.on_incoming(ack(1)).unwrap(), Outcome::Advanced);
        assert_eq!(s.retry_count(), 0);
        assert_eq!(s.reject_count(), 0);
        assert!(!s.resend_pending());
        assert_eq!(s.state(), SenderState::Idle);
    }

    #[test]
    fn events_outside_awaiting_ack_are_ignored() {
        let mut s = Sender::new(b"z", SessionConfig::default()).unwrap();
        assert_eq!(s.on_incoming(ack(1)).unwrap(), Outcome::Ignored);
        assert_eq!(s.expected_ack(), Seq::FIRST);
    }

    #[test]
    fn sequence_wraps_after_256_frames() {
        let payload = vec![b'a'; 300];
        let acks = (0..300u16).map(|i| ack(i % 256 + 1));
        let mut ch = ScriptedChannel::new(acks);
        send(&mut ch, &payload, &config(1)).unwrap();

        let sent = ch.sent();
        assert_eq!(sent.len(), 301);
        assert_eq!(*sent[254].last().unwrap(), 255);
        assert_eq!(*sent[255].last().unwrap(), 0); // seq 256 on the wire
        assert_eq!(*sent[256].last().unwrap(), 1);
        assert_eq!(sent[..300].iter().filter(|f| f.last() == Some(&0)).count(), 1);
    }
}
