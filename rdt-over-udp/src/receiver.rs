//! Receiving side of the stop-and-wait protocol.
//!
//! [`Receiver`] validates each inbound message and decides what to do with
//! it; the [`receive`] driver carries out that decision (write payload,
//! send reply) and keeps listening until `DONE`.
//!
//! For a frame whose checksum verifies, with `curr` the expected tag:
//! - `seq == curr`: new data: deliver it once, ack `curr`, advance.
//! - `seq` before `curr`: a retransmission caused by a lost ack: ack the
//!   frame's own `seq` again so the sender can move on; deliver nothing.
//! - anything else, or a bad checksum: reply `MISMATCH`; state unchanged.
//!
//! A frame is delivered whole or not at all, and a tag is delivered at most
//! once per pass through the sequence space.

use std::io::Write;

use crate::channel::{Channel, Incoming};
use crate::connection::{SessionConfig, SessionError};
use crate::frame::{self, ControlToken, Frame, Message};
use crate::seq::Seq;
use crate::state::ReceiverState;

/// What the driver must do after feeding an event to the [`Receiver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write `payload` to the output, then send `ack`.
    Deliver { payload: Vec<u8>, ack: Vec<u8> },
    /// Send `reply` and keep listening.
    Reply(Vec<u8>),
    /// Nothing to send.
    Drop,
    /// `DONE` arrived; the session is over.
    Finished,
    /// Send `reply`, then give up: the sender has been silent `waits` times.
    Abandon { reply: Vec<u8>, waits: u32 },
}

/// Counters collected over a receiving session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveReport {
    pub frames_delivered: u64,
    pub bytes_delivered: u64,
    /// Already-delivered frames that were re-acknowledged.
    pub duplicates: u64,
    /// Frames answered with `MISMATCH`.
    pub mismatches: u64,
    /// Frames answered with `UNICODE_ERROR`.
    pub encoding_errors: u64,
    pub timeouts: u64,
    /// Messages ignored (stray acks and tokens).
    pub dropped: u64,
}

/// Receive-side state for one session.
#[derive(Debug)]
pub struct Receiver {
    state: ReceiverState,
    config: SessionConfig,
    expected_seq: Seq,
    timeout_count: u32,
    report: ReceiveReport,
}

impl Receiver {
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self {
            state: ReceiverState::Listening,
            config,
            expected_seq: Seq::FIRST,
            timeout_count: 0,
            report: ReceiveReport::default(),
        })
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    pub fn expected_seq(&self) -> Seq {
        self.expected_seq
    }

    pub fn timeout_count(&self) -> u32 {
        self.timeout_count
    }

    pub fn report(&self) -> ReceiveReport {
        self.report
    }

    /// Decide how to handle one receive outcome.
    pub fn on_incoming(&mut self, incoming: Incoming) -> Action {
        if self.state.is_terminal() {
            return Action::Drop;
        }
        match incoming {
            Incoming::Timeout => self.on_timeout(),
            Incoming::Message(bytes) => match Message::classify(&bytes) {
                Message::Token(ControlToken::Done) => {
                    log::info!("[receiver] ← DONE");
                    self.state = ReceiverState::Done;
                    Action::Finished
                }
                Message::Token(token) => {
                    log::warn!("[receiver] ← stray {token}; ignoring");
                    self.report.dropped += 1;
                    Action::Drop
                }
                Message::Ack(seq) => {
                    log::warn!("[receiver] ← stray ack {seq}; ignoring");
                    self.report.dropped += 1;
                    Action::Drop
                }
                Message::Frame(frame) => self.on_frame(frame),
                Message::Malformed(raw) => {
                    log::warn!("[receiver] ← malformed {}-byte message", raw.len());
                    self.mismatch()
                }
            },
        }
    }

    fn on_frame(&mut self, frame: Frame) -> Action {
        let curr = self.expected_seq;
        let intact = frame.is_intact();

        if intact && frame.seq == curr {
            if !self.config.encoding.accepts(&frame.payload) {
                log::warn!(
                    "[receiver] frame {} is not valid {}; requesting resend",
                    curr,
                    self.config.encoding
                );
                self.report.encoding_errors += 1;
                return Action::Reply(ControlToken::UnicodeError.as_bytes().to_vec());
            }
            log::debug!(
                "[receiver] ← frame seq={} len={}; → ack {}",
                curr,
                frame.payload.len(),
                curr
            );
            self.expected_seq = curr.next();
            self.timeout_count = 0;
            self.report.frames_delivered += 1;
            self.report.bytes_delivered += frame.payload.len() as u64;
            return Action::Deliver {
                payload: frame.payload,
                ack: frame::encode_ack(curr),
            };
        }

        if intact && frame.seq.is_before(curr) {
            log::info!(
                "[receiver] ← frame {} again (expecting {}); re-acking",
                frame.seq,
                curr
            );
            self.timeout_count = 0;
            self.report.duplicates += 1;
            return Action::Reply(frame::encode_ack(frame.seq));
        }

        if intact {
            log::warn!("[receiver] ← frame {} instead of {}", frame.seq, curr);
        } else {
            log::warn!("[receiver] ← frame {} failed checksum", frame.seq);
        }
        self.mismatch()
    }

    fn mismatch(&mut self) -> Action {
        self.report.mismatches += 1;
        Action::Reply(ControlToken::Mismatch.as_bytes().to_vec())
    }

    fn on_timeout(&mut self) -> Action {
        self.timeout_count += 1;
        self.report.timeouts += 1;
        let reply = ControlToken::Timeout.as_bytes().to_vec();
        if self.timeout_count >= self.config.timeout_limit {
            log::error!(
                "[receiver] nothing from sender for {} waits; giving up",
                self.timeout_count
            );
            self.state = ReceiverState::Aborted;
            return Action::Abandon {
                reply,
                waits: self.timeout_count,
            };
        }
        log::warn!(
            "[receiver] timeout {}/{} waiting for frame {}",
            self.timeout_count,
            self.config.timeout_limit,
            self.expected_seq
        );
        Action::Reply(reply)
    }
}

/// Listen on `channel` until `DONE`, writing each delivered chunk to
/// `output` as soon as it is validated.
pub fn receive<C, W>(
    channel: &mut C,
    output: &mut W,
    config: &SessionConfig,
) -> Result<ReceiveReport, SessionError>
where
    C: Channel + ?Sized,
    W: Write + ?Sized,
{
    let mut receiver = Receiver::new(config.clone())?;
    log::info!("[receiver] listening (encoding={})", config.encoding);

    loop {
        let incoming = channel.receive()?;
        match receiver.on_incoming(incoming) {
            Action::Deliver { payload, ack } => {
                output
                    .write_all(&payload)
                    .and_then(|()| output.flush())
                    .map_err(SessionError::Output)?;
                channel.send(&ack)?;
            }
            Action::Reply(reply) => channel.send(&reply)?,
            Action::Drop => {}
            Action::Finished => break,
            Action::Abandon { reply, waits } => {
                channel.send(&reply)?;
                channel.flush()?;
                return Err(SessionError::TimeoutLimitExceeded { waits });
            }
        }
    }
    channel.flush()?;

    let report = receiver.report();
    log::info!(
        "[receiver] done: {} bytes in {} frame(s), {} duplicate(s), {} mismatch(es)",
        report.bytes_delivered,
        report.frames_delivered,
        report.duplicates,
        report.mismatches
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ScriptedChannel;
    use crate::connection::Encoding;

    fn seq(v: u16) -> Seq {
        Seq::new(v).unwrap()
    }

    fn data(payload: &[u8], tag: u16) -> Incoming {
        Incoming::Message(frame::encode(payload, seq(tag)))
    }

    fn done() -> Incoming {
        Incoming::Message(ControlToken::Done.as_bytes().to_vec())
    }

    fn ack(tag: u16) -> Vec<u8> {
        frame::encode_ack(seq(tag))
    }

    fn run(
        script: Vec<Incoming>,
        config: &SessionConfig,
    ) -> (Result<ReceiveReport, SessionError>, Vec<u8>, ScriptedChannel) {
        let mut ch = ScriptedChannel::new(script);
        let mut out = Vec::new();
        let result = receive(&mut ch, &mut out, config);
        (result, out, ch)
    }

    #[test]
    fn initial_state() {
        let r = Receiver::new(SessionConfig::default()).unwrap();
        assert_eq!(r.state(), ReceiverState::Listening);
        assert_eq!(r.expected_seq(), Seq::FIRST);
        assert_eq!(r.timeout_count(), 0);
    }

    #[test]
    fn helloworld_delivered_in_order() {
        let (result, out, ch) = run(
            vec![data(b"HELLO", 1), data(b"WORLD", 2), done()],
            &SessionConfig::default(),
        );
        let report = result.unwrap();
        assert_eq!(out, b"HELLOWORLD");
        assert_eq!(ch.sent(), &[ack(1), ack(2)]);
        assert_eq!(report.frames_delivered, 2);
    }

    #[test]
    fn duplicate_is_reacked_not_redelivered() {
        let (result, out, ch) = run(
            vec![data(b"HELLO", 1), data(b"HELLO", 1), data(b"WORLD", 2), done()],
            &SessionConfig::default(),
        );
        assert_eq!(result.unwrap().duplicates, 1);
        assert_eq!(out, b"HELLOWORLD");
        assert_eq!(ch.sent(), &[ack(1), ack(1), ack(2)]);
    }

    #[test]
    fn corrupted_frame_is_never_delivered() {
        let mut bad = frame::encode(b"HELLO", seq(1));
        bad[0] ^= 0x20;
        let (result, out, ch) = run(
            vec![Incoming::Message(bad), data(b"HELLO", 1), done()],
            &SessionConfig::default(),
        );
        assert_eq!(result.unwrap().mismatches, 1);
        assert_eq!(out, b"HELLO");
        assert_eq!(ch.sent(), &[b"NotSame".to_vec(), ack(1)]);
    }

    #[test]
    fn future_frame_is_a_mismatch() {
        let mut r = Receiver::new(SessionConfig::default()).unwrap();
        assert_eq!(
            r.on_incoming(data(b"skip", 2)),
            Action::Reply(b"NotSame".to_vec())
        );
        assert_eq!(r.expected_seq(), Seq::FIRST);
    }

    #[test]
    fn malformed_message_is_a_mismatch() {
        let mut r = Receiver::new(SessionConfig::default()).unwrap();
        assert_eq!(
            r.on_incoming(Incoming::Message(b"short".to_vec())),
            Action::Reply(b"NotSame".to_vec())
        );
    }

    #[test]
    fn stray_tokens_and_acks_are_dropped() {
        let (result, out, ch) = run(
            vec![
                Incoming::Message(b"NotSame".to_vec()),
                Incoming::Message(ack(1)),
                done(),
            ],
            &SessionConfig::default(),
        );
        assert_eq!(result.unwrap().dropped, 2);
        assert!(out.is_empty());
        assert!(ch.sent().is_empty());
    }

    #[test]
    fn timeout_limit_aborts_after_exactly_limit_waits() {
        let (result, out, ch) = run(vec![], &SessionConfig::default());
        assert!(matches!(
            result,
            Err(SessionError::TimeoutLimitExceeded { waits: 2 })
        ));
        assert!(out.is_empty());
        assert_eq!(ch.receives(), 2);
        assert_eq!(ch.sent(), &[b"Timeout".to_vec(), b"Timeout".to_vec()]);
    }

    #[test]
    fn valid_frame_resets_timeout_count() {
        let (result, out, _ch) = run(
            vec![
                Incoming::Timeout,
                data(b"a", 1),
                Incoming::Timeout,
                data(b"b", 2),
                Incoming::Timeout,
                done(),
            ],
            &SessionConfig::default(),
        );
        assert_eq!(result.unwrap().timeouts, 3);
        assert_eq!(out, b"ab");
    }

    #[test]
    fn non_ascii_payload_requests_resend() {
        let config = SessionConfig {
            encoding: Encoding::Ascii,
            ..SessionConfig::default()
        };
        let (result, out, ch) = run(
            vec![data("naïve".as_bytes(), 1), data(b"naive", 1), done()],
            &config,
        );
        assert_eq!(result.unwrap().encoding_errors, 1);
        assert_eq!(out, b"naive");
        assert_eq!(ch.sent(), &[b"Unicode".to_vec(), ack(1)]);
    }

    #[test]
    fn stale_frame_across_wraparound_is_reacked() {
        let mut r = Receiver::new(SessionConfig::default()).unwrap();
        for tag in 1..=256u16 {
            assert!(matches!(
                r.on_incoming(data(b"x", tag)),
                Action::Deliver { .. }
            ));
        }
        assert_eq!(r.expected_seq(), Seq::FIRST);

        // The ack for 256 was lost and the sender retransmitted it.
        assert_eq!(r.on_incoming(data(b"x", 256)), Action::Reply(vec![0]));
        assert_eq!(r.expected_seq(), Seq::FIRST);
        assert_eq!(r.report().frames_delivered, 256);
    }

    #[test]
    fn done_ends_session_and_later_events_are_dropped() {
        let mut r = Receiver::new(SessionConfig::default()).unwrap();
        assert_eq!(r.on_incoming(done()), Action::Finished);
        assert_eq!(r.state(), ReceiverState::Done);
        assert_eq!(r.on_incoming(data(b"late", 1)), Action::Drop);
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn output_failure_aborts_before_acking() {
        let mut ch = ScriptedChannel::new([data(b"HELLO", 1)]);
        let err = receive(&mut ch, &mut BrokenPipe, &SessionConfig::default()).unwrap_err();
        assert!(matches!(err, SessionError::Output(_)));
        assert!(ch.sent().is_empty());
    }
}
