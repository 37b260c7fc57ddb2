//! Fault-injecting channel for exercising the recovery paths.
//!
//! Real networks drop, reorder, and duplicate packets.  [`Simulator`] wraps
//! any [`Channel`] and applies a configurable fault model to outbound
//! messages:
//!
//! | Fault        | Description                                              |
//! |--------------|----------------------------------------------------------|
//! | Loss         | Drop a message with probability `loss_rate`.             |
//! | Corruption   | Flip one random bit with probability `corrupt_rate`.     |
//! | Duplication  | Deliver a message twice with probability `duplicate_rate`. |
//! | Reordering   | Hold a message back until the next send, receive timeout |
//! |              | or `flush`, with probability `reorder_rate`.             |
//! | Delay        | Sleep `delay` before every send.                         |
//!
//! Inbound traffic is passed through untouched; put a simulator on both ends
//! to degrade both directions.  A fixed `seed` makes a run reproducible.

use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::channel::{Channel, ChannelError, Incoming};

/// Configuration for the fault-injection model.
///
/// All probabilities are in the range `[0.0, 1.0]`; values outside it are
/// treated as "never" (below) or "always" (above).
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Probability that a message is silently dropped.
    pub loss_rate: f64,
    /// Probability that one bit of a message is flipped.
    pub corrupt_rate: f64,
    /// Probability that a message is sent twice.
    pub duplicate_rate: f64,
    /// Probability that a message is held back behind the next one.
    pub reorder_rate: f64,
    /// Fixed delay applied before every send.
    pub delay: Duration,
    /// RNG seed; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults by default; the simulator is a transparent pass-through.
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            duplicate_rate: 0.0,
            reorder_rate: 0.0,
            delay: Duration::ZERO,
            seed: None,
        }
    }
}

impl SimulatorConfig {
    /// `true` when the configuration injects no faults at all.
    pub fn is_transparent(&self) -> bool {
        self.loss_rate <= 0.0
            && self.corrupt_rate <= 0.0
            && self.duplicate_rate <= 0.0
            && self.reorder_rate <= 0.0
            && self.delay.is_zero()
    }
}

/// Counters of the faults applied so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulatorStats {
    pub sent: u64,
    pub dropped: u64,
    pub corrupted: u64,
    pub duplicated: u64,
    pub reordered: u64,
}

/// A fault-injecting wrapper around another channel.
pub struct Simulator<C> {
    inner: C,
    config: SimulatorConfig,
    rng: StdRng,
    held: Option<Vec<u8>>,
    stats: SimulatorStats,
}

impl<C: Channel> Simulator<C> {
    pub fn new(inner: C, config: SimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            inner,
            config,
            rng,
            held: None,
            stats: SimulatorStats::default(),
        }
    }

    pub fn stats(&self) -> SimulatorStats {
        self.stats
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    fn chance(&mut self, p: f64) -> bool {
        p > 0.0 && self.rng.random::<f64>() < p
    }

    fn release_held(&mut self) -> Result<(), ChannelError> {
        if let Some(held) = self.held.take() {
            log::debug!("[sim] releasing held message ({} bytes)", held.len());
            self.inner.send(&held)?;
            self.stats.sent += 1;
        }
        Ok(())
    }
}

impl<C: Channel> Channel for Simulator<C> {
    fn send(&mut self, message: &[u8]) -> Result<(), ChannelError> {
        if !self.config.delay.is_zero() {
            thread::sleep(self.config.delay);
        }

        if self.chance(self.config.loss_rate) {
            self.stats.dropped += 1;
            log::debug!("[sim] dropping message ({} bytes)", message.len());
            return Ok(());
        }

        let mut bytes = message.to_vec();
        if !bytes.is_empty() && self.chance(self.config.corrupt_rate) {
            let idx = self.rng.random_range(0..bytes.len());
            let bit = self.rng.random_range(0..8u32);
            bytes[idx] ^= 1 << bit;
            self.stats.corrupted += 1;
            log::debug!("[sim] flipped bit {bit} of byte {idx}");
        }

        if self.held.is_none() && self.chance(self.config.reorder_rate) {
            self.stats.reordered += 1;
            log::debug!("[sim] holding message back ({} bytes)", bytes.len());
            self.held = Some(bytes);
            return Ok(());
        }

        self.inner.send(&bytes)?;
        self.stats.sent += 1;
        if self.chance(self.config.duplicate_rate) {
            self.stats.duplicated += 1;
            log::debug!("[sim] duplicating message ({} bytes)", bytes.len());
            self.inner.send(&bytes)?;
            self.stats.sent += 1;
        }

        self.release_held()
    }

    fn receive(&mut self) -> Result<Incoming, ChannelError> {
        let incoming = self.inner.receive()?;
        if incoming == Incoming::Timeout {
            self.release_held()?;
        }
        Ok(incoming)
    }

    fn flush(&mut self) -> Result<(), ChannelError> {
        self.release_held()?;
        self.inner.flush()
    }
}
