//! Entry point for `rdt-over-udp`.
//!
//! Parses CLI arguments and dispatches into either **send** or **receive**
//! mode.  All protocol work is delegated to library modules; `main.rs` owns
//! only process setup (logging, argument parsing, stdin/stdout).
//!
//! ```text
//! rdt-over-udp receive > out.bin          # listens on 50005, acks to 50006
//! rdt-over-udp send < in.bin              # listens on 50006, sends to 50005
//! ```

use std::io::{self, Read, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use rdt_over_udp::{
    receive, send, Channel, Encoding, SessionConfig, Simulator, SimulatorConfig, UdpChannel,
    UdpConfig,
};

/// Stop-and-wait reliable delivery over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Read all of stdin and deliver it to a receiver.
    Send {
        /// Local port acks arrive on.
        #[arg(long, default_value_t = rdt_over_udp::socket::DEFAULT_SENDER_PORT)]
        inbound_port: u16,
        /// Receiver port frames are sent to.
        #[arg(long, default_value_t = rdt_over_udp::socket::DEFAULT_RECEIVER_PORT)]
        outbound_port: u16,
        /// Payload bytes per frame.
        #[arg(long, default_value_t = rdt_over_udp::frame::DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        /// Silent waits tolerated per frame before giving up.
        #[arg(long, default_value_t = rdt_over_udp::connection::RETRY_LIMIT)]
        retry_limit: u32,
        /// Negative replies tolerated per frame before giving up.
        #[arg(long, default_value_t = rdt_over_udp::connection::REJECT_LIMIT)]
        reject_limit: u32,
        #[command(flatten)]
        link: LinkArgs,
    },
    /// Receive a stream and write it to stdout.
    Receive {
        /// Local port frames arrive on.
        #[arg(long, default_value_t = rdt_over_udp::socket::DEFAULT_RECEIVER_PORT)]
        inbound_port: u16,
        /// Sender port acks are sent to.
        #[arg(long, default_value_t = rdt_over_udp::socket::DEFAULT_SENDER_PORT)]
        outbound_port: u16,
        /// Consecutive silent waits tolerated before giving up.
        #[arg(long, default_value_t = rdt_over_udp::connection::TIMEOUT_LIMIT)]
        timeout_limit: u32,
        /// Required payload encoding: bytes, ascii or utf8.
        #[arg(long, default_value = "bytes")]
        encoding: Encoding,
        #[command(flatten)]
        link: LinkArgs,
    },
}

/// Options shared by both modes: where the peer lives and how bad the
/// simulated link should be.
#[derive(Args)]
struct LinkArgs {
    /// Host both ports live on.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    /// Receive timeout in milliseconds.
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,
    /// Probability of dropping an outbound message.
    #[arg(long, default_value_t = 0.0)]
    loss: f64,
    /// Probability of flipping one bit of an outbound message.
    #[arg(long, default_value_t = 0.0)]
    corrupt: f64,
    /// Probability of sending an outbound message twice.
    #[arg(long, default_value_t = 0.0)]
    duplicate: f64,
    /// Probability of holding an outbound message behind the next one.
    #[arg(long, default_value_t = 0.0)]
    reorder: f64,
    /// Delay before every outbound message, in milliseconds.
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,
    /// Seed for the fault simulator.
    #[arg(long)]
    seed: Option<u64>,
}

impl LinkArgs {
    /// Open the UDP channel, wrapped in a simulator when faults are asked for.
    fn open(&self, inbound_port: u16, outbound_port: u16) -> Result<Box<dyn Channel>> {
        let udp = UdpChannel::open(&UdpConfig {
            host: self.host.clone(),
            inbound_port,
            outbound_port,
            timeout: Duration::from_millis(self.timeout_ms),
        })
        .with_context(|| format!("opening UDP channel on port {inbound_port}"))?;

        let faults = SimulatorConfig {
            loss_rate: self.loss,
            corrupt_rate: self.corrupt,
            duplicate_rate: self.duplicate,
            reorder_rate: self.reorder,
            delay: Duration::from_millis(self.delay_ms),
            seed: self.seed,
        };
        if faults.is_transparent() {
            Ok(Box::new(udp))
        } else {
            log::info!("Simulating faults: {faults:?}");
            Ok(Box::new(Simulator::new(udp, faults)))
        }
    }
}

fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    match cli.mode {
        Mode::Send {
            inbound_port,
            outbound_port,
            chunk_size,
            retry_limit,
            reject_limit,
            link,
        } => {
            let mut payload = Vec::new();
            io::stdin()
                .read_to_end(&mut payload)
                .context("reading payload from stdin")?;

            let config = SessionConfig {
                chunk_size,
                retry_limit,
                reject_limit,
                ..SessionConfig::default()
            };
            let mut channel = link.open(inbound_port, outbound_port)?;
            log::info!("Sending on port {outbound_port}, acks on port {inbound_port}");
            let report = send(&mut *channel, &payload, &config).context("send session aborted")?;
            log::info!("{report:?}");
        }
        Mode::Receive {
            inbound_port,
            outbound_port,
            timeout_limit,
            encoding,
            link,
        } => {
            let config = SessionConfig {
                timeout_limit,
                encoding,
                ..SessionConfig::default()
            };
            let mut channel = link.open(inbound_port, outbound_port)?;
            log::info!("Receiving on port {inbound_port}, acks to port {outbound_port}");
            let stdout = io::stdout();
            let mut out = stdout.lock();
            let report =
                receive(&mut *channel, &mut out, &config).context("receive session aborted")?;
            out.flush().context("flushing stdout")?;
            log::info!("{report:?}");
        }
    }

    Ok(())
}
