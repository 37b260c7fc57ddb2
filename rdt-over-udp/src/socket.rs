//! Blocking UDP implementation of the Channel Port.
//!
//! [`UdpChannel`] binds one socket on the inbound port for receiving and a
//! second, ephemeral socket for sending to the peer's inbound port, so each
//! direction is an independent logical channel.  Receives use the socket
//! read timeout; an expired wait becomes [`Incoming::Timeout`].

use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use crate::channel::{Channel, ChannelError, Incoming};

/// Largest datagram we ever read (frames are far smaller).
const MAX_DATAGRAM: usize = 65_535;

/// Port the receiver listens on by default.
pub const DEFAULT_RECEIVER_PORT: u16 = 50005;

/// Port the sender listens on (for acks) by default.
pub const DEFAULT_SENDER_PORT: u16 = 50006;

/// Default bounded wait for a receive.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Addresses and timeout for one side of a UDP session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpConfig {
    /// Host both ports live on.
    pub host: String,
    /// Local port this side receives on.
    pub inbound_port: u16,
    /// Peer port this side sends to.
    pub outbound_port: u16,
    /// Receive timeout.
    pub timeout: Duration,
}

impl UdpConfig {
    /// Default layout for the sending side (acks arrive on 50006).
    pub fn sender() -> Self {
        Self {
            host: "127.0.0.1".into(),
            inbound_port: DEFAULT_SENDER_PORT,
            outbound_port: DEFAULT_RECEIVER_PORT,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Default layout for the receiving side (frames arrive on 50005).
    pub fn receiver() -> Self {
        Self {
            host: "127.0.0.1".into(),
            inbound_port: DEFAULT_RECEIVER_PORT,
            outbound_port: DEFAULT_SENDER_PORT,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, ChannelError> {
    (host, port)
        .to_socket_addrs()
        .map_err(|e| ChannelError::Address(format!("{host}:{port}: {e}")))?
        .next()
        .ok_or_else(|| ChannelError::Address(format!("{host}:{port}: no address")))
}

/// Returns true if the error means "nothing arrived in time".
fn is_timeout(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

/// A pair of blocking UDP sockets acting as one channel endpoint.
#[derive(Debug)]
pub struct UdpChannel {
    inbound: UdpSocket,
    outbound: UdpSocket,
    peer: SocketAddr,
}

impl UdpChannel {
    /// Bind the inbound port and prepare to send to the outbound port.
    pub fn open(config: &UdpConfig) -> Result<Self, ChannelError> {
        let local = resolve(&config.host, config.inbound_port)?;
        let peer = resolve(&config.host, config.outbound_port)?;

        let inbound = UdpSocket::bind(local)?;
        inbound.set_read_timeout(Some(config.timeout))?;

        let unspecified: IpAddr = if peer.is_ipv4() {
            Ipv4Addr::UNSPECIFIED.into()
        } else {
            Ipv6Addr::UNSPECIFIED.into()
        };
        let outbound = UdpSocket::bind((unspecified, 0))?;

        log::debug!(
            "[udp] receiving on {}, sending to {}",
            inbound.local_addr()?,
            peer
        );
        Ok(Self {
            inbound,
            outbound,
            peer,
        })
    }

    /// Address the inbound socket is bound to (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, ChannelError> {
        Ok(self.inbound.local_addr()?)
    }

    /// Redirect outbound traffic, e.g. once an ephemeral peer port is known.
    pub fn set_peer(&mut self, peer: SocketAddr) {
        self.peer = peer;
    }
}

impl Channel for UdpChannel {
    fn send(&mut self, message: &[u8]) -> Result<(), ChannelError> {
        match self.outbound.send_to(message, self.peer) {
            Ok(_) => Ok(()),
            // ICMP port-unreachable from an earlier send; the datagram is lost.
            Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                log::trace!("[udp] peer {} unreachable", self.peer);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn receive(&mut self) -> Result<Incoming, ChannelError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        match self.inbound.recv_from(&mut buf) {
            Ok((n, _from)) => {
                buf.truncate(n);
                Ok(Incoming::Message(buf))
            }
            Err(e) if is_timeout(&e) => Ok(Incoming::Timeout),
            Err(e) if e.kind() == ErrorKind::ConnectionReset => Ok(Incoming::Timeout),
            Err(e) => Err(e.into()),
        }
    }
}
