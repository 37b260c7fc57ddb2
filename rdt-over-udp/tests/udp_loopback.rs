//! Sessions over real UDP sockets on the loopback interface.
//!
//! Both ends bind port 0 and are then pointed at each other, so the tests
//! never collide with the fixed default ports.

use std::thread;
use std::time::Duration;

use rdt_over_udp::{
    receive, send, SessionConfig, SessionError, Simulator, SimulatorConfig, UdpChannel, UdpConfig,
};

/// Open a connected sender/receiver pair on 127.0.0.1.
fn loopback_pair(
    sender_timeout: Duration,
    receiver_timeout: Duration,
) -> (UdpChannel, UdpChannel) {
    let unbound = |timeout| UdpConfig {
        host: "127.0.0.1".to_string(),
        inbound_port: 0,
        // Placeholder until the peer's ephemeral port is known.
        outbound_port: 9,
        timeout,
    };
    let mut sender = UdpChannel::open(&unbound(sender_timeout)).unwrap();
    let mut receiver = UdpChannel::open(&unbound(receiver_timeout)).unwrap();
    sender.set_peer(receiver.local_addr().unwrap());
    receiver.set_peer(sender.local_addr().unwrap());
    (sender, receiver)
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn transfers_payload_over_loopback() {
    let payload = pattern(12_345);
    let (mut s, mut r) = loopback_pair(Duration::from_millis(200), Duration::from_secs(2));
    let config = SessionConfig::default();

    let rx_config = config.clone();
    let receiver = thread::spawn(move || {
        let mut out = Vec::new();
        let report = receive(&mut r, &mut out, &rx_config).unwrap();
        (report, out)
    });

    let sent = send(&mut s, &payload, &config).unwrap();
    let (received, out) = receiver.join().unwrap();

    assert_eq!(sent.chunks, 13);
    assert_eq!(received.frames_delivered, 13);
    assert_eq!(out, payload);
}

#[test]
fn survives_simulated_loss_over_loopback() {
    let payload = pattern(4_000);
    let (s, r) = loopback_pair(Duration::from_millis(50), Duration::from_millis(300));
    let config = SessionConfig {
        chunk_size: 200,
        retry_limit: 30,
        reject_limit: 30,
        timeout_limit: 5,
        ..SessionConfig::default()
    };

    let rx_config = config.clone();
    let receiver = thread::spawn(move || {
        let mut r = r;
        let mut out = Vec::new();
        let result = receive(&mut r, &mut out, &rx_config);
        (result, out)
    });

    let mut lossy = Simulator::new(
        s,
        SimulatorConfig {
            loss_rate: 0.2,
            seed: Some(2024),
            ..SimulatorConfig::default()
        },
    );
    let sent = send(&mut lossy, &payload, &config).unwrap();
    let (received, out) = receiver.join().unwrap();

    assert_eq!(sent.chunks, 20);
    assert!(sent.transmissions >= 20);
    match received {
        Ok(_) | Err(SessionError::TimeoutLimitExceeded { .. }) => {}
        Err(e) => panic!("receiver failed: {e}"),
    }
    assert_eq!(out, payload);
}

#[test]
fn sender_aborts_when_nobody_listens() {
    let (mut s, r) = loopback_pair(Duration::from_millis(20), Duration::from_millis(20));
    drop(r);
    let err = send(&mut s, b"anyone?", &SessionConfig::default()).unwrap_err();
    assert!(matches!(err, SessionError::RetryLimitExceeded { attempts: 3, .. }));
}
