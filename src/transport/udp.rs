//! # UDP Transport
//!
//! Owns the UDP socket, performs the handshake, dispatches inbound frames
//! and reconnects on watchdog expiry.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::{ConnectionState, Handler};
use crate::protocol::{decode_frame, is_framed};
use crate::telemetry::SensorChannel;

/// Default drone endpoint
pub const DEFAULT_DRONE_ADDR: &str = "192.168.10.1:8889";

/// Local port announced to the drone for its out-of-band streams
pub const DEFAULT_STREAM_PORT: u16 = 6038;

/// Default receive watchdog window
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Delay before retrying after a socket setup failure
const RECONNECT_DELAY: Duration = Duration::from_millis(500);

/// Receive buffer size; log-data payloads are the largest frames seen
const RECV_BUFFER_LEN: usize = 4096;

const CONN_REQ_PREFIX: &[u8] = b"conn_req:";
const CONN_ACK_PREFIX: &[u8] = b"conn_ack:";
const UNKNOWN_COMMAND_PREFIX: &[u8] = b"unknown command:";

struct Inner {
    drone_addr: SocketAddr,
    stream_port: u16,
    timeout: Duration,
    verify_crc: bool,
    state: SensorChannel<ConnectionState>,
    handlers: Mutex<HashMap<u16, Handler>>,
    socket: Mutex<Option<Arc<UdpSocket>>>,
    running: AtomicBool,
}

/// UDP link to the drone
///
/// The receive loop runs on a background task. Every successful receive
/// re-arms the watchdog; expiry tears the socket down and re-enters the
/// handshake until [`UdpTransport::disconnect`] is called.
pub struct UdpTransport {
    inner: Arc<Inner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl UdpTransport {
    /// Create a transport for the given drone endpoint
    ///
    /// # Arguments
    ///
    /// * `drone_addr` - Drone command endpoint (default `192.168.10.1:8889`)
    /// * `stream_port` - Local port announced in the handshake
    /// * `timeout` - Receive watchdog window
    /// * `verify_crc` - Verify checksums on inbound frames
    pub fn new(
        drone_addr: SocketAddr,
        stream_port: u16,
        timeout: Duration,
        verify_crc: bool,
    ) -> Self {
        let state = SensorChannel::deduplicating();
        state.write(ConnectionState::Disconnected);

        Self {
            inner: Arc::new(Inner {
                drone_addr,
                stream_port,
                timeout,
                verify_crc,
                state,
                handlers: Mutex::new(HashMap::new()),
                socket: Mutex::new(None),
                running: AtomicBool::new(false),
            }),
            task: Mutex::new(None),
        }
    }

    /// Register a handler for one message id
    ///
    /// Handlers must be registered before [`UdpTransport::connect`]; they
    /// run on the receive-loop task and must not block or register further
    /// handlers.
    pub fn register_handler(&self, message_id: u16, handler: Handler) {
        self.inner
            .handlers
            .lock()
            .unwrap()
            .insert(message_id, handler);
    }

    /// Start the receive loop and the handshake
    ///
    /// A no-op if the transport is already running.
    pub fn connect(&self) {
        let mut task = self.task.lock().unwrap();
        if task.is_some() {
            return;
        }

        self.inner.running.store(true, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        *task = Some(tokio::spawn(run_loop(inner)));
    }

    /// Stop the receive loop, drop the socket and clear connection state
    pub fn disconnect(&self) {
        self.inner.running.store(false, Ordering::SeqCst);

        if let Some(task) = self.task.lock().unwrap().take() {
            task.abort();
        }
        *self.inner.socket.lock().unwrap() = None;
        self.inner.state.write(ConnectionState::Disconnected);
        info!("transport disconnected");
    }

    /// Send a datagram to the drone
    ///
    /// Silently dropped while the transport is not connected.
    pub async fn send(&self, datagram: &[u8]) {
        if !self.is_connected() {
            trace!("dropping {} byte send while disconnected", datagram.len());
            return;
        }

        let socket = self.inner.socket.lock().unwrap().clone();
        if let Some(socket) = socket {
            if let Err(e) = socket.send(datagram).await {
                warn!("send failed: {}", e);
            }
        }
    }

    /// True once the drone has acknowledged the handshake
    pub fn is_connected(&self) -> bool {
        self.inner.state.last() == Some(ConnectionState::Connected)
    }

    /// Connection state channel (deduplicated)
    pub fn state_channel(&self) -> SensorChannel<ConnectionState> {
        self.inner.state.clone()
    }
}

async fn run_loop(inner: Arc<Inner>) {
    while inner.running.load(Ordering::SeqCst) {
        let socket = match open_socket(&inner).await {
            Ok(socket) => socket,
            Err(e) => {
                warn!("socket setup failed: {}", e);
                inner.state.write(ConnectionState::Error);
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
        };

        *inner.socket.lock().unwrap() = Some(Arc::clone(&socket));
        inner.state.write(ConnectionState::Connecting);

        let mut request = CONN_REQ_PREFIX.to_vec();
        request.extend_from_slice(&inner.stream_port.to_le_bytes());
        if let Err(e) = socket.send(&request).await {
            warn!("handshake send failed: {}", e);
            inner.state.write(ConnectionState::Error);
            *inner.socket.lock().unwrap() = None;
            tokio::time::sleep(RECONNECT_DELAY).await;
            continue;
        }
        info!(drone = %inner.drone_addr, "connection request sent");

        let mut buf = vec![0u8; RECV_BUFFER_LEN];
        loop {
            match tokio::time::timeout(inner.timeout, socket.recv(&mut buf)).await {
                Ok(Ok(len)) => inner.handle_datagram(&buf[..len]),
                Ok(Err(e)) => {
                    warn!("receive failed: {}", e);
                    inner.state.write(ConnectionState::Error);
                    break;
                }
                Err(_) => {
                    warn!("receive watchdog expired");
                    inner.state.write(ConnectionState::TimedOut);
                    break;
                }
            }

            if !inner.running.load(Ordering::SeqCst) {
                break;
            }
        }

        *inner.socket.lock().unwrap() = None;
    }

    inner.state.write(ConnectionState::Disconnected);
}

async fn open_socket(inner: &Inner) -> std::io::Result<Arc<UdpSocket>> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(inner.drone_addr).await?;
    Ok(Arc::new(socket))
}

impl Inner {
    fn handle_datagram(&self, datagram: &[u8]) {
        if is_framed(datagram) {
            match decode_frame(datagram, self.verify_crc) {
                Ok((preamble, payload)) => {
                    let handlers = self.handlers.lock().unwrap();
                    match handlers.get(&preamble.message_id) {
                        Some(handler) => handler(&preamble, payload),
                        None => debug!("no handler for message 0x{:04X}", preamble.message_id),
                    }
                }
                Err(e) => warn!("dropping malformed frame: {}", e),
            }
            return;
        }

        if datagram.starts_with(CONN_ACK_PREFIX) {
            info!("connection acknowledged");
            self.state.write(ConnectionState::Connected);
        } else if datagram.starts_with(UNKNOWN_COMMAND_PREFIX) {
            warn!(
                "drone rejected command: {}",
                String::from_utf8_lossy(datagram)
            );
        } else {
            warn!("unparseable {} byte datagram", datagram.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_packet, msg, TYPE_INFO_COMMAND};
    use std::sync::atomic::AtomicUsize;

    async fn wait_for_state(channel: &SensorChannel<ConnectionState>, state: ConnectionState) {
        for _ in 0..250 {
            if channel.last() == Some(state) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!(
            "timed out waiting for {:?}, still {:?}",
            state,
            channel.last()
        );
    }

    fn transport_for(addr: SocketAddr, timeout: Duration) -> UdpTransport {
        UdpTransport::new(addr, DEFAULT_STREAM_PORT, timeout, false)
    }

    #[tokio::test]
    async fn test_handshake_transitions_to_connected() {
        let drone = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let transport = transport_for(drone.local_addr().unwrap(), DEFAULT_TIMEOUT);
        let states = transport.state_channel();

        transport.connect();

        let mut buf = [0u8; 64];
        let (len, peer) = drone.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"conn_req:\x96\x17");

        drone.send_to(b"conn_ack:\x96\x17", peer).await.unwrap();
        wait_for_state(&states, ConnectionState::Connected).await;

        transport.disconnect();
        assert_eq!(states.last(), Some(ConnectionState::Disconnected));
    }

    #[tokio::test]
    async fn test_frame_dispatch_to_handler() {
        let drone = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let transport = transport_for(drone.local_addr().unwrap(), DEFAULT_TIMEOUT);

        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = Arc::clone(&received);
        transport.register_handler(
            msg::FLIGHT_MSG,
            Box::new(move |preamble, payload| {
                received_clone
                    .lock()
                    .unwrap()
                    .push((preamble.sequence_no, payload.to_vec()));
            }),
        );

        transport.connect();
        let mut buf = [0u8; 64];
        let (_, peer) = drone.recv_from(&mut buf).await.unwrap();
        drone.send_to(b"conn_ack:", peer).await.unwrap();

        let frame = encode_packet(TYPE_INFO_COMMAND, msg::FLIGHT_MSG, 9, &[0xAA, 0xBB]);
        drone.send_to(&frame, peer).await.unwrap();

        for _ in 0..250 {
            if !received.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let received = received.lock().unwrap();
        assert_eq!(received.as_slice(), &[(9u16, vec![0xAA, 0xBB])]);

        transport.disconnect();
    }

    #[tokio::test]
    async fn test_unknown_message_id_is_dropped() {
        let drone = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let transport = transport_for(drone.local_addr().unwrap(), DEFAULT_TIMEOUT);
        let states = transport.state_channel();

        transport.connect();
        let mut buf = [0u8; 64];
        let (_, peer) = drone.recv_from(&mut buf).await.unwrap();
        drone.send_to(b"conn_ack:", peer).await.unwrap();
        wait_for_state(&states, ConnectionState::Connected).await;

        // No handler registered: the frame is logged and dropped, the loop
        // keeps running
        let frame = encode_packet(TYPE_INFO_COMMAND, msg::LIGHT_MSG, 1, &[]);
        drone.send_to(&frame, peer).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(states.last(), Some(ConnectionState::Connected));

        transport.disconnect();
    }

    #[tokio::test]
    async fn test_watchdog_timeout_and_reconnect() {
        let drone = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let transport = transport_for(drone.local_addr().unwrap(), Duration::from_millis(200));
        let states = transport.state_channel();

        let timeouts = Arc::new(AtomicUsize::new(0));
        let timeouts_clone = Arc::clone(&timeouts);
        let _sub = states.subscribe(move |s: &ConnectionState| {
            if *s == ConnectionState::TimedOut {
                timeouts_clone.fetch_add(1, Ordering::SeqCst);
            }
        });

        transport.connect();
        let mut buf = [0u8; 64];
        let (_, peer) = drone.recv_from(&mut buf).await.unwrap();
        drone.send_to(b"conn_ack:", peer).await.unwrap();
        wait_for_state(&states, ConnectionState::Connected).await;

        // Stay silent: the watchdog must fire and a fresh handshake arrive
        let (len, peer) = drone.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"conn_req:\x96\x17");
        assert!(timeouts.load(Ordering::SeqCst) >= 1);

        drone.send_to(b"conn_ack:", peer).await.unwrap();
        wait_for_state(&states, ConnectionState::Connected).await;

        transport.disconnect();
    }

    #[tokio::test]
    async fn test_send_dropped_while_disconnected() {
        let transport = transport_for("127.0.0.1:9".parse().unwrap(), DEFAULT_TIMEOUT);

        // Never connected: the send is silently dropped
        transport.send(&[0x01, 0x02]).await;
        assert!(!transport.is_connected());
    }
}
