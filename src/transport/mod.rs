//! # Transport Module
//!
//! UDP link to the drone.
//!
//! This module handles:
//! - The ASCII `conn_req:` / `conn_ack:` handshake
//! - A receive loop with a timeout watchdog and automatic reconnect
//! - Dispatch of framed packets to registered message handlers
//! - Silent dropping of outbound sends while disconnected

mod udp;

pub use udp::{UdpTransport, DEFAULT_DRONE_ADDR, DEFAULT_STREAM_PORT, DEFAULT_TIMEOUT};

use crate::protocol::Preamble;

/// Callback invoked for every inbound framed packet with a matching
/// message id. Runs on the receive-loop task and must not block.
pub type Handler = Box<dyn Fn(&Preamble, &[u8]) + Send + Sync>;

/// Connection lifecycle, published on a deduplicated channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No link; the initial state and the state after `disconnect`
    Disconnected,
    /// Handshake sent, waiting for the drone's acknowledgement
    Connecting,
    /// Acknowledged; telemetry flowing and heartbeat running
    Connected,
    /// Watchdog expired; the transport is rebuilding the socket
    TimedOut,
    /// Socket setup or receive failure; the transport will retry
    Error,
}
