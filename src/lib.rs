//! # Tello Pilot
//!
//! Host-side client for the Tello quadrotor's binary UDP protocol with a
//! four-axis position controller closed on the host.
//!
//! This library provides:
//! - The framed wire protocol (CRC-8/CRC-16, shifted size field, message
//!   routing) and the `conn_req`/`conn_ack` handshake with timeout-driven
//!   reconnect
//! - The embedded flight-log decoder (XOR-obfuscated TLV records carrying
//!   IMU, MVO, VO and ultrasonic telemetry), rotated into a Z-up frame
//! - A 20 Hz stick heartbeat carrying the latest controls
//! - A PID-with-deadband position controller fed by reactive telemetry
//!   channels

pub mod config;
pub mod control;
pub mod drone;
pub mod error;
pub mod flightlog;
pub mod heartbeat;
pub mod protocol;
pub mod telemetry;
pub mod transport;
pub mod types;

pub use config::Config;
pub use control::{Axis, ControlState, Gains, ResetReason};
pub use drone::{Calibration, Drone, PositionSource};
pub use error::{Result, TelloPilotError};
pub use transport::ConnectionState;
pub use types::{Controls, FlightState, Pose};
