//! # Heartbeat Sender
//!
//! Periodic stick packet at a fixed cadence. The stick packet is the only
//! way commands reach the drone, so the sender runs for the whole life of
//! the connection, streaming the latest controls snapshot.
//!
//! Sending pauses automatically while the transport is not connected and
//! resumes on reconnect; the task itself survives reconnect cycles.

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Local, Timelike};
use tokio::task::JoinHandle;
use tracing::trace;

use crate::protocol::{
    encode_clock_tail, encode_packet, encode_stick_axis, pack_stick_axes, msg, TYPE_INFO_STICK,
};
use crate::transport::UdpTransport;
use crate::types::Controls;

/// Default heartbeat cadence: 20 Hz
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(50);

/// Periodic stick-packet sender
pub struct Heartbeat {
    interval: Duration,
    controls: Arc<Mutex<Controls>>,
    fast_mode: Arc<AtomicBool>,
    sequence: Arc<AtomicU16>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Heartbeat {
    /// Create a sender with the given cadence and shared sequence counter
    pub fn new(interval: Duration, sequence: Arc<AtomicU16>) -> Self {
        Self {
            interval,
            controls: Arc::new(Mutex::new(Controls::default())),
            fast_mode: Arc::new(AtomicBool::new(false)),
            sequence,
            task: Mutex::new(None),
        }
    }

    /// Replace the controls snapshot streamed on each tick
    pub fn set_controls(&self, controls: Controls) {
        *self.controls.lock().unwrap() = controls;
    }

    /// Current controls snapshot
    pub fn controls(&self) -> Controls {
        *self.controls.lock().unwrap()
    }

    /// Shared handle to the controls snapshot, for bridge subscriptions
    pub(crate) fn controls_cell(&self) -> Arc<Mutex<Controls>> {
        Arc::clone(&self.controls)
    }

    /// Toggle the fast-mode bit in outgoing stick packets
    pub fn set_fast_mode(&self, on: bool) {
        self.fast_mode.store(on, Ordering::SeqCst);
    }

    /// Start the periodic sender
    ///
    /// A no-op if already running. Ticks while the transport is
    /// disconnected are skipped, not queued.
    pub fn start(&self, transport: Arc<UdpTransport>) {
        let mut task = self.task.lock().unwrap();
        if task.is_some() {
            return;
        }

        let interval = self.interval;
        let controls = Arc::clone(&self.controls);
        let fast_mode = Arc::clone(&self.fast_mode);
        let sequence = Arc::clone(&self.sequence);

        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                if !transport.is_connected() {
                    continue;
                }

                let snapshot = *controls.lock().unwrap();
                let frame = build_stick_frame(
                    &snapshot,
                    fast_mode.load(Ordering::SeqCst),
                    sequence.fetch_add(1, Ordering::SeqCst),
                );
                trace!("heartbeat tick");
                transport.send(&frame).await;
            }
        }));
    }

    /// Cancel the sender; it is never re-armed after this
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().unwrap().take() {
            task.abort();
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Build one complete stick frame from a controls snapshot
///
/// Unset axes default to neutral. The payload is the 7-byte packed axes
/// field followed by the 7-byte wall-clock tail.
pub fn build_stick_frame(controls: &Controls, fast_mode: bool, sequence_no: u16) -> Vec<u8> {
    let (roll, pitch, yaw, thrust) = controls.or_neutral();

    let axes = pack_stick_axes(
        encode_stick_axis(roll),
        encode_stick_axis(pitch),
        encode_stick_axis(thrust),
        encode_stick_axis(yaw),
        fast_mode,
    );

    let now = Local::now();
    let tail = encode_clock_tail(
        now.hour() as u8,
        now.minute() as u8,
        now.second() as u8,
        (now.timestamp_subsec_millis() % 1000) as u16,
    );

    let mut payload = Vec::with_capacity(axes.len() + tail.len());
    payload.extend_from_slice(&axes);
    payload.extend_from_slice(&tail);

    encode_packet(TYPE_INFO_STICK, msg::STICK_CMD, sequence_no, &payload)
}
