//! # Position Controller
//!
//! Four independent PIDs (x, y, z, yaw) fed by reactive measurement
//! channels, producing sparse stick corrections consumed by the heartbeat
//! sender. Tracks a target/origin/input/output state machine with
//! convergence detection and failure-driven reset.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::pid::{Gains, Pid};
use crate::error::Result;
use crate::telemetry::{SensorChannel, Subscription};
use crate::types::{Controls, Pose, PositionSample, YawSample};

/// Consecutive invalid horizontal-position samples before the controller
/// latches a sensor failure
pub const SENSOR_FAILURE_THRESHOLD: u32 = 30;

/// Controller axes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
    Yaw,
}

/// Why the controller was reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    OriginChanged,
    SensorFailure,
    TargetCompleted,
    TargetCanceled,
}

/// Controller state, published on a deduplicated channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    /// No target set
    Idle,
    /// Running, error outside the deadband on at least one axis
    Correcting,
    /// Running, every driven axis converged
    Converged,
    /// Transient state published before returning to idle
    Reset(ResetReason),
}

/// Four-axis position/attitude controller
pub struct PositionController {
    x: Pid,
    y: Pid,
    z: Pid,
    yaw: Pid,

    origin: Pose,
    target: Option<Pose>,
    input: Pose,
    output: Controls,
    state: ControlState,

    invalid_position_samples: u32,
    sensor_failed: bool,

    target_channel: SensorChannel<Option<Pose>>,
    state_channel: SensorChannel<ControlState>,
    output_channel: SensorChannel<Controls>,

    subscriptions: Vec<Subscription>,
}

impl PositionController {
    /// Create a controller from four per-axis PIDs
    pub fn new(x: Pid, y: Pid, z: Pid, yaw: Pid) -> Self {
        let state_channel = SensorChannel::deduplicating();
        state_channel.write(ControlState::Idle);

        Self {
            x,
            y,
            z,
            yaw,
            origin: Pose::default(),
            target: None,
            input: Pose::default(),
            output: Controls::default(),
            state: ControlState::Idle,
            invalid_position_samples: 0,
            sensor_failed: false,
            target_channel: SensorChannel::raw(),
            state_channel,
            output_channel: SensorChannel::raw(),
            subscriptions: Vec::new(),
        }
    }

    /// Subscribe the controller to measurement channels
    ///
    /// Position samples drive the x/y/z axes, orientation samples the yaw
    /// axis. Any previously attached sources are detached. Returns the
    /// controls output channel.
    ///
    /// Channel subscribers must not call back into the controller
    /// synchronously.
    pub fn attach(
        controller: &Arc<Mutex<PositionController>>,
        position: &SensorChannel<PositionSample>,
        orientation: &SensorChannel<YawSample>,
    ) -> SensorChannel<Controls> {
        let pos_ctrl = Arc::clone(controller);
        let pos_sub = position.subscribe(move |sample: &PositionSample| {
            pos_ctrl.lock().unwrap().handle_position_sample(sample);
        });

        let yaw_ctrl = Arc::clone(controller);
        let yaw_sub = orientation.subscribe(move |sample: &YawSample| {
            yaw_ctrl.lock().unwrap().handle_yaw_sample(sample);
        });

        let mut ctrl = controller.lock().unwrap();
        ctrl.subscriptions = vec![pos_sub, yaw_sub];
        ctrl.output_channel.clone()
    }

    /// Set a new target pose; resets all four PIDs
    pub fn set_target(&mut self, target: Pose) {
        debug!(?target, "controller target set");
        self.target = Some(target);
        self.target_channel.write(Some(target));
        self.x.reset();
        self.y.reset();
        self.z.reset();
        self.yaw.reset();
    }

    /// Reset the whole controller, then shift its frame to `origin`
    pub fn set_origin(&mut self, origin: Pose) {
        self.reset(ResetReason::OriginChanged);
        self.origin = origin;
    }

    /// Use the latest aggregated input as the new origin
    pub fn set_origin_to_current_pose(&mut self) {
        let pose = self.input;
        self.set_origin(pose);
    }

    /// Reset the controller
    ///
    /// Clears the target, input, output and all PIDs, then publishes
    /// `Reset(reason)` followed by `Idle`. A reset while already idle is a
    /// no-op.
    pub fn reset(&mut self, reason: ResetReason) {
        if self.state == ControlState::Idle {
            return;
        }

        debug!(?reason, "controller reset");
        self.target = None;
        self.target_channel.write(None);
        self.input = Pose::default();
        self.output = Controls::default();
        self.x.reset();
        self.y.reset();
        self.z.reset();
        self.yaw.reset();

        self.publish_state(ControlState::Reset(reason));
        self.publish_state(ControlState::Idle);
    }

    /// Replace the gains of one axis; a rejected value leaves it untouched
    pub fn set_axis_gains(&mut self, axis: Axis, gains: Gains) -> Result<()> {
        self.pid_mut(axis).set_gains(gains)
    }

    /// Replace the deadband of one axis; a rejected value leaves it untouched
    pub fn set_axis_deadband(&mut self, axis: Axis, deadband: f32) -> Result<()> {
        self.pid_mut(axis).set_deadband(deadband)
    }

    /// Per-axis PID, for observability
    pub fn pid(&self, axis: Axis) -> &Pid {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
            Axis::Yaw => &self.yaw,
        }
    }

    pub fn origin(&self) -> Pose {
        self.origin
    }

    pub fn target(&self) -> Option<Pose> {
        self.target
    }

    pub fn input(&self) -> Pose {
        self.input
    }

    pub fn output(&self) -> Controls {
        self.output
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn state_channel(&self) -> SensorChannel<ControlState> {
        self.state_channel.clone()
    }

    pub fn output_channel(&self) -> SensorChannel<Controls> {
        self.output_channel.clone()
    }

    pub fn target_channel(&self) -> SensorChannel<Option<Pose>> {
        self.target_channel.clone()
    }

    fn pid_mut(&mut self, axis: Axis) -> &mut Pid {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
            Axis::Z => &mut self.z,
            Axis::Yaw => &mut self.yaw,
        }
    }

    fn publish_state(&mut self, state: ControlState) {
        self.state = state;
        self.state_channel.write(state);
    }

    pub(crate) fn handle_position_sample(&mut self, sample: &PositionSample) {
        if !sample.valid_xy {
            if !self.sensor_failed {
                self.invalid_position_samples += 1;
                if self.invalid_position_samples >= SENSOR_FAILURE_THRESHOLD {
                    warn!(
                        samples = self.invalid_position_samples,
                        "position sensor failure"
                    );
                    self.sensor_failed = true;
                    self.reset(ResetReason::SensorFailure);
                }
            }
        } else {
            self.invalid_position_samples = 0;
            self.sensor_failed = false;
        }

        let measured = Pose {
            x: Some(sample.x - self.origin.x.unwrap_or(0.0)),
            y: Some(sample.y - self.origin.y.unwrap_or(0.0)),
            z: Some(sample.z - self.origin.z.unwrap_or(0.0)),
            yaw: None,
        };
        self.ingest(measured);
    }

    pub(crate) fn handle_yaw_sample(&mut self, sample: &YawSample) {
        let measured = Pose {
            yaw: Some(sample.yaw - self.origin.yaw.unwrap_or(0.0)),
            ..Default::default()
        };
        self.ingest(measured);
    }

    fn ingest(&mut self, measured: Pose) {
        self.input.assign_non_empty(&measured);

        if let Some(correction) = self.update(measured) {
            self.output.assign_non_empty(&correction);
            let output = self.output;
            self.output_channel.write(output);
        }
    }

    /// Run the per-axis PIDs against one sparse measurement
    ///
    /// Axis mapping: `x → pitch`, `y → -roll`, `z → thrust`, `yaw → yaw`.
    fn update(&mut self, measured: Pose) -> Option<Controls> {
        let target = match self.target {
            Some(target) => target,
            None => {
                self.publish_state(ControlState::Idle);
                return None;
            }
        };

        let mut correction = Controls::default();
        let mut invoked = false;
        let mut all_converged = true;

        if let (Some(t), Some(m)) = (target.x, measured.x) {
            if t.is_finite() && m.is_finite() {
                correction.pitch = Some(self.x.update(t, m));
                invoked = true;
                all_converged &= self.x.converged();
            }
        }
        if let (Some(t), Some(m)) = (target.y, measured.y) {
            if t.is_finite() && m.is_finite() {
                correction.roll = Some(-self.y.update(t, m));
                invoked = true;
                all_converged &= self.y.converged();
            }
        }
        if let (Some(t), Some(m)) = (target.z, measured.z) {
            if t.is_finite() && m.is_finite() {
                correction.thrust = Some(self.z.update(t, m));
                invoked = true;
                all_converged &= self.z.converged();
            }
        }
        if let (Some(t), Some(m)) = (target.yaw, measured.yaw) {
            if t.is_finite() && m.is_finite() {
                correction.yaw = Some(self.yaw.update(t, m));
                invoked = true;
                all_converged &= self.yaw.converged();
            }
        }

        let state = if invoked && all_converged {
            ControlState::Converged
        } else {
            ControlState::Correcting
        };
        self.publish_state(state);

        Some(correction)
    }
}
