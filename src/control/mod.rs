//! # Control Module
//!
//! Host-side closed-loop position control.
//!
//! This module handles:
//! - Single-axis PID with deadband and convergence detection
//! - The four-axis position controller and its state machine
//! - Sensor-failure detection and reset

pub mod pid;
pub mod position;

pub use pid::{Gains, Pid, DEFAULT_CONVERGENCE_WINDOW};
pub use position::{
    Axis, ControlState, PositionController, ResetReason, SENSOR_FAILURE_THRESHOLD,
};
