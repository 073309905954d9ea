//! # Shared Types
//!
//! Sparse pose/controls records and the derived flight state.
//!
//! Pose and control fields are independently optional because different
//! sensors deliver different axes at different rates; "unset" is distinct
//! from zero, and sentinel values are deliberately avoided.

/// A four-axis pose with independently optional fields
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub z: Option<f32>,
    pub yaw: Option<f32>,
}

impl Pose {
    /// Copy only the fields that are set in `other`
    pub fn assign_non_empty(&mut self, other: &Pose) {
        if other.x.is_some() {
            self.x = other.x;
        }
        if other.y.is_some() {
            self.y = other.y;
        }
        if other.z.is_some() {
            self.z = other.z;
        }
        if other.yaw.is_some() {
            self.yaw = other.yaw;
        }
    }

    /// True if no field is set
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.z.is_none() && self.yaw.is_none()
    }
}

/// Four-axis stick controls with independently optional fields
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Controls {
    pub roll: Option<f32>,
    pub pitch: Option<f32>,
    pub yaw: Option<f32>,
    pub thrust: Option<f32>,
}

impl Controls {
    /// Copy only the fields that are set in `other`
    pub fn assign_non_empty(&mut self, other: &Controls) {
        if other.roll.is_some() {
            self.roll = other.roll;
        }
        if other.pitch.is_some() {
            self.pitch = other.pitch;
        }
        if other.yaw.is_some() {
            self.yaw = other.yaw;
        }
        if other.thrust.is_some() {
            self.thrust = other.thrust;
        }
    }

    /// True if no field is set
    pub fn is_empty(&self) -> bool {
        self.roll.is_none() && self.pitch.is_none() && self.yaw.is_none() && self.thrust.is_none()
    }

    /// All four axes with unset fields defaulting to neutral
    pub fn or_neutral(&self) -> (f32, f32, f32, f32) {
        (
            self.roll.unwrap_or(0.0),
            self.pitch.unwrap_or(0.0),
            self.yaw.unwrap_or(0.0),
            self.thrust.unwrap_or(0.0),
        )
    }
}

/// High-level flight state derived from the flight data record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightState {
    TakingOff,
    Flying,
    Hovering,
    Landing,
    Landed,
}

impl FlightState {
    /// Derive the flight state from `(flyMode, emSky)`
    ///
    /// Unlisted combinations yield `None` (no state change).
    pub fn derive(fly_mode: u8, em_sky: bool) -> Option<Self> {
        match (fly_mode, em_sky) {
            (1, true) => Some(Self::Flying),
            (6, true) => Some(Self::Hovering),
            (6, false) => Some(Self::Landed),
            (11, true) => Some(Self::TakingOff),
            (12, true) => Some(Self::Landing),
            _ => None,
        }
    }
}

/// Position measurement fed to the controller, canonical frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Horizontal position validity (both x and y tracked)
    pub valid_xy: bool,
}

/// Orientation measurement fed to the controller, canonical frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YawSample {
    pub yaw: f32,
}
