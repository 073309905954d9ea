//! # Canonical Frame Rotation
//!
//! The drone reports odometry with Z pointing down; the library's
//! canonical frame is X forward, Y left, Z up. The conversion is a single
//! constant rotation of π around X, applied as `v' = R·v` for vectors and
//! `C' = R·C·Rᵀ` for covariance matrices. IMU orientation is re-synthesized
//! after rotation with π subtracted from roll, because the drone reports
//! orientation in a frame whose X is flipped relative to its velocity
//! frame.

use std::f32::consts::PI;

use nalgebra::{Matrix3, UnitQuaternion, Vector3};

/// Rotation from the drone's frame into the canonical frame: Rx(π)
pub fn frame_rotation() -> Matrix3<f32> {
    Matrix3::new(
        1.0, 0.0, 0.0, //
        0.0, -1.0, 0.0, //
        0.0, 0.0, -1.0,
    )
}

/// Rotate a vector into the canonical frame
pub fn rotate_vector(v: &Vector3<f32>) -> Vector3<f32> {
    frame_rotation() * v
}

/// Rotate a covariance matrix into the canonical frame
pub fn rotate_covariance(c: &Matrix3<f32>) -> Matrix3<f32> {
    let r = frame_rotation();
    r * c * r.transpose()
}

/// Rotate an IMU orientation into the canonical frame
///
/// Applies Rx(π), extracts roll/pitch/yaw, and rebuilds the quaternion
/// with π subtracted from roll.
pub fn rotate_orientation(q: &UnitQuaternion<f32>) -> UnitQuaternion<f32> {
    let rotated = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), PI) * q;
    let (roll, pitch, yaw) = rotated.euler_angles();
    UnitQuaternion::from_euler_angles(roll - PI, pitch, yaw)
}

/// Yaw component of a canonical-frame orientation
pub fn yaw_of(q: &UnitQuaternion<f32>) -> f32 {
    q.euler_angles().2
}
