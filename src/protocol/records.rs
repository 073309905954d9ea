//! # Flight-Data Record
//!
//! Fixed-layout decode of the 24-byte flight data record carried by the
//! flight message. Little-endian, tightly packed, bitfields extracted by
//! mask.

use crate::error::{Result, TelloPilotError};

/// Flight data record length in bytes
pub const FLIGHT_DATA_LEN: usize = 24;

/// Decoded flight data record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlightData {
    /// Height above the takeoff point, decimetres
    pub height: i16,
    /// Northward speed, decimetres per second
    pub north_speed: i16,
    /// Eastward speed, decimetres per second
    pub east_speed: i16,
    /// Ground speed, decimetres per second
    pub ground_speed: i16,
    /// Motor-on time, seconds
    pub fly_time: u16,

    // byte 10 status bits
    pub imu_state: bool,
    pub pressure_state: bool,
    pub down_visual_state: bool,
    pub power_state: bool,
    pub battery_state: bool,
    pub gravity_state: bool,
    pub wind_state: bool,

    /// IMU calibration progress indicator
    pub imu_calibration_state: u8,
    /// Remaining battery, percent
    pub battery_percentage: u8,
    /// Remaining battery, millivolt-ish firmware units
    pub drone_battery_left: u16,
    /// Remaining flight time estimate, tenths of a second
    pub drone_fly_time_left: u16,

    // byte 17 status bits
    pub em_sky: bool,
    pub em_ground: bool,
    pub em_open: bool,
    pub drone_hover: bool,
    pub outage_recording: bool,
    pub battery_low: bool,
    pub battery_lower: bool,
    pub factory_mode: bool,

    /// Flight mode reported by the firmware
    pub fly_mode: u8,
    /// Throw-and-go countdown
    pub throw_fly_timer: u8,
    /// Camera state
    pub camera_state: u8,
    /// Motor state
    pub electrical_machinery_state: u8,

    // byte 22 front-LED bits
    pub front_in: bool,
    pub front_out: bool,
    pub front_lsc: bool,

    // byte 23
    pub error_state: bool,
}

impl FlightData {
    /// Decode a flight data record from a payload slice
    ///
    /// # Errors
    ///
    /// Returns `ShortPayload` if fewer than 24 bytes are available.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < FLIGHT_DATA_LEN {
            return Err(TelloPilotError::ShortPayload {
                expected: FLIGHT_DATA_LEN,
                actual: data.len(),
            });
        }

        let byte10 = data[10];
        let byte17 = data[17];
        let byte22 = data[22];
        let byte23 = data[23];

        Ok(Self {
            height: i16::from_le_bytes([data[0], data[1]]),
            north_speed: i16::from_le_bytes([data[2], data[3]]),
            east_speed: i16::from_le_bytes([data[4], data[5]]),
            ground_speed: i16::from_le_bytes([data[6], data[7]]),
            fly_time: u16::from_le_bytes([data[8], data[9]]),

            imu_state: byte10 & 0x01 != 0,
            pressure_state: byte10 & 0x02 != 0,
            down_visual_state: byte10 & 0x04 != 0,
            power_state: byte10 & 0x08 != 0,
            battery_state: byte10 & 0x10 != 0,
            gravity_state: byte10 & 0x20 != 0,
            wind_state: byte10 & 0x80 != 0,

            imu_calibration_state: data[11],
            battery_percentage: data[12],
            drone_battery_left: u16::from_le_bytes([data[13], data[14]]),
            drone_fly_time_left: u16::from_le_bytes([data[15], data[16]]),

            em_sky: byte17 & 0x01 != 0,
            em_ground: byte17 & 0x02 != 0,
            em_open: byte17 & 0x04 != 0,
            drone_hover: byte17 & 0x08 != 0,
            outage_recording: byte17 & 0x10 != 0,
            battery_low: byte17 & 0x20 != 0,
            battery_lower: byte17 & 0x40 != 0,
            factory_mode: byte17 & 0x80 != 0,

            fly_mode: data[18],
            throw_fly_timer: data[19],
            camera_state: data[20],
            electrical_machinery_state: data[21],

            front_in: byte22 & 0x01 != 0,
            front_out: byte22 & 0x02 != 0,
            front_lsc: byte22 & 0x04 != 0,

            error_state: byte23 & 0x01 != 0,
        })
    }
}
