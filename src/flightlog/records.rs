//! # Flight-Log Record Layouts
//!
//! Raw fixed-layout decodes for the records carried inside the embedded
//! flight-log stream, plus the parsed sample types published on the
//! telemetry channels. All layouts are little-endian and tightly packed.

use nalgebra::{Matrix3, Quaternion, UnitQuaternion, Vector3};

use crate::error::{Result, TelloPilotError};

/// Log record header length: magic + length + crc8 + type + xor key + 3 reserved
pub const LOG_HEADER_LEN: usize = 10;

/// MVO record length in bytes
pub const MVO_RECORD_LEN: usize = 80;

/// IMU record length in bytes
pub const IMU_RECORD_LEN: usize = 108;

/// ImuEx record minimum length in bytes (the firmware appends trailing
/// debug fields beyond the documented layout)
pub const IMU_EX_RECORD_LEN: usize = 60;

fn ensure_len(data: &[u8], expected: usize) -> Result<()> {
    if data.len() < expected {
        return Err(TelloPilotError::ShortPayload {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

fn read_i16(data: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_f32(data: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn read_f64(data: &[u8], offset: usize) -> f64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    f64::from_le_bytes(bytes)
}

/// Fill a symmetric 3×3 matrix from six upper-triangle values
///
/// Mapping: `[0,0]=c1, [0,1]=c2, [0,2]=c3, [1,1]=c4, [1,2]=c5, [2,2]=c6`.
pub fn symmetric_from_upper(c: [f32; 6]) -> Matrix3<f32> {
    Matrix3::new(
        c[0], c[1], c[2], //
        c[1], c[3], c[4], //
        c[2], c[4], c[5],
    )
}

/// Log record header (magic byte already checked by the parser)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecordHeader {
    /// Record magic, always 0x55
    pub magic: u8,
    /// Length of the entire record: header + payload + trailing CRC-16
    pub record_length: u16,
    /// CRC-8 slot (not validated, matching the drone's own tooling)
    pub crc8: u8,
    /// Record type (dispatch key)
    pub record_type: u16,
    /// Per-record XOR obfuscation key
    pub xor_key: u8,
}

impl LogRecordHeader {
    /// Decode a record header from the front of a slice
    pub fn decode(data: &[u8]) -> Result<Self> {
        ensure_len(data, LOG_HEADER_LEN)?;

        Ok(Self {
            magic: data[0],
            record_length: read_u16(data, 1),
            crc8: data[3],
            record_type: read_u16(data, 4),
            xor_key: data[6],
        })
    }
}

/// Raw MVO (multiview visual odometry) record, drone frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MvoRecord {
    pub observation_count: i16,
    /// Velocity in millimetres per second
    pub vel_x: i16,
    pub vel_y: i16,
    pub vel_z: i16,
    /// Position in metres
    pub position: Vector3<f32>,
    /// Position covariance upper triangle
    pub pos_cov: [f32; 6],
    /// Velocity covariance upper triangle
    pub vel_cov: [f32; 6],
    /// Height above ground, metres
    pub height: f32,
    pub height_variance: f32,
    /// Per-axis validity bitmap
    pub flags: u8,
}

impl MvoRecord {
    pub fn decode(data: &[u8]) -> Result<Self> {
        ensure_len(data, MVO_RECORD_LEN)?;

        let mut pos_cov = [0f32; 6];
        let mut vel_cov = [0f32; 6];
        for i in 0..6 {
            pos_cov[i] = read_f32(data, 20 + 4 * i);
            vel_cov[i] = read_f32(data, 44 + 4 * i);
        }

        Ok(Self {
            observation_count: read_i16(data, 0),
            vel_x: read_i16(data, 2),
            vel_y: read_i16(data, 4),
            vel_z: read_i16(data, 6),
            position: Vector3::new(
                read_f32(data, 8),
                read_f32(data, 12),
                read_f32(data, 16),
            ),
            pos_cov,
            vel_cov,
            height: read_f32(data, 68),
            height_variance: read_f32(data, 72),
            flags: data[76],
        })
    }
}

/// Raw IMU record, drone frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuRecord {
    pub longitude: f64,
    pub latitude: f64,
    pub barometer_raw: f32,
    /// Raw accelerometer reading
    pub accel: Vector3<f32>,
    /// Raw gyro reading
    pub gyro: Vector3<f32>,
    pub barometer_smooth: f32,
    /// Orientation quaternion as (w, x, y, z)
    pub quaternion: [f32; 4],
    /// Acceleration in the inertial frame
    pub accel_inertial: Vector3<f32>,
    /// Velocity in the north/east/down frame
    pub vel_ned: Vector3<f32>,
    /// Body-frame gyro
    pub gyro_body: Vector3<f32>,
    pub mag: [i16; 3],
    /// Temperature in centi-degrees
    pub temperature: u16,
}

impl ImuRecord {
    pub fn decode(data: &[u8]) -> Result<Self> {
        ensure_len(data, IMU_RECORD_LEN)?;

        Ok(Self {
            longitude: read_f64(data, 0),
            latitude: read_f64(data, 8),
            barometer_raw: read_f32(data, 16),
            accel: Vector3::new(
                read_f32(data, 20),
                read_f32(data, 24),
                read_f32(data, 28),
            ),
            gyro: Vector3::new(
                read_f32(data, 32),
                read_f32(data, 36),
                read_f32(data, 40),
            ),
            barometer_smooth: read_f32(data, 44),
            quaternion: [
                read_f32(data, 48),
                read_f32(data, 52),
                read_f32(data, 56),
                read_f32(data, 60),
            ],
            accel_inertial: Vector3::new(
                read_f32(data, 64),
                read_f32(data, 68),
                read_f32(data, 72),
            ),
            vel_ned: Vector3::new(
                read_f32(data, 76),
                read_f32(data, 80),
                read_f32(data, 84),
            ),
            gyro_body: Vector3::new(
                read_f32(data, 88),
                read_f32(data, 92),
                read_f32(data, 96),
            ),
            mag: [
                read_i16(data, 100),
                read_i16(data, 102),
                read_i16(data, 104),
            ],
            temperature: read_u16(data, 106),
        })
    }
}

/// Raw ImuEx (visual-inertial odometry) record, drone frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuExRecord {
    pub velocity: Vector3<f32>,
    pub position: Vector3<f32>,
    /// Velocity from the ultrasonic range finder
    pub us_velocity: f32,
    /// Distance from the ultrasonic range finder
    pub us_distance: f32,
    pub rtk_longitude: f64,
    pub rtk_latitude: f64,
    pub rtk_altitude: f32,
    /// Per-axis validity bitmap
    pub flags: u16,
    /// Estimator error bitmap
    pub error_flags: u16,
    /// Sample counter
    pub count: u16,
}

impl ImuExRecord {
    pub fn decode(data: &[u8]) -> Result<Self> {
        ensure_len(data, IMU_EX_RECORD_LEN)?;

        Ok(Self {
            velocity: Vector3::new(read_f32(data, 0), read_f32(data, 4), read_f32(data, 8)),
            position: Vector3::new(
                read_f32(data, 12),
                read_f32(data, 16),
                read_f32(data, 20),
            ),
            us_velocity: read_f32(data, 24),
            us_distance: read_f32(data, 28),
            rtk_longitude: read_f64(data, 32),
            rtk_latitude: read_f64(data, 40),
            rtk_altitude: read_f32(data, 48),
            flags: read_u16(data, 52),
            error_flags: read_u16(data, 54),
            count: read_u16(data, 58),
        })
    }
}

/// Per-axis validity flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisValidity {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

/// Validity split for MVO samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MvoValidity {
    pub velocity: AxisValidity,
    pub position: AxisValidity,
}

impl MvoValidity {
    /// Split the MVO flags byte: velocity bits 0..2, position bits 4..6
    pub fn from_flags(flags: u8) -> Self {
        Self {
            velocity: AxisValidity {
                x: flags & 0x01 != 0,
                y: flags & 0x02 != 0,
                z: flags & 0x04 != 0,
            },
            position: AxisValidity {
                x: flags & 0x10 != 0,
                y: flags & 0x20 != 0,
                z: flags & 0x40 != 0,
            },
        }
    }
}

/// Validity split for VO samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoValidity {
    pub velocity: AxisValidity,
    pub position: AxisValidity,
    pub us_velocity: bool,
    pub us_distance: bool,
}

impl VoValidity {
    /// Split the ImuEx flags word: velocity bits 0..2, position bits 3..5,
    /// ultrasonic velocity/distance bits 6..7
    pub fn from_flags(flags: u16) -> Self {
        Self {
            velocity: AxisValidity {
                x: flags & 0x0001 != 0,
                y: flags & 0x0002 != 0,
                z: flags & 0x0004 != 0,
            },
            position: AxisValidity {
                x: flags & 0x0008 != 0,
                y: flags & 0x0010 != 0,
                z: flags & 0x0020 != 0,
            },
            us_velocity: flags & 0x0040 != 0,
            us_distance: flags & 0x0080 != 0,
        }
    }
}

/// Parsed MVO sample (5 Hz position/velocity estimate with covariance)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mvo {
    /// Velocity, metres per second
    pub velocity: Vector3<f32>,
    /// Position, metres
    pub position: Vector3<f32>,
    /// Symmetric position covariance
    pub position_cov: Matrix3<f32>,
    /// Symmetric velocity covariance
    pub velocity_cov: Matrix3<f32>,
    /// Height above ground, metres
    pub height: f32,
    pub height_variance: f32,
    pub is_valid: MvoValidity,
}

impl From<&MvoRecord> for Mvo {
    fn from(record: &MvoRecord) -> Self {
        Self {
            velocity: Vector3::new(
                record.vel_x as f32 / 1000.0,
                record.vel_y as f32 / 1000.0,
                record.vel_z as f32 / 1000.0,
            ),
            position: record.position,
            position_cov: symmetric_from_upper(record.pos_cov),
            velocity_cov: symmetric_from_upper(record.vel_cov),
            height: record.height,
            height_variance: record.height_variance,
            is_valid: MvoValidity::from_flags(record.flags),
        }
    }
}

/// Parsed IMU sample (10 Hz)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Imu {
    /// Inertial-frame acceleration
    pub accel: Vector3<f32>,
    /// Body-frame angular rate
    pub gyro: Vector3<f32>,
    /// Orientation
    pub orientation: UnitQuaternion<f32>,
    /// Temperature, degrees Celsius
    pub temperature: f32,
}

impl From<&ImuRecord> for Imu {
    fn from(record: &ImuRecord) -> Self {
        let [w, x, y, z] = record.quaternion;
        Self {
            accel: record.accel_inertial,
            gyro: record.gyro_body,
            orientation: UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z)),
            temperature: record.temperature as f32 / 100.0,
        }
    }
}

/// Parsed VO sample (10 Hz visual-inertial odometry)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vo {
    /// Velocity, metres per second
    pub velocity: Vector3<f32>,
    /// Position, metres
    pub position: Vector3<f32>,
    pub is_valid: VoValidity,
}

impl From<&ImuExRecord> for Vo {
    fn from(record: &ImuExRecord) -> Self {
        Self {
            velocity: record.velocity,
            position: record.position,
            is_valid: VoValidity::from_flags(record.flags),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_from_upper() {
        let m = symmetric_from_upper([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        assert_eq!(m[(0, 0)], 1.0);
        assert_eq!(m[(0, 1)], 2.0);
        assert_eq!(m[(0, 2)], 3.0);
        assert_eq!(m[(1, 1)], 4.0);
        assert_eq!(m[(1, 2)], 5.0);
        assert_eq!(m[(2, 2)], 6.0);
        assert_eq!(m, m.transpose());
    }

    #[test]
    fn test_header_decode() {
        let data = [0x55, 0x5C, 0x00, 0xAB, 0x1D, 0x00, 0x5A, 0, 0, 0];
        let header = LogRecordHeader::decode(&data).unwrap();

        assert_eq!(header.magic, 0x55);
        assert_eq!(header.record_length, 0x5C);
        assert_eq!(header.record_type, 0x001D);
        assert_eq!(header.xor_key, 0x5A);
    }

    #[test]
    fn test_header_short() {
        assert!(LogRecordHeader::decode(&[0x55, 0x0C]).is_err());
    }

    #[test]
    fn test_mvo_decode() {
        let mut data = [0u8; MVO_RECORD_LEN];
        data[0..2].copy_from_slice(&7i16.to_le_bytes());
        data[2..4].copy_from_slice(&1500i16.to_le_bytes());
        data[4..6].copy_from_slice(&(-250i16).to_le_bytes());
        data[8..12].copy_from_slice(&1.5f32.to_le_bytes());
        data[20..24].copy_from_slice(&0.25f32.to_le_bytes());
        data[68..72].copy_from_slice(&1.2f32.to_le_bytes());
        data[76] = 0b0111_0111;

        let record = MvoRecord::decode(&data).unwrap();
        assert_eq!(record.observation_count, 7);
        assert_eq!(record.vel_x, 1500);
        assert_eq!(record.vel_y, -250);
        assert_eq!(record.position.x, 1.5);
        assert_eq!(record.pos_cov[0], 0.25);
        assert_eq!(record.height, 1.2);

        let sample = Mvo::from(&record);
        assert!((sample.velocity.x - 1.5).abs() < 1e-6);
        assert!((sample.velocity.y + 0.25).abs() < 1e-6);
        assert_eq!(sample.position_cov[(0, 0)], 0.25);
        assert!(sample.is_valid.velocity.x);
        assert!(sample.is_valid.position.z);
    }

    #[test]
    fn test_mvo_short() {
        let data = [0u8; MVO_RECORD_LEN - 1];
        assert!(MvoRecord::decode(&data).is_err());
    }

    #[test]
    fn test_imu_decode() {
        let mut data = [0u8; IMU_RECORD_LEN];
        // Identity quaternion (w, x, y, z)
        data[48..52].copy_from_slice(&1.0f32.to_le_bytes());
        // Inertial accel z
        data[72..76].copy_from_slice(&(-9.81f32).to_le_bytes());
        // Body gyro x
        data[88..92].copy_from_slice(&0.5f32.to_le_bytes());
        // 23.45 °C
        data[106..108].copy_from_slice(&2345u16.to_le_bytes());

        let record = ImuRecord::decode(&data).unwrap();
        assert_eq!(record.quaternion, [1.0, 0.0, 0.0, 0.0]);

        let sample = Imu::from(&record);
        assert!((sample.accel.z + 9.81).abs() < 1e-6);
        assert!((sample.gyro.x - 0.5).abs() < 1e-6);
        assert!((sample.temperature - 23.45).abs() < 1e-6);
        assert!(sample.orientation.angle() < 1e-6);
    }

    #[test]
    fn test_imu_ex_decode() {
        let mut data = [0u8; IMU_EX_RECORD_LEN];
        data[0..4].copy_from_slice(&0.3f32.to_le_bytes());
        data[12..16].copy_from_slice(&2.0f32.to_le_bytes());
        data[28..32].copy_from_slice(&0.8f32.to_le_bytes());
        // velocity xyz + position xy valid
        data[52..54].copy_from_slice(&0b0001_1111u16.to_le_bytes());
        data[58..60].copy_from_slice(&99u16.to_le_bytes());

        let record = ImuExRecord::decode(&data).unwrap();
        assert!((record.us_distance - 0.8).abs() < 1e-6);
        assert_eq!(record.count, 99);

        let sample = Vo::from(&record);
        assert!((sample.velocity.x - 0.3).abs() < 1e-6);
        assert!((sample.position.x - 2.0).abs() < 1e-6);
        assert!(sample.is_valid.velocity.z);
        assert!(sample.is_valid.position.x);
        assert!(sample.is_valid.position.y);
        assert!(!sample.is_valid.position.z);
    }

    #[test]
    fn test_validity_bit_split() {
        let mvo = MvoValidity::from_flags(0b0101_0001);
        assert!(mvo.velocity.x);
        assert!(!mvo.velocity.y);
        assert!(mvo.position.x);
        assert!(!mvo.position.y);
        assert!(mvo.position.z);

        let vo = VoValidity::from_flags(0b1100_0000);
        assert!(vo.us_velocity);
        assert!(vo.us_distance);
        assert!(!vo.velocity.x);
    }
}
