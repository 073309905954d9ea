//! # Drone Facade
//!
//! Wires the transport, heartbeat, flight-log decoder, telemetry channels
//! and position controller together, and exposes the command surface.
//!
//! This module handles:
//! - Message handler registration and telemetry fan-out
//! - Flight-state derivation from flight data
//! - Rotation of log-stream samples into the canonical frame
//! - Commands: connect, takeoff, land, goTo, manual sticks, calibration

pub mod frame;

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Datelike, Local, Timelike};
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::control::{Axis, Gains, Pid, PositionController, ResetReason};
use crate::error::Result;
use crate::flightlog::{parse_log_payload, Imu, LogEntry, Mvo, Vo};
use crate::heartbeat::Heartbeat;
use crate::protocol::{
    encode_packet, msg, FlightData, TYPE_INFO_COMMAND, TYPE_INFO_DATA,
};
use crate::telemetry::{SensorChannel, Subscription};
use crate::transport::{ConnectionState, UdpTransport};
use crate::types::{Controls, FlightState, Pose, PositionSample, YawSample};

use frame::{rotate_covariance, rotate_orientation, rotate_vector, yaw_of};

/// Which odometry stream feeds the controller's position axes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSource {
    /// 5 Hz multiview visual odometry
    Mvo,
    /// 10 Hz visual-inertial odometry
    Vo,
}

/// Sensor calibration kinds accepted by the calibrate command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Calibration {
    Imu = 0,
    Center = 1,
}

/// Host-side client for one drone
///
/// Owns the transport, the heartbeat sender, the position controller and
/// every telemetry channel. Create with [`Drone::new`], then [`Drone::connect`].
pub struct Drone {
    transport: Arc<UdpTransport>,
    heartbeat: Heartbeat,
    controller: Arc<Mutex<PositionController>>,
    sequence: Arc<AtomicU16>,
    position_source: Arc<Mutex<PositionSource>>,

    flight_data: SensorChannel<FlightData>,
    flight_state: SensorChannel<FlightState>,
    wifi_strength: SensorChannel<u8>,
    imu: SensorChannel<Imu>,
    mvo: SensorChannel<Mvo>,
    vo: SensorChannel<Vo>,
    proximity: SensorChannel<f32>,
    controls: SensorChannel<Controls>,

    ctrl_position: SensorChannel<PositionSample>,
    ctrl_yaw: SensorChannel<YawSample>,

    _subscriptions: Vec<Subscription>,
}

impl Drone {
    /// Build a client from a validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the controller
    /// gains are rejected.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let drone_addr = config.drone_addr()?;

        let pid = |axis: crate::config::AxisConfig| {
            Pid::with_window(
                Gains {
                    p: axis.p,
                    i: axis.i,
                    d: axis.d,
                },
                config.controller.deadband,
                config.controller.convergence_window,
            )
        };
        let controller = Arc::new(Mutex::new(PositionController::new(
            pid(config.controller.x)?,
            pid(config.controller.y)?,
            pid(config.controller.z)?,
            pid(config.controller.yaw)?,
        )));

        let transport = Arc::new(UdpTransport::new(
            drone_addr,
            config.network.stream_port,
            Duration::from_millis(config.network.timeout_ms),
            config.network.verify_crc,
        ));

        let sequence = Arc::new(AtomicU16::new(0));
        let heartbeat = Heartbeat::new(
            Duration::from_millis(config.heartbeat.interval_ms),
            Arc::clone(&sequence),
        );

        let ctrl_position = SensorChannel::raw();
        let ctrl_yaw = SensorChannel::raw();
        let controls = PositionController::attach(&controller, &ctrl_position, &ctrl_yaw);

        let mut subscriptions = Vec::new();

        // Controller output feeds the heartbeat's snapshot
        let cell = heartbeat.controls_cell();
        subscriptions.push(controls.subscribe(move |output: &Controls| {
            *cell.lock().unwrap() = *output;
        }));

        // A controller reset stops streaming stale corrections
        let cell = heartbeat.controls_cell();
        subscriptions.push(controller.lock().unwrap().state_channel().subscribe(
            move |state: &crate::control::ControlState| {
                if matches!(state, crate::control::ControlState::Reset(_)) {
                    *cell.lock().unwrap() = Controls::default();
                }
            },
        ));

        let drone = Self {
            transport,
            heartbeat,
            controller,
            sequence,
            position_source: Arc::new(Mutex::new(PositionSource::Vo)),
            flight_data: SensorChannel::raw(),
            flight_state: SensorChannel::deduplicating(),
            wifi_strength: SensorChannel::deduplicating(),
            imu: SensorChannel::raw(),
            mvo: SensorChannel::raw(),
            vo: SensorChannel::raw(),
            proximity: SensorChannel::raw(),
            controls,
            ctrl_position,
            ctrl_yaw,
            _subscriptions: subscriptions,
        };

        drone.register_handlers();
        Ok(drone)
    }

    /// Build a client with default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(Config::default())
    }

    /// Build a client for a specific endpoint, defaults otherwise
    pub fn with_address(host: &str, port: u16) -> Result<Self> {
        let mut config = Config::default();
        config.network.host = host.to_string();
        config.network.port = port;
        Self::new(config)
    }

    fn register_handlers(&self) {
        let flight_data = self.flight_data.clone();
        let flight_state = self.flight_state.clone();
        self.transport.register_handler(
            msg::FLIGHT_MSG,
            Box::new(move |_, payload| match FlightData::decode(payload) {
                Ok(data) => {
                    flight_data.write(data);
                    if let Some(state) = FlightState::derive(data.fly_mode, data.em_sky) {
                        flight_state.write(state);
                    }
                }
                Err(e) => warn!("dropping flight data: {}", e),
            }),
        );

        let wifi_strength = self.wifi_strength.clone();
        self.transport.register_handler(
            msg::WIFI_STRENGTH_MSG,
            Box::new(move |_, payload| {
                if let Some(&strength) = payload.first() {
                    wifi_strength.write(strength);
                }
            }),
        );

        self.transport.register_handler(
            msg::LIGHT_MSG,
            Box::new(move |_, payload| {
                trace!("light message, {} bytes", payload.len());
            }),
        );

        self.transport.register_handler(
            msg::LOG_CONFIG_MSG,
            Box::new(move |_, payload| {
                debug!("log config message, {} bytes", payload.len());
            }),
        );

        for (id, name) in [
            (msg::TAKEOFF_CMD, "takeoff"),
            (msg::LAND_CMD, "land"),
            (msg::CALIBRATE_CMD, "calibrate"),
            (msg::ALT_LIMIT_MSG, "altitude limit"),
        ] {
            self.transport.register_handler(
                id,
                Box::new(move |_, payload| {
                    debug!("{} acknowledged, {} bytes", name, payload.len());
                }),
            );
        }

        for (id, name) in [(msg::ERROR_1_MSG, "error1"), (msg::ERROR_2_MSG, "error2")] {
            self.transport.register_handler(
                id,
                Box::new(move |_, payload| {
                    warn!("drone {}: {}", name, String::from_utf8_lossy(payload));
                }),
            );
        }

        // The log header must be acknowledged before the drone starts
        // streaming log data
        let transport = Arc::clone(&self.transport);
        let sequence = Arc::clone(&self.sequence);
        self.transport.register_handler(
            msg::LOG_HEADER_MSG,
            Box::new(move |_, payload| {
                if payload.len() < 3 {
                    warn!("log header of {} bytes, ignoring", payload.len());
                    return;
                }
                let ack = encode_packet(
                    TYPE_INFO_DATA,
                    msg::LOG_HEADER_MSG,
                    sequence.fetch_add(1, Ordering::SeqCst),
                    &payload[..3],
                );
                let transport = Arc::clone(&transport);
                tokio::spawn(async move { transport.send(&ack).await });
            }),
        );

        let transport = Arc::clone(&self.transport);
        let sequence = Arc::clone(&self.sequence);
        self.transport.register_handler(
            msg::TIME_CMD,
            Box::new(move |_, _| {
                let reply = encode_packet(
                    TYPE_INFO_DATA,
                    msg::TIME_CMD,
                    sequence.fetch_add(1, Ordering::SeqCst),
                    &time_payload(Local::now()),
                );
                let transport = Arc::clone(&transport);
                tokio::spawn(async move { transport.send(&reply).await });
            }),
        );

        let mvo_ch = self.mvo.clone();
        let imu_ch = self.imu.clone();
        let vo_ch = self.vo.clone();
        let proximity_ch = self.proximity.clone();
        let ctrl_position = self.ctrl_position.clone();
        let ctrl_yaw = self.ctrl_yaw.clone();
        let position_source = Arc::clone(&self.position_source);
        self.transport.register_handler(
            msg::LOG_DATA_MSG,
            Box::new(move |_, payload| {
                let entries = match parse_log_payload(payload) {
                    Ok(entries) => entries,
                    Err(e) => {
                        warn!("discarding log payload: {}", e);
                        return;
                    }
                };

                let source = *position_source.lock().unwrap();
                for entry in entries {
                    match entry {
                        LogEntry::Mvo(raw) => {
                            let sample = Mvo {
                                velocity: rotate_vector(&raw.velocity),
                                position: rotate_vector(&raw.position),
                                position_cov: rotate_covariance(&raw.position_cov),
                                velocity_cov: rotate_covariance(&raw.velocity_cov),
                                height: raw.height,
                                height_variance: raw.height_variance,
                                is_valid: raw.is_valid,
                            };
                            mvo_ch.write(sample);
                            if source == PositionSource::Mvo {
                                ctrl_position.write(PositionSample {
                                    x: sample.position.x,
                                    y: sample.position.y,
                                    z: sample.position.z,
                                    valid_xy: sample.is_valid.position.x
                                        && sample.is_valid.position.y,
                                });
                            }
                        }
                        LogEntry::Imu(raw) => {
                            let sample = Imu {
                                accel: rotate_vector(&raw.accel),
                                gyro: rotate_vector(&raw.gyro),
                                orientation: rotate_orientation(&raw.orientation),
                                temperature: raw.temperature,
                            };
                            imu_ch.write(sample);
                            ctrl_yaw.write(YawSample {
                                yaw: yaw_of(&sample.orientation),
                            });
                        }
                        LogEntry::Vo(raw) => {
                            let sample = Vo {
                                velocity: rotate_vector(&raw.velocity),
                                position: rotate_vector(&raw.position),
                                is_valid: raw.is_valid,
                            };
                            vo_ch.write(sample);
                            if source == PositionSource::Vo {
                                ctrl_position.write(PositionSample {
                                    x: sample.position.x,
                                    y: sample.position.y,
                                    z: sample.position.z,
                                    valid_xy: sample.is_valid.position.x
                                        && sample.is_valid.position.y,
                                });
                            }
                        }
                        LogEntry::Proximity(distance) => proximity_ch.write(distance),
                        LogEntry::Unhandled { record_type, .. } => {
                            trace!("unhandled log record 0x{:04X}", record_type);
                        }
                        LogEntry::Unknown { record_type, .. } => {
                            trace!("unknown log record 0x{:04X}", record_type);
                        }
                    }
                }
            }),
        );
    }

    /// Start the transport handshake and the heartbeat
    pub fn connect(&self) {
        info!("connecting");
        self.transport.connect();
        self.heartbeat.start(Arc::clone(&self.transport));
    }

    /// Cancel any target, stop the heartbeat and tear down the transport
    pub fn disconnect(&self) {
        self.controller
            .lock()
            .unwrap()
            .reset(ResetReason::TargetCanceled);
        self.heartbeat.stop();
        self.transport.disconnect();
    }

    pub async fn takeoff(&self) {
        self.send_command(msg::TAKEOFF_CMD, &[]).await;
    }

    /// Land; cancels any active target
    pub async fn land(&self) {
        self.controller
            .lock()
            .unwrap()
            .reset(ResetReason::TargetCanceled);
        self.send_command(msg::LAND_CMD, &[0x00]).await;
    }

    pub async fn cancel_landing(&self) {
        self.send_command(msg::LAND_CMD, &[0x01]).await;
    }

    /// Kill the motors immediately
    ///
    /// The drone accepts this on its out-of-band ASCII surface, like the
    /// handshake; there is no binary message id for it.
    pub async fn emergency(&self) {
        self.transport.send(b"emergency").await;
    }

    /// Request a sensor calibration
    ///
    /// IMU calibration requires repositioning the drone between poses;
    /// this only sends the command.
    pub async fn calibrate(&self, kind: Calibration) {
        self.send_command(msg::CALIBRATE_CMD, &[kind as u8]).await;
    }

    pub async fn set_altitude_limit(&self, metres: u8) {
        self.send_command(msg::ALT_LIMIT_CMD, &[metres, 0x00]).await;
    }

    /// Push a time onto the drone's clock
    pub async fn set_time_date(&self, time: DateTime<Local>) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let frame = encode_packet(TYPE_INFO_DATA, msg::TIME_CMD, seq, &time_payload(time));
        self.transport.send(&frame).await;
    }

    /// Drive the sticks directly; cancels any active target
    pub fn manual_sticks(&self, roll: f32, pitch: f32, yaw: f32, thrust: f32) {
        self.controller
            .lock()
            .unwrap()
            .reset(ResetReason::TargetCanceled);
        self.heartbeat.set_controls(Controls {
            roll: Some(roll),
            pitch: Some(pitch),
            yaw: Some(yaw),
            thrust: Some(thrust),
        });
    }

    /// Toggle the stick packet's fast-mode bit
    pub fn set_fast_mode(&self, on: bool) {
        self.heartbeat.set_fast_mode(on);
    }

    /// Fly to a target pose in the controller's frame
    ///
    /// Unset fields leave their axes undriven.
    pub fn go_to(&self, target: Pose) {
        self.controller.lock().unwrap().set_target(target);
    }

    /// Rotate to a target yaw, leaving position undriven
    pub fn go_to_yaw(&self, yaw: f32) {
        self.go_to(Pose {
            yaw: Some(yaw),
            ..Default::default()
        });
    }

    /// Cancel any target and stream neutral sticks
    pub fn hover(&self) {
        self.controller
            .lock()
            .unwrap()
            .reset(ResetReason::TargetCanceled);
        self.heartbeat.set_controls(Controls::default());
    }

    /// Select which odometry stream feeds the controller's position axes
    ///
    /// Orientation always comes from the IMU stream.
    pub fn set_controller_source(&self, source: PositionSource) {
        *self.position_source.lock().unwrap() = source;
    }

    /// Replace one axis' gains; rejected values are logged and ignored
    pub fn set_controller_gains(&self, axis: Axis, gains: Gains) {
        if let Err(e) = self.controller.lock().unwrap().set_axis_gains(axis, gains) {
            warn!("gains rejected: {}", e);
        }
    }

    /// Replace one axis' deadband; rejected values are logged and ignored
    pub fn set_controller_deadband(&self, axis: Axis, deadband: f32) {
        if let Err(e) = self
            .controller
            .lock()
            .unwrap()
            .set_axis_deadband(axis, deadband)
        {
            warn!("deadband rejected: {}", e);
        }
    }

    /// Shift the controller's frame
    pub fn set_origin(&self, origin: Pose) {
        self.controller.lock().unwrap().set_origin(origin);
    }

    /// Use the controller's latest aggregated input as origin
    pub fn set_origin_to_current_pose(&self) {
        self.controller.lock().unwrap().set_origin_to_current_pose();
    }

    /// Compose an origin from the latest VO position, proximity height and
    /// IMU yaw
    pub fn set_origin_to_vo(&self) {
        let origin = Pose {
            x: self.vo.last().map(|v| v.position.x),
            y: self.vo.last().map(|v| v.position.y),
            z: self.proximity.last(),
            yaw: self.imu.last().map(|i| yaw_of(&i.orientation)),
        };
        self.controller.lock().unwrap().set_origin(origin);
    }

    async fn send_command(&self, message_id: u16, payload: &[u8]) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let frame = encode_packet(TYPE_INFO_COMMAND, message_id, seq, payload);
        self.transport.send(&frame).await;
    }

    // Telemetry channel accessors

    pub fn connection_state(&self) -> SensorChannel<ConnectionState> {
        self.transport.state_channel()
    }

    pub fn flight_data(&self) -> SensorChannel<FlightData> {
        self.flight_data.clone()
    }

    pub fn flight_state(&self) -> SensorChannel<FlightState> {
        self.flight_state.clone()
    }

    pub fn wifi_strength(&self) -> SensorChannel<u8> {
        self.wifi_strength.clone()
    }

    pub fn imu(&self) -> SensorChannel<Imu> {
        self.imu.clone()
    }

    pub fn mvo(&self) -> SensorChannel<Mvo> {
        self.mvo.clone()
    }

    pub fn vo(&self) -> SensorChannel<Vo> {
        self.vo.clone()
    }

    pub fn proximity(&self) -> SensorChannel<f32> {
        self.proximity.clone()
    }

    /// Controller output channel (sparse stick corrections)
    pub fn controls(&self) -> SensorChannel<Controls> {
        self.controls.clone()
    }

    pub fn controller_state(&self) -> SensorChannel<crate::control::ControlState> {
        self.controller.lock().unwrap().state_channel()
    }
}

impl Drop for Drone {
    fn drop(&mut self) {
        self.heartbeat.stop();
        self.transport.disconnect();
    }
}

/// Build the 15-byte time payload: a zero byte followed by year, month,
/// day, hour, minute, second and millisecond, each as little-endian u16
fn time_payload(time: DateTime<Local>) -> [u8; 15] {
    let mut payload = [0u8; 15];
    let fields = [
        time.year() as u16,
        time.month() as u16,
        time.day() as u16,
        time.hour() as u16,
        time.minute() as u16,
        time.second() as u16,
        (time.timestamp_subsec_millis() % 1000) as u16,
    ];
    for (i, field) in fields.iter().enumerate() {
        payload[1 + 2 * i..3 + 2 * i].copy_from_slice(&field.to_le_bytes());
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flightlog::{record_type, LOG_HEADER_LEN, MVO_RECORD_LEN};
    use crate::protocol::{decode_frame, FLIGHT_DATA_LEN, LOG_RECORD_MAGIC, TYPE_INFO_STICK};
    use chrono::TimeZone;
    use tokio::net::UdpSocket;

    #[test]
    fn test_time_payload_layout() {
        let time = Local.with_ymd_and_hms(2021, 3, 27, 13, 37, 59).unwrap();
        let payload = time_payload(time);

        assert_eq!(payload[0], 0x00);
        assert_eq!(u16::from_le_bytes([payload[1], payload[2]]), 2021);
        assert_eq!(u16::from_le_bytes([payload[3], payload[4]]), 3);
        assert_eq!(u16::from_le_bytes([payload[5], payload[6]]), 27);
        assert_eq!(u16::from_le_bytes([payload[7], payload[8]]), 13);
        assert_eq!(u16::from_le_bytes([payload[9], payload[10]]), 37);
        assert_eq!(u16::from_le_bytes([payload[11], payload[12]]), 59);
        assert_eq!(u16::from_le_bytes([payload[13], payload[14]]), 0);
    }

    /// Build one obfuscated log record
    fn make_log_record(record_type: u16, xor_key: u8, plain: &[u8]) -> Vec<u8> {
        let record_length = (LOG_HEADER_LEN + plain.len() + 2) as u16;
        let mut record = Vec::new();
        record.push(LOG_RECORD_MAGIC);
        record.extend_from_slice(&record_length.to_le_bytes());
        record.push(0x00);
        record.extend_from_slice(&record_type.to_le_bytes());
        record.push(xor_key);
        record.extend_from_slice(&[0, 0, 0]);
        record.extend(plain.iter().map(|b| b ^ xor_key));
        record.extend_from_slice(&[0, 0]);
        record
    }

    fn log_data_frame(records: &[Vec<u8>], seq: u16) -> Vec<u8> {
        let mut payload = vec![0x00];
        for record in records {
            payload.extend_from_slice(record);
        }
        encode_packet(TYPE_INFO_DATA, msg::LOG_DATA_MSG, seq, &payload)
    }

    struct Harness {
        drone_sock: UdpSocket,
        drone: Drone,
        peer: std::net::SocketAddr,
    }

    async fn connect_harness() -> Harness {
        let drone_sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let mut config = Config::default();
        config.network.host = "127.0.0.1".to_string();
        config.network.port = drone_sock.local_addr().unwrap().port();
        config.heartbeat.interval_ms = 20;
        let drone = Drone::new(config).unwrap();

        drone.connect();

        let mut buf = [0u8; 64];
        let (len, peer) = drone_sock.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"conn_req:\x96\x17");
        drone_sock.send_to(b"conn_ack:\x96\x17", peer).await.unwrap();

        let states = drone.connection_state();
        for _ in 0..250 {
            if states.last() == Some(ConnectionState::Connected) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(states.last(), Some(ConnectionState::Connected));

        Harness {
            drone_sock,
            drone,
            peer,
        }
    }

    async fn wait_for<T, F: Fn() -> Option<T>>(poll: F) -> T {
        for _ in 0..250 {
            if let Some(value) = poll() {
                return value;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for condition");
    }

    /// Receive frames until one matches the message id, skipping heartbeat
    /// sticks and anything else
    async fn recv_frame(sock: &UdpSocket, message_id: u16) -> (u8, Vec<u8>) {
        let mut buf = [0u8; 2048];
        for _ in 0..200 {
            let len = tokio::time::timeout(Duration::from_secs(2), sock.recv(&mut buf))
                .await
                .expect("no datagram")
                .unwrap();
            if let Ok((preamble, payload)) = decode_frame(&buf[..len], false) {
                if preamble.message_id == message_id {
                    return (preamble.type_info.to_byte(), payload.to_vec());
                }
            }
        }
        panic!("frame 0x{:04X} never arrived", message_id);
    }

    #[tokio::test]
    async fn test_heartbeat_streams_stick_packets() {
        let h = connect_harness().await;
        h.drone_sock.connect(h.peer).await.unwrap();

        let (type_info, payload) = recv_frame(&h.drone_sock, msg::STICK_CMD).await;
        assert_eq!(type_info, TYPE_INFO_STICK);
        assert_eq!(payload.len(), 14);

        h.drone.disconnect();
    }

    #[tokio::test]
    async fn test_flight_data_derives_hovering() {
        let h = connect_harness().await;

        let mut data = [0u8; FLIGHT_DATA_LEN];
        data[12] = 72; // battery
        data[17] = 0x01; // emSky
        data[18] = 6; // flyMode
        let frame = encode_packet(TYPE_INFO_DATA, msg::FLIGHT_MSG, 1, &data);
        h.drone_sock.send_to(&frame, h.peer).await.unwrap();

        let flight_state = h.drone.flight_state();
        let state = wait_for(|| flight_state.last()).await;
        assert_eq!(state, FlightState::Hovering);
        assert_eq!(h.drone.flight_data().last().unwrap().battery_percentage, 72);

        h.drone.disconnect();
    }

    #[tokio::test]
    async fn test_proximity_record_end_to_end() {
        let h = connect_harness().await;

        // 1000 mm, XOR key 0x5A: bytes {0xE8, 0x03} travel as {0xB2, 0x59}
        let record = make_log_record(record_type::ULTRASONIC, 0x5A, &[0xE8, 0x03]);
        assert_eq!(&record[LOG_HEADER_LEN..LOG_HEADER_LEN + 2], &[0xB2, 0x59]);

        let frame = log_data_frame(&[record], 2);
        h.drone_sock.send_to(&frame, h.peer).await.unwrap();

        let proximity = h.drone.proximity();
        let distance = wait_for(|| proximity.last()).await;
        assert!((distance - 1.0).abs() < 1e-6);

        h.drone.disconnect();
    }

    #[tokio::test]
    async fn test_mvo_position_is_rotated() {
        let h = connect_harness().await;

        let mut plain = vec![0u8; MVO_RECORD_LEN];
        plain[8..12].copy_from_slice(&1.0f32.to_le_bytes());
        plain[12..16].copy_from_slice(&2.0f32.to_le_bytes());
        plain[16..20].copy_from_slice(&(-3.0f32).to_le_bytes());
        plain[76] = 0x77;
        let record = make_log_record(record_type::MVO, 0xC3, &plain);

        let frame = log_data_frame(&[record], 3);
        h.drone_sock.send_to(&frame, h.peer).await.unwrap();

        let mvo = h.drone.mvo();
        let sample = wait_for(|| mvo.last()).await;
        assert_eq!(sample.position.x, 1.0);
        assert_eq!(sample.position.y, -2.0);
        assert_eq!(sample.position.z, 3.0);

        h.drone.disconnect();
    }

    #[tokio::test]
    async fn test_log_header_is_acknowledged() {
        let h = connect_harness().await;
        h.drone_sock.connect(h.peer).await.unwrap();

        let header_frame = encode_packet(
            TYPE_INFO_DATA,
            msg::LOG_HEADER_MSG,
            4,
            &[0x00, 0x12, 0x34, 0xFF, 0xFF],
        );
        h.drone_sock.send(&header_frame).await.unwrap();

        let (type_info, payload) = recv_frame(&h.drone_sock, msg::LOG_HEADER_MSG).await;
        assert_eq!(type_info, TYPE_INFO_DATA);
        assert_eq!(payload, vec![0x00, 0x12, 0x34]);

        h.drone.disconnect();
    }

    #[tokio::test]
    async fn test_go_to_drives_heartbeat_sticks() {
        let h = connect_harness().await;
        h.drone_sock.connect(h.peer).await.unwrap();

        h.drone.go_to(Pose {
            x: Some(1.0),
            ..Default::default()
        });

        // A VO sample at the origin, x/y valid
        let mut plain = vec![0u8; 60];
        plain[52..54].copy_from_slice(&0b0011_1111u16.to_le_bytes());
        let record = make_log_record(record_type::IMU_EX, 0x11, &plain);
        h.drone_sock.send(&log_data_frame(&[record], 5)).await.unwrap();

        // pitch correction = kP * (1 - 0) with default kP 0.6, encoded as
        // 1024 + round(660 * 0.6)
        let expected_axis = 1024 + (660.0f32 * 0.6).round() as u64;
        let mut matched = false;
        for _ in 0..100 {
            let (_, payload) = recv_frame(&h.drone_sock, msg::STICK_CMD).await;
            let mut packed = 0u64;
            for (i, &b) in payload[..7].iter().enumerate() {
                packed |= (b as u64) << (8 * i);
            }
            if (packed >> 11) & 0x7FF == expected_axis {
                matched = true;
                break;
            }
        }
        assert!(matched, "stick pitch never reflected the correction");

        h.drone.disconnect();
    }

    #[tokio::test]
    async fn test_manual_sticks_cancel_target() {
        // No connection needed: the control loop runs on the channels
        let drone = Drone::with_defaults().unwrap();

        drone.go_to(Pose {
            x: Some(1.0),
            ..Default::default()
        });
        drone.ctrl_position.write(PositionSample {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            valid_xy: true,
        });
        assert_eq!(
            drone.controller_state().last(),
            Some(crate::control::ControlState::Correcting)
        );

        drone.manual_sticks(0.1, 0.2, 0.3, 0.4);

        assert_eq!(
            drone.controller_state().last(),
            Some(crate::control::ControlState::Idle)
        );
        assert_eq!(drone.controller.lock().unwrap().target(), None);
        assert_eq!(drone.heartbeat.controls().pitch, Some(0.2));
    }
}
