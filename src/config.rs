//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    #[serde(default)]
    pub controller: ControllerConfig,
}

/// Drone network configuration
#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Local port announced to the drone for out-of-band streams
    #[serde(default = "default_stream_port")]
    pub stream_port: u16,

    /// Receive watchdog window
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Verify CRC-8/CRC-16 on inbound frames
    #[serde(default)]
    pub verify_crc: bool,
}

/// Heartbeat configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HeartbeatConfig {
    #[serde(default = "default_heartbeat_interval_ms")]
    pub interval_ms: u64,
}

/// Position controller configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ControllerConfig {
    /// Convergence deadband applied to every axis
    #[serde(default = "default_deadband")]
    pub deadband: f32,

    /// Convergence ring buffer capacity
    #[serde(default = "default_convergence_window")]
    pub convergence_window: usize,

    #[serde(default = "default_horizontal_gains")]
    pub x: AxisConfig,

    #[serde(default = "default_horizontal_gains")]
    pub y: AxisConfig,

    #[serde(default = "default_vertical_gains")]
    pub z: AxisConfig,

    #[serde(default = "default_yaw_gains")]
    pub yaw: AxisConfig,
}

/// PID gains for one controller axis
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct AxisConfig {
    #[serde(default)]
    pub p: f32,

    #[serde(default)]
    pub i: f32,

    #[serde(default)]
    pub d: f32,
}

// Default value functions
fn default_host() -> String { "192.168.10.1".to_string() }
fn default_port() -> u16 { 8889 }
fn default_stream_port() -> u16 { 6038 }
fn default_timeout_ms() -> u64 { 2000 }

fn default_heartbeat_interval_ms() -> u64 { 50 }

fn default_deadband() -> f32 { 0.05 }
fn default_convergence_window() -> usize { 5 }
fn default_horizontal_gains() -> AxisConfig { AxisConfig { p: 0.6, i: 0.0, d: 0.1 } }
fn default_vertical_gains() -> AxisConfig { AxisConfig { p: 0.8, i: 0.0, d: 0.1 } }
fn default_yaw_gains() -> AxisConfig { AxisConfig { p: 0.4, i: 0.0, d: 0.0 } }

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            stream_port: default_stream_port(),
            timeout_ms: default_timeout_ms(),
            verify_crc: false,
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_heartbeat_interval_ms(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            deadband: default_deadband(),
            convergence_window: default_convergence_window(),
            x: default_horizontal_gains(),
            y: default_horizontal_gains(),
            z: default_vertical_gains(),
            yaw: default_yaw_gains(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// The drone's command endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the configured host is not a valid IP address.
    pub fn drone_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.network.host, self.network.port).parse()?)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.network.host.is_empty() {
            return Err(crate::error::TelloPilotError::Config(
                toml::de::Error::custom("network host cannot be empty")
            ));
        }

        if self.network.port == 0 {
            return Err(crate::error::TelloPilotError::Config(
                toml::de::Error::custom("network port must be non-zero")
            ));
        }

        if self.network.timeout_ms == 0 || self.network.timeout_ms > 10000 {
            return Err(crate::error::TelloPilotError::Config(
                toml::de::Error::custom("timeout_ms must be between 1 and 10000")
            ));
        }

        if self.heartbeat.interval_ms == 0 || self.heartbeat.interval_ms > 1000 {
            return Err(crate::error::TelloPilotError::Config(
                toml::de::Error::custom("heartbeat interval_ms must be between 1 and 1000")
            ));
        }

        if self.controller.deadband < 0.0 {
            return Err(crate::error::TelloPilotError::Config(
                toml::de::Error::custom("controller deadband must be non-negative")
            ));
        }

        if self.controller.convergence_window == 0 {
            return Err(crate::error::TelloPilotError::Config(
                toml::de::Error::custom("convergence_window must be greater than 0")
            ));
        }

        for (name, axis) in [
            ("x", self.controller.x),
            ("y", self.controller.y),
            ("z", self.controller.z),
            ("yaw", self.controller.yaw),
        ] {
            if axis.p < 0.0 || axis.i < 0.0 || axis.d < 0.0 {
                return Err(crate::error::TelloPilotError::Config(
                    toml::de::Error::custom(format!("{} axis gains must be non-negative", name))
                ));
            }
        }

        Ok(())
    }
}
