//! # Tello Pilot
//!
//! Demo binary: connect to the drone, dump telemetry, land on Ctrl+C.

use anyhow::Result;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber;

use tello_pilot::{Config, Drone};

const CONFIG_PATH: &str = "config/default.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("tello-pilot v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = if Path::new(CONFIG_PATH).exists() {
        Config::load(CONFIG_PATH)?
    } else {
        warn!("{} not found, using defaults", CONFIG_PATH);
        Config::default()
    };

    let drone = Drone::new(config)?;

    let _connection_sub = drone.connection_state().subscribe(|state| {
        info!("connection: {:?}", state);
    });
    let _flight_sub = drone.flight_state().subscribe(|state| {
        info!("flight state: {:?}", state);
    });
    let _battery_sub = drone.flight_data().subscribe(|data| {
        if data.battery_low || data.battery_lower {
            warn!("battery at {}%", data.battery_percentage);
        }
    });
    let _proximity_sub = drone.proximity().subscribe(|distance| {
        info!("ground distance: {:.2} m", distance);
    });

    drone.connect();
    info!("Press Ctrl+C to land and exit");

    // Wait for Ctrl+C
    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    drone.land().await;
    drone.disconnect();

    Ok(())
}
