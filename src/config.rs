//! Runtime configuration, read from the environment.

use std::{env, time::Duration};

use thiserror::Error;

use crate::models::raw_value::DeviceId;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {0}: '{1}'.")]
    Invalid(String, String),
}

/// Everything the bridge needs to know about its surroundings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub display_port: String,
    pub display_baud: u32,
    pub venus_host: String,
    pub venus_port: u16,
    pub venus_portal_id: String,
    pub venus_settle: Duration,
    pub battery_device: DeviceId,
    pub roof_device: DeviceId,
    pub ground_device: DeviceId,
    pub sensor_host: String,
    pub sensor_port: u16,
    pub sensor_topic: String,
    pub reconnect_interval: Duration,
}

impl BridgeConfig {
    /// Read configuration from `BRIDGE_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            display_port: read("BRIDGE_DISPLAY_PORT", "/dev/ttyS0"),
            display_baud: parse(&lookup, "BRIDGE_DISPLAY_BAUD", 9600)?,
            venus_host: read("BRIDGE_VENUS_HOST", "127.0.0.1"),
            venus_port: parse(&lookup, "BRIDGE_VENUS_PORT", 1883)?,
            venus_portal_id: read("BRIDGE_VENUS_PORTAL_ID", "venus"),
            venus_settle: Duration::from_millis(parse(&lookup, "BRIDGE_VENUS_SETTLE_MS", 2000)?),
            battery_device: DeviceId(read("BRIDGE_BATTERY_DEVICE", "battery/0")),
            roof_device: DeviceId(read("BRIDGE_ROOF_DEVICE", "solarcharger/1")),
            ground_device: DeviceId(read("BRIDGE_GROUND_DEVICE", "solarcharger/2")),
            sensor_host: read("BRIDGE_SENSOR_HOST", "127.0.0.1"),
            sensor_port: parse(&lookup, "BRIDGE_SENSOR_PORT", 1883)?,
            sensor_topic: read("BRIDGE_SENSOR_TOPIC", "temphum/#"),
            reconnect_interval: Duration::from_secs(parse(
                &lookup,
                "BRIDGE_RECONNECT_SECONDS",
                5,
            )?),
        })
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid(key.to_string(), value)),
    }
}
