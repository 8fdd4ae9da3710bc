//! Connection configuration.
//!
//! Configuration is an explicit value passed into each component's
//! constructor; there is no process-wide singleton. [`LinkConfig::from_env`]
//! reads the environment-style keys the node deployments use
//! (`ARDUINO_PORT`, `BAUDRATE`, `WIFI_HOST`, `BT_DEVICE_NAME`,
//! `CONNECTION_PRIORITY`, `UPDATE_INTERVAL`, `CACHE_SIZE`, `CACHE_TIMEOUT`,
//! `MAX_RETRIES`), falling back to defaults for anything unset.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use uuid::Uuid;

use stationlink_types::TransportKind;

use crate::error::{Error, Result};

/// GATT characteristic holding the JSON reading (Environmental Sensing,
/// 0x181A expanded to the Bluetooth base UUID).
pub const READING_CHARACTERISTIC: Uuid = Uuid::from_u128(0x0000181a_0000_1000_8000_00805f9b34fb);

/// Serial link parameters.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Serial device path (e.g. `/dev/ttyUSB0` or `COM3`).
    pub port: String,
    /// Baud rate.
    pub baud: u32,
    /// Upper bound for a single line read.
    pub read_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud: 115_200,
            read_timeout: Duration::from_secs(1),
        }
    }
}

/// Wi-Fi polling parameters.
#[derive(Debug, Clone)]
pub struct WifiConfig {
    /// Host or IP of the node's HTTP endpoint.
    pub host: String,
    /// Timeout for each HTTP request.
    pub request_timeout: Duration,
}

impl WifiConfig {
    /// The full URL of the node's data endpoint.
    pub fn data_url(&self) -> String {
        format!("http://{}/data", self.host)
    }
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            host: "192.168.4.1".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Bluetooth Low Energy parameters.
#[derive(Debug, Clone)]
pub struct BluetoothConfig {
    /// Advertised peripheral name to connect to.
    pub device_name: String,
    /// Characteristic holding the JSON reading.
    pub characteristic: Uuid,
    /// Timeout for scan + connect.
    pub connect_timeout: Duration,
    /// Timeout for a characteristic read.
    pub read_timeout: Duration,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            device_name: "WeatherStation".to_string(),
            characteristic: READING_CHARACTERISTIC,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(5),
        }
    }
}

/// Full connection configuration for a sensor node link.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Serial transport parameters.
    pub serial: SerialConfig,
    /// Wi-Fi transport parameters.
    pub wifi: WifiConfig,
    /// Bluetooth transport parameters.
    pub bluetooth: BluetoothConfig,
    /// Failover order. Transports are attempted front to back.
    pub priority: Vec<TransportKind>,
    /// Maximum number of cached readings.
    pub cache_size: usize,
    /// How long a cached reading is served without touching a transport.
    pub cache_timeout: Duration,
    /// Poll period for the collector loop.
    pub update_interval: Duration,
    /// Reconnect cycles allowed before the manager gives up.
    pub max_retries: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            wifi: WifiConfig::default(),
            bluetooth: BluetoothConfig::default(),
            priority: TransportKind::DEFAULT_PRIORITY.to_vec(),
            cache_size: 1000,
            cache_timeout: Duration::from_secs(5),
            update_interval: Duration::from_secs(5),
            max_retries: 3,
        }
    }
}

impl LinkConfig {
    /// Build a configuration from environment variables, using defaults for
    /// anything unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a set variable cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(port) = env::var("ARDUINO_PORT") {
            config.serial.port = port;
        }
        if let Some(baud) = parse_env("BAUDRATE")? {
            config.serial.baud = baud;
        }
        if let Ok(host) = env::var("WIFI_HOST") {
            config.wifi.host = host;
        }
        if let Ok(name) = env::var("BT_DEVICE_NAME") {
            config.bluetooth.device_name = name;
        }
        if let Ok(raw) = env::var("CONNECTION_PRIORITY") {
            config.priority = parse_priority(&raw)?;
        }
        if let Some(secs) = parse_env::<u64>("UPDATE_INTERVAL")? {
            config.update_interval = Duration::from_secs(secs);
            config.cache_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_env::<u64>("CACHE_TIMEOUT")? {
            config.cache_timeout = Duration::from_secs(secs);
        }
        if let Some(size) = parse_env("CACHE_SIZE")? {
            config.cache_size = size;
        }
        if let Some(retries) = parse_env("MAX_RETRIES")? {
            config.max_retries = retries;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Checks that:
    /// - the priority list is non-empty and free of duplicates
    /// - `cache_size` is > 0
    /// - `baud` is > 0
    /// - `cache_timeout` and `update_interval` are > 0
    pub fn validate(&self) -> Result<()> {
        if self.priority.is_empty() {
            return Err(Error::invalid_config("priority list cannot be empty"));
        }
        let mut seen = std::collections::HashSet::new();
        for kind in &self.priority {
            if !seen.insert(kind) {
                return Err(Error::invalid_config(format!(
                    "duplicate transport '{kind}' in priority list"
                )));
            }
        }
        if self.cache_size == 0 {
            return Err(Error::invalid_config("cache_size must be > 0"));
        }
        if self.serial.baud == 0 {
            return Err(Error::invalid_config("baud rate must be > 0"));
        }
        if self.cache_timeout.is_zero() {
            return Err(Error::invalid_config("cache_timeout must be > 0"));
        }
        if self.update_interval.is_zero() {
            return Err(Error::invalid_config("update_interval must be > 0"));
        }
        Ok(())
    }
}

/// Parse a comma-separated priority list (e.g. `"wifi,bluetooth,serial"`).
pub fn parse_priority(raw: &str) -> Result<Vec<TransportKind>> {
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.parse::<TransportKind>()
                .map_err(|e| Error::invalid_config(e.to_string()))
        })
        .collect()
}

fn parse_env<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::invalid_config(format!("{key}='{raw}': {e}"))),
        Err(_) => Ok(None),
    }
}
