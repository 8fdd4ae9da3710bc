//! Core sensor reading and transport identifier types.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::ParseError;

/// A single validated environmental reading from the sensor node.
///
/// Readings are immutable once constructed: a transport adapter builds one
/// from a wire payload and it then flows unchanged through the validator,
/// the cache, and the broadcast pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Temperature in degrees Celsius.
    pub temperature: f64,
    /// Relative humidity percentage (0-100).
    pub humidity: f64,
    /// Atmospheric pressure in hPa.
    pub pressure: f64,
    /// When the reading was captured, as reported by the node (or the
    /// moment of decode if the node did not include one).
    #[serde(with = "crate::wire::timestamp")]
    pub timestamp: OffsetDateTime,
}

impl SensorReading {
    /// Create a reading captured now.
    pub fn new(temperature: f64, humidity: f64, pressure: f64) -> Self {
        Self {
            temperature,
            humidity,
            pressure,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// Create a reading with an explicit capture time.
    pub fn with_timestamp(
        temperature: f64,
        humidity: f64,
        pressure: f64,
        timestamp: OffsetDateTime,
    ) -> Self {
        Self {
            temperature,
            humidity,
            pressure,
            timestamp,
        }
    }
}

/// Identifies one of the alternative transports to the sensor node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Wi-Fi HTTP polling against the node's `/data` endpoint.
    Wifi,
    /// Bluetooth Low Energy GATT characteristic read.
    Bluetooth,
    /// Local serial link (newline-delimited JSON).
    Serial,
}

impl TransportKind {
    /// The default failover order: Wi-Fi, then Bluetooth, then Serial.
    pub const DEFAULT_PRIORITY: [TransportKind; 3] = [
        TransportKind::Wifi,
        TransportKind::Bluetooth,
        TransportKind::Serial,
    ];
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Wifi => write!(f, "wifi"),
            TransportKind::Bluetooth => write!(f, "bluetooth"),
            TransportKind::Serial => write!(f, "serial"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wifi" => Ok(TransportKind::Wifi),
            "bluetooth" | "ble" => Ok(TransportKind::Bluetooth),
            "serial" => Ok(TransportKind::Serial),
            other => Err(ParseError::Malformed(format!(
                "unknown transport '{other}'"
            ))),
        }
    }
}
