//! Transport adapters for reaching the sensor node.
//!
//! Each adapter speaks one physical link (Wi-Fi HTTP, Bluetooth LE, or a
//! serial line) and normalizes it to the same [`SensorTransport`] surface:
//! connect, pull one reading, disconnect. The connection manager treats
//! adapters uniformly and only cares about the order they are tried in.

mod bluetooth;
mod serial;
mod wifi;

pub use bluetooth::BluetoothTransport;
pub use serial::SerialTransport;
pub use wifi::WifiTransport;

use async_trait::async_trait;
use stationlink_types::{SensorReading, TransportKind};

use crate::config::LinkConfig;
use crate::error::Result;

/// A single link to the sensor node.
///
/// Implementations hold their own connection state. `read` is only
/// meaningful after a successful `connect`; calling it on a disconnected
/// adapter returns [`Error::NotConnected`](crate::Error::NotConnected).
#[async_trait]
pub trait SensorTransport: Send {
    /// Which link this adapter speaks.
    fn kind(&self) -> TransportKind;

    /// Establish the link. Idempotent when already connected.
    async fn connect(&mut self) -> Result<()>;

    /// Pull one decoded reading from the node.
    async fn read(&mut self) -> Result<SensorReading>;

    /// Tear the link down. Never fails; errors during teardown are logged
    /// and swallowed.
    async fn disconnect(&mut self);
}

/// Build the adapter chain in the configured priority order.
pub fn build_transports(config: &LinkConfig) -> Vec<Box<dyn SensorTransport>> {
    config
        .priority
        .iter()
        .map(|kind| -> Box<dyn SensorTransport> {
            match kind {
                TransportKind::Wifi => Box::new(WifiTransport::new(config.wifi.clone())),
                TransportKind::Bluetooth => {
                    Box::new(BluetoothTransport::new(config.bluetooth.clone()))
                }
                TransportKind::Serial => Box::new(SerialTransport::new(config.serial.clone())),
            }
        })
        .collect()
}
