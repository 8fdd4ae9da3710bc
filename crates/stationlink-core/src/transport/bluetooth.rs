//! Bluetooth transport: GATT characteristic reads from the sensor node.

use std::time::Duration;

use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::time::{sleep, timeout};

use async_trait::async_trait;
use stationlink_types::{SensorReading, TransportKind, wire};
use tracing::{debug, info};

use crate::config::BluetoothConfig;
use crate::error::{Error, Result};

use super::SensorTransport;

/// How often discovered peripherals are re-checked while scanning.
const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Reads JSON payloads from a GATT characteristic on the sensor node.
///
/// The node advertises under a configured local name; discovery scans until
/// the name shows up or the connect timeout elapses.
pub struct BluetoothTransport {
    config: BluetoothConfig,
    link: Option<Link>,
}

struct Link {
    peripheral: Peripheral,
    characteristic: Characteristic,
}

impl BluetoothTransport {
    pub fn new(config: BluetoothConfig) -> Self {
        Self { config, link: None }
    }

    async fn adapter() -> Result<Adapter> {
        let manager = Manager::new()
            .await
            .map_err(|e| Error::transport_unavailable(TransportKind::Bluetooth, e.to_string()))?;
        let adapters = manager
            .adapters()
            .await
            .map_err(|e| Error::transport_unavailable(TransportKind::Bluetooth, e.to_string()))?;
        adapters.into_iter().next().ok_or_else(|| {
            Error::transport_unavailable(TransportKind::Bluetooth, "no bluetooth adapter")
        })
    }

    /// Scan until a peripheral advertising the configured name appears.
    async fn find_peripheral(&self, adapter: &Adapter) -> Result<Peripheral> {
        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| Error::transport_unavailable(TransportKind::Bluetooth, e.to_string()))?;

        let found = timeout(self.config.connect_timeout, async {
            loop {
                let peripherals = adapter.peripherals().await.map_err(|e| {
                    Error::transport_unavailable(TransportKind::Bluetooth, e.to_string())
                })?;
                for peripheral in peripherals {
                    let name = peripheral
                        .properties()
                        .await
                        .ok()
                        .flatten()
                        .and_then(|p| p.local_name);
                    if name.as_deref() == Some(self.config.device_name.as_str()) {
                        return Ok(peripheral);
                    }
                }
                sleep(SCAN_POLL_INTERVAL).await;
            }
        })
        .await;

        let _ = adapter.stop_scan().await;

        match found {
            Ok(result) => result,
            Err(_) => Err(Error::transport_unavailable(
                TransportKind::Bluetooth,
                format!("device {:?} not found", self.config.device_name),
            )),
        }
    }

    fn find_characteristic(&self, peripheral: &Peripheral) -> Result<Characteristic> {
        for service in peripheral.services() {
            for characteristic in &service.characteristics {
                if characteristic.uuid == self.config.characteristic {
                    return Ok(characteristic.clone());
                }
            }
        }
        Err(Error::transport_unavailable(
            TransportKind::Bluetooth,
            format!("characteristic {} not found", self.config.characteristic),
        ))
    }
}

fn connect_timed_out(after: Duration) -> Error {
    Error::transport_unavailable(
        TransportKind::Bluetooth,
        format!("connect timed out after {after:?}"),
    )
}

#[async_trait]
impl SensorTransport for BluetoothTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Bluetooth
    }

    async fn connect(&mut self) -> Result<()> {
        if self.link.is_some() {
            return Ok(());
        }

        let adapter = Self::adapter().await?;
        let peripheral = self.find_peripheral(&adapter).await?;

        // A timeout here means the link never came up, not a stalled read.
        timeout(self.config.connect_timeout, peripheral.connect())
            .await
            .map_err(|_| connect_timed_out(self.config.connect_timeout))?
            .map_err(|e| Error::transport_unavailable(TransportKind::Bluetooth, e.to_string()))?;

        peripheral
            .discover_services()
            .await
            .map_err(|e| Error::transport_unavailable(TransportKind::Bluetooth, e.to_string()))?;

        let characteristic = self.find_characteristic(&peripheral)?;
        info!(device = %self.config.device_name, "bluetooth link established");
        self.link = Some(Link {
            peripheral,
            characteristic,
        });
        Ok(())
    }

    async fn read(&mut self) -> Result<SensorReading> {
        let link = self.link.as_ref().ok_or(Error::NotConnected)?;

        let data = timeout(
            self.config.read_timeout,
            link.peripheral.read(&link.characteristic),
        )
        .await
        .map_err(|_| Error::read_timeout(TransportKind::Bluetooth, self.config.read_timeout))?
        .map_err(|e| {
            Error::transport_unavailable(TransportKind::Bluetooth, e.to_string())
        })?;

        let payload = String::from_utf8(data)
            .map_err(|_| Error::MalformedPayload("characteristic value is not UTF-8".into()))?;
        Ok(wire::decode_reading(payload.trim())?)
    }

    async fn disconnect(&mut self) {
        if let Some(link) = self.link.take() {
            if let Err(e) = link.peripheral.disconnect().await {
                debug!(error = %e, "bluetooth disconnect failed");
            } else {
                debug!(device = %self.config.device_name, "bluetooth link closed");
            }
        }
    }
}
