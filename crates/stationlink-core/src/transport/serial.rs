//! Serial transport: newline-delimited JSON over a local UART link.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::timeout;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use async_trait::async_trait;
use stationlink_types::{SensorReading, TransportKind, wire};
use tracing::debug;

use crate::config::SerialConfig;
use crate::error::{Error, Result};

use super::SensorTransport;

/// Reads line-framed JSON payloads from a serial port.
pub struct SerialTransport {
    config: SerialConfig,
    reader: Option<BufReader<SerialStream>>,
}

impl SerialTransport {
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            reader: None,
        }
    }
}

#[async_trait]
impl SensorTransport for SerialTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }

    async fn connect(&mut self) -> Result<()> {
        if self.reader.is_some() {
            return Ok(());
        }

        let stream = tokio_serial::new(&self.config.port, self.config.baud)
            .open_native_async()
            .map_err(|e| {
                Error::transport_unavailable(
                    TransportKind::Serial,
                    format!("failed to open {}: {e}", self.config.port),
                )
            })?;

        debug!(port = %self.config.port, baud = self.config.baud, "serial port opened");
        self.reader = Some(BufReader::new(stream));
        Ok(())
    }

    async fn read(&mut self) -> Result<SensorReading> {
        let reader = self.reader.as_mut().ok_or(Error::NotConnected)?;

        let mut line = String::new();
        let n = timeout(self.config.read_timeout, reader.read_line(&mut line))
            .await
            .map_err(|_| Error::read_timeout(TransportKind::Serial, self.config.read_timeout))?
            .map_err(Error::Io)?;

        if n == 0 {
            // EOF means the far end went away; drop the handle so the next
            // connect reopens the port.
            self.reader = None;
            return Err(Error::transport_unavailable(
                TransportKind::Serial,
                "serial port closed",
            ));
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(Error::MalformedPayload("empty line".into()));
        }

        Ok(wire::decode_reading(trimmed)?)
    }

    async fn disconnect(&mut self) {
        if self.reader.take().is_some() {
            debug!(port = %self.config.port, "serial port closed");
        }
    }
}
