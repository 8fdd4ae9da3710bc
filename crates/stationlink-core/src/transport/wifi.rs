//! Wi-Fi transport: HTTP polling against the node's `/data` endpoint.

use async_trait::async_trait;
use reqwest::Client;
use stationlink_types::{SensorReading, TransportKind, wire};
use tracing::debug;

use crate::config::WifiConfig;
use crate::error::{Error, Result};

use super::SensorTransport;

/// Fetches readings over HTTP from the node's embedded web server.
///
/// HTTP is connectionless, so "connected" here means a probe request has
/// succeeded recently. The client itself is created lazily on connect and
/// reused across reads for keep-alive.
pub struct WifiTransport {
    config: WifiConfig,
    client: Option<Client>,
}

impl WifiTransport {
    pub fn new(config: WifiConfig) -> Self {
        Self {
            config,
            client: None,
        }
    }

    async fn fetch(&self, client: &Client) -> Result<String> {
        let url = self.config.data_url();
        let response = client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::read_timeout(TransportKind::Wifi, self.config.request_timeout)
            } else {
                Error::transport_unavailable(TransportKind::Wifi, e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::transport_unavailable(
                TransportKind::Wifi,
                format!("{url} returned {status}"),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| Error::transport_unavailable(TransportKind::Wifi, e.to_string()))
    }
}

#[async_trait]
impl SensorTransport for WifiTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Wifi
    }

    async fn connect(&mut self) -> Result<()> {
        if self.client.is_some() {
            return Ok(());
        }

        let client = Client::builder()
            .timeout(self.config.request_timeout)
            .build()
            .map_err(|e| Error::transport_unavailable(TransportKind::Wifi, e.to_string()))?;

        // Probe the endpoint so connect reflects actual reachability
        // instead of succeeding unconditionally.
        self.fetch(&client).await?;

        debug!(host = %self.config.host, "wifi endpoint reachable");
        self.client = Some(client);
        Ok(())
    }

    async fn read(&mut self) -> Result<SensorReading> {
        let client = self.client.clone().ok_or(Error::NotConnected)?;
        let body = self.fetch(&client).await?;
        Ok(wire::decode_reading(body.trim())?)
    }

    async fn disconnect(&mut self) {
        if self.client.take().is_some() {
            debug!(host = %self.config.host, "wifi client dropped");
        }
    }
}
