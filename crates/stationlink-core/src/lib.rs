//! Connection management for remote weather-station nodes.
//!
//! This crate reaches an embedded sensor node over whichever link is
//! available, with automatic failover between Wi-Fi, Bluetooth LE, and a
//! local serial line. On top of the transports it layers retry with
//! exponential backoff, a bounded time-aware reading cache, validation of
//! physical plausibility, periodic health monitoring, and fan-out of
//! readings to subscribers.
//!
//! # Features
//!
//! - **Transport failover**: prioritized Wi-Fi → Bluetooth → Serial chain,
//!   order configurable
//! - **Retry with backoff**: bounded reconnection cycles with jittered
//!   exponential delays
//! - **Reading cache**: bounded ring of recent readings, served while fresh
//! - **Validation**: physical range checks, out-of-range data rejected
//! - **Monitoring**: periodic status samples via watch channel and named
//!   callbacks
//! - **Broadcast**: per-subscriber delivery with failure isolation and a
//!   history burst for late joiners
//!
//! # Quick Start
//!
//! ```no_run
//! use stationlink_core::{ConnectionManager, LinkConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LinkConfig::from_env()?;
//!     let manager = ConnectionManager::new(config)?;
//!
//!     let transport = manager.connect().await?;
//!     println!("connected over {transport}");
//!
//!     let reading = manager.read_data().await?;
//!     println!("{:.1} °C, {:.0} %, {:.1} hPa",
//!         reading.temperature, reading.humidity, reading.pressure);
//!
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod cache;
pub mod config;
pub mod error;
pub mod manager;
pub mod mock;
pub mod monitor;
pub mod retry;
pub mod transport;
pub mod validate;

// Re-export the wire types so downstream crates only need one dependency.
pub use stationlink_types::{ParseError, SensorReading, TransportKind};

pub use broadcast::{BroadcastDistributor, BroadcastMessage, SubscriberId};
pub use cache::SensorCache;
pub use config::{BluetoothConfig, LinkConfig, SerialConfig, WifiConfig};
pub use error::{Error, Result};
pub use manager::{ConnectionManager, ConnectionStatus, LinkState, SharedManager};
pub use mock::{MockHandle, MockTransport};
pub use monitor::{ConnectionMonitor, StatusCallback};
pub use retry::RetryPolicy;
pub use transport::{
    BluetoothTransport, SensorTransport, SerialTransport, WifiTransport, build_transports,
};
pub use validate::{ReadingValidator, ValidatorConfig};
