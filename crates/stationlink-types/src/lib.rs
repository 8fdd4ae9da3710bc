//! Shared types for stationlink environmental sensor nodes.
//!
//! This crate provides the data types exchanged between the transport
//! layer (stationlink-core) and downstream consumers (stationlink-service,
//! dashboards): the sensor reading itself, the transport identifiers, and
//! the JSON wire format every transport produces.
//!
//! # Example
//!
//! ```
//! use stationlink_types::{SensorReading, TransportKind, wire};
//!
//! let reading = wire::decode_reading(
//!     r#"{"temperature":21.5,"humidity":48.0,"pressure":1012.3,
//!         "timestamp":"2024-06-01T12:00:00Z"}"#,
//! ).unwrap();
//! assert_eq!(reading.temperature, 21.5);
//! ```

pub mod error;
pub mod reading;
pub mod wire;

pub use error::{ParseError, ParseResult};
pub use reading::{SensorReading, TransportKind};
