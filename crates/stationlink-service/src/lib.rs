//! Background collector and HTTP API for a stationlink sensor node.
//!
//! This crate wraps [`stationlink_core`] in a long-running service that:
//! - Polls the sensor node on a schedule via the connection manager
//! - Pushes readings to WebSocket clients with a history burst on connect
//! - Exposes a small REST API for health, status, and recent readings
//!
//! # Endpoints
//!
//! - `GET /api/health` - service liveness
//! - `GET /api/status` - connection state snapshot
//! - `GET /api/readings/latest` - most recent reading
//! - `GET /api/readings?count=N` - recent cached readings
//! - `WS /api/ws` - real-time readings stream

pub mod api;
pub mod collector;
pub mod state;
pub mod ws;

pub use state::AppState;
