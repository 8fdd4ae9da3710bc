//! Application state shared across handlers.

use std::sync::Arc;

use time::OffsetDateTime;

use stationlink_core::{BroadcastDistributor, ConnectionMonitor, LinkConfig, SharedManager};

/// How many cached readings a new WebSocket client receives as its history
/// burst.
pub const HISTORY_BURST_LIMIT: usize = 50;

/// Shared application state.
pub struct AppState {
    /// The connection manager driving the sensor link.
    pub manager: SharedManager,
    /// Fan-out of readings to WebSocket clients.
    pub distributor: BroadcastDistributor,
    /// Periodic status sampler.
    pub monitor: ConnectionMonitor,
    /// Configuration the service was started with.
    pub config: LinkConfig,
    /// When the service started.
    pub started_at: OffsetDateTime,
}

impl AppState {
    pub fn new(manager: SharedManager, config: LinkConfig) -> Arc<Self> {
        let monitor = ConnectionMonitor::new(Arc::clone(&manager));
        Arc::new(Self {
            manager,
            distributor: BroadcastDistributor::default(),
            monitor,
            config,
            started_at: OffsetDateTime::now_utc(),
        })
    }
}
