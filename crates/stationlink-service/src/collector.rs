//! Background polling loop.
//!
//! The collector asks the manager for a reading on the configured interval
//! and publishes each one to the distributor. Failures are tolerated
//! indefinitely; logging goes quiet after a few consecutive misses so a
//! dead node does not flood the logs.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use stationlink_core::{BroadcastMessage, Error};

use crate::state::AppState;

/// Spawn the collector loop. Cancelling the manager's token stops it.
pub fn start(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(run(state))
}

async fn run(state: Arc<AppState>) {
    let poll_interval = state.config.update_interval;
    let cancel = state.manager.cancellation_token();
    info!(interval = ?poll_interval, "collector started");

    let mut ticker = interval(poll_interval);
    let mut consecutive_failures = 0u32;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("collector stopped");
                break;
            }
            _ = ticker.tick() => {}
        }

        match state.manager.read_data().await {
            Ok(reading) => {
                consecutive_failures = 0;
                debug!(
                    temperature = reading.temperature,
                    humidity = reading.humidity,
                    pressure = reading.pressure,
                    "collected reading"
                );
                state.distributor.publish(&BroadcastMessage::Reading(reading));
            }
            Err(Error::Cancelled) => break,
            Err(e) => {
                consecutive_failures += 1;
                if consecutive_failures <= 3 {
                    warn!(error = %e, attempt = consecutive_failures, "poll failed");
                } else if consecutive_failures == 4 {
                    error!(
                        attempts = consecutive_failures,
                        "repeated poll failures, continuing quietly"
                    );
                }

                // Once retries are exhausted only an explicit connect can
                // revive the link, so keep trying one per tick.
                if matches!(e, Error::MaxRetriesExceeded(_)) {
                    if let Ok(kind) = state.manager.connect().await {
                        info!(transport = %kind, "link revived");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stationlink_core::{
        ConnectionManager, LinkConfig, MockTransport, transport::SensorTransport,
    };
    use stationlink_types::TransportKind;

    #[tokio::test(start_paused = true)]
    async fn test_collector_publishes_readings() {
        let transports: Vec<Box<dyn SensorTransport>> =
            vec![Box::new(MockTransport::new(TransportKind::Wifi))];
        let manager = Arc::new(ConnectionManager::with_transports(
            LinkConfig::default(),
            transports,
        ));
        manager.connect().await.unwrap();

        let state = AppState::new(Arc::clone(&manager), LinkConfig::default());
        let (_id, mut rx) = state.distributor.subscribe(Vec::new());

        let task = start(Arc::clone(&state));

        // History burst first, then a live reading from the first tick.
        assert!(matches!(
            rx.recv().await.unwrap(),
            BroadcastMessage::History(_)
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            BroadcastMessage::Reading(_)
        ));

        manager.shutdown().await;
        let _ = task.await;
    }
}
