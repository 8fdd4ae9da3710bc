//! Periodic connection health sampling.
//!
//! [`ConnectionMonitor`] polls the manager's status on a fixed interval and
//! fans it out two ways: a watch channel for async consumers, and named
//! callbacks for synchronous hooks. Callbacks are registered and removed by
//! name, so components can manage their own hooks without coordinating ids.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::manager::{ConnectionStatus, SharedManager};

/// Hook invoked with each status sample.
///
/// Shared so the sampling loop can invoke hooks without holding the registry
/// lock, which lets a hook register or remove callbacks while it runs.
pub type StatusCallback = Arc<dyn Fn(&ConnectionStatus) + Send + Sync>;

/// Samples connection status on an interval and distributes it.
pub struct ConnectionMonitor {
    manager: SharedManager,
    sample_interval: Duration,
    callbacks: Arc<StdMutex<HashMap<String, StatusCallback>>>,
    tx: watch::Sender<ConnectionStatus>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionMonitor {
    /// Create a monitor sampling at the manager's configured update interval.
    pub fn new(manager: SharedManager) -> Self {
        let sample_interval = manager.config().update_interval;
        Self::with_interval(manager, sample_interval)
    }

    /// Create a monitor with an explicit sampling interval.
    pub fn with_interval(manager: SharedManager, sample_interval: Duration) -> Self {
        // Seed with the manager's current status so early subscribers never
        // observe a state the manager was not actually in.
        let (tx, _) = watch::channel(manager.status());
        Self {
            manager,
            sample_interval,
            callbacks: Arc::new(StdMutex::new(HashMap::new())),
            tx,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Register a named callback, replacing any existing one with the same
    /// name.
    pub fn add_callback(&self, name: impl Into<String>, callback: StatusCallback) {
        let name = name.into();
        debug!(name = %name, "status callback registered");
        self.callbacks
            .lock()
            .expect("callback registry poisoned")
            .insert(name, callback);
    }

    /// Remove a callback by name. Returns whether it existed.
    pub fn remove_callback(&self, name: &str) -> bool {
        let removed = self
            .callbacks
            .lock()
            .expect("callback registry poisoned")
            .remove(name)
            .is_some();
        if removed {
            debug!(name, "status callback removed");
        }
        removed
    }

    /// Subscribe to status samples. The receiver always holds the latest
    /// sample.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.tx.subscribe()
    }

    /// Start the sampling loop. Calling start twice is a no-op.
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return;
        }

        let manager = Arc::clone(&self.manager);
        let callbacks = Arc::clone(&self.callbacks);
        let tx = self.tx.clone();
        let cancel = self.cancel.clone();
        let sample_interval = self.sample_interval;

        *task = Some(tokio::spawn(async move {
            let mut ticker = interval(sample_interval);
            info!(interval = ?sample_interval, "connection monitor started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("connection monitor stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let status = manager.status();
                        tx.send_replace(status.clone());
                        // Snapshot the registry and release the lock before
                        // invoking, so a hook may add or remove callbacks.
                        let hooks: Vec<StatusCallback> = callbacks
                            .lock()
                            .expect("callback registry poisoned")
                            .values()
                            .cloned()
                            .collect();
                        for hook in hooks {
                            hook(&status);
                        }
                    }
                }
            }
        }));
    }

    /// Stop the sampling loop and wait for it to exit.
    pub async fn stop(&self) {
        self.cancel.cancel();
        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkConfig;
    use crate::manager::{ConnectionManager, LinkState};
    use crate::mock::MockTransport;
    use crate::transport::SensorTransport;
    use stationlink_types::TransportKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_manager() -> SharedManager {
        let transports: Vec<Box<dyn SensorTransport>> =
            vec![Box::new(MockTransport::new(TransportKind::Wifi))];
        Arc::new(ConnectionManager::with_transports(
            LinkConfig::default(),
            transports,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_publishes_status_samples() {
        let manager = test_manager();
        manager.connect().await.unwrap();

        let monitor = ConnectionMonitor::with_interval(Arc::clone(&manager), Duration::from_secs(5));
        let mut rx = monitor.subscribe();
        monitor.start().await;

        rx.changed().await.unwrap();
        let status = rx.borrow().clone();
        assert_eq!(status.state, LinkState::Connected);
        assert_eq!(status.active_transport, Some(TransportKind::Wifi));

        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_callbacks_fire_and_remove() {
        let manager = test_manager();
        let monitor = ConnectionMonitor::with_interval(Arc::clone(&manager), Duration::from_secs(5));

        let fired = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&fired);
        monitor.add_callback(
            "counter",
            Arc::new(move |_status| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let mut rx = monitor.subscribe();
        monitor.start().await;
        rx.changed().await.unwrap();
        assert!(fired.load(Ordering::SeqCst) >= 1);

        assert!(monitor.remove_callback("counter"));
        assert!(!monitor.remove_callback("counter"));
        let after_removal = fired.load(Ordering::SeqCst);

        rx.changed().await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), after_removal);

        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_may_remove_itself() {
        let manager = test_manager();
        let monitor = Arc::new(ConnectionMonitor::with_interval(
            Arc::clone(&manager),
            Duration::from_secs(5),
        ));

        let fired = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&fired);
        let hook_monitor = Arc::clone(&monitor);
        monitor.add_callback(
            "oneshot",
            Arc::new(move |_status| {
                counter.fetch_add(1, Ordering::SeqCst);
                hook_monitor.remove_callback("oneshot");
            }),
        );

        let mut rx = monitor.subscribe();
        monitor.start().await;

        // Two samples: the hook fires on the first and must not wedge the
        // loop or fire again on the second.
        rx.changed().await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        monitor.stop().await;
    }

    #[tokio::test]
    async fn test_seeds_from_manager_status() {
        let manager = test_manager();
        manager.connect().await.unwrap();

        let monitor = ConnectionMonitor::with_interval(Arc::clone(&manager), Duration::from_secs(5));
        // Before the first sample the channel already reflects the manager.
        let rx = monitor.subscribe();
        let status = rx.borrow().clone();
        assert_eq!(status.state, LinkState::Connected);
        assert_eq!(status.active_transport, Some(TransportKind::Wifi));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_sampling() {
        let manager = test_manager();
        let monitor = ConnectionMonitor::with_interval(Arc::clone(&manager), Duration::from_secs(5));
        let mut rx = monitor.subscribe();

        monitor.start().await;
        rx.changed().await.unwrap();
        monitor.stop().await;

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!rx.has_changed().unwrap_or(false));
    }
}
