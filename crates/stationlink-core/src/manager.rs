//! Connection management with prioritized failover.
//!
//! [`ConnectionManager`] owns the transport chain and decides which link the
//! node is reached over. Callers never pick a transport themselves: they ask
//! for data, and the manager serves it from the cache when fresh, reads the
//! active link otherwise, and fails over down the priority order when the
//! link breaks.
//!
//! Mutating operations live behind a single async mutex, so concurrent
//! callers are serialized and never observe a half-finished failover.
//! Status snapshots are published to a side channel on every transition and
//! read without touching that mutex, so observers (the monitor, the HTTP
//! surface) never queue behind an in-flight reconnect.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use stationlink_types::{SensorReading, TransportKind};

use crate::cache::SensorCache;
use crate::config::LinkConfig;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::transport::{SensorTransport, build_transports};
use crate::validate::ReadingValidator;

/// Lifecycle state of the managed link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    /// No transport is active.
    Disconnected,
    /// Initial connection sweep in progress.
    Connecting,
    /// A transport is active and serving reads.
    Connected,
    /// The active link failed; a recovery sweep is in progress.
    Reconnecting,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}

/// Snapshot of the manager's current state.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    /// Current lifecycle state.
    pub state: LinkState,
    /// The transport currently serving reads, if any.
    pub active_transport: Option<TransportKind>,
    /// Failed reconnection cycles since the last successful connection.
    pub retry_count: u32,
    /// Number of readings currently buffered.
    pub cached_readings: usize,
    /// The most recent validated reading, if any.
    pub last_reading: Option<SensorReading>,
}

struct Inner {
    transports: Vec<Box<dyn SensorTransport>>,
    active: Option<usize>,
    state: LinkState,
    retry_count: u32,
    cache: SensorCache,
    last_reading: Option<SensorReading>,
}

/// Manages the link to the sensor node across multiple transports.
pub struct ConnectionManager {
    config: LinkConfig,
    validator: ReadingValidator,
    retry: RetryPolicy,
    cancel: CancellationToken,
    inner: Mutex<Inner>,
    status_tx: watch::Sender<ConnectionStatus>,
}

impl ConnectionManager {
    /// Create a manager with real transports built from the config.
    pub fn new(config: LinkConfig) -> Result<Self> {
        config.validate()?;
        let transports = build_transports(&config);
        Ok(Self::with_transports(config, transports))
    }

    /// Create a manager over a caller-supplied transport chain.
    ///
    /// The chain is tried in the order given, which takes the place of the
    /// config's priority list. Used for testing and for custom links.
    pub fn with_transports(config: LinkConfig, transports: Vec<Box<dyn SensorTransport>>) -> Self {
        let cache = SensorCache::new(config.cache_size);
        let inner = Inner {
            transports,
            active: None,
            state: LinkState::Disconnected,
            retry_count: 0,
            cache,
            last_reading: None,
        };
        let (status_tx, _) = watch::channel(Self::snapshot(&inner));
        Self {
            config,
            validator: ReadingValidator::default(),
            retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
            inner: Mutex::new(inner),
            status_tx,
        }
    }

    /// Replace the default backoff policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Replace the default validator.
    #[must_use]
    pub fn with_validator(mut self, validator: ReadingValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Token cancelled when [`shutdown`](Self::shutdown) is called.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Connect to the node, trying each transport in priority order.
    ///
    /// Returns the transport that succeeded. Idempotent while connected.
    pub async fn connect(&self) -> Result<TransportKind> {
        self.ensure_running()?;
        let mut inner = self.inner.lock().await;

        if inner.state == LinkState::Connected {
            if let Some(idx) = inner.active {
                return Ok(inner.transports[idx].kind());
            }
        }

        inner.state = LinkState::Connecting;
        self.publish_status(&inner);
        let result = match Self::sweep(&mut inner, &self.cancel).await {
            Ok(kind) => {
                inner.state = LinkState::Connected;
                inner.retry_count = 0;
                info!(transport = %kind, "connected to sensor node");
                Ok(kind)
            }
            Err(e) => {
                inner.state = LinkState::Disconnected;
                Err(e)
            }
        };
        self.publish_status(&inner);
        result
    }

    /// Fetch a validated reading.
    ///
    /// Served from the cache when a reading newer than the configured cache
    /// timeout exists; otherwise read from the active transport. A link
    /// failure mid-read triggers one reconnection cycle followed by a retry
    /// of the read.
    pub async fn read_data(&self) -> Result<SensorReading> {
        self.ensure_running()?;
        let mut inner = self.inner.lock().await;

        if let Some(reading) = inner.cache.fresh(self.config.cache_timeout) {
            debug!("serving cached reading");
            return Ok(reading);
        }

        let reading = match Self::read_active(&mut inner).await {
            Ok(reading) => reading,
            Err(e) if e.is_link_failure() => {
                warn!(error = %e, "read failed, attempting reconnection");
                self.reconnect_locked(&mut inner).await?;
                Self::read_active(&mut inner).await?
            }
            Err(e) => return Err(e),
        };

        self.validator.validate(&reading)?;
        inner.cache.push(reading);
        inner.last_reading = Some(reading);
        inner.retry_count = 0;
        self.publish_status(&inner);
        Ok(reading)
    }

    /// Run one reconnection cycle: back off, then sweep the transport chain.
    ///
    /// Each failed cycle increments the retry count; once it reaches
    /// `max_retries` further calls fail immediately without touching any
    /// transport, until a successful connection resets the count.
    pub async fn try_reconnect(&self) -> Result<TransportKind> {
        self.ensure_running()?;
        let mut inner = self.inner.lock().await;
        self.reconnect_locked(&mut inner).await
    }

    /// Disconnect the active transport, drop cached data, and reset retry
    /// accounting.
    pub async fn disconnect(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(idx) = inner.active.take() {
            inner.transports[idx].disconnect().await;
        }
        inner.state = LinkState::Disconnected;
        inner.retry_count = 0;
        inner.cache.clear();
        inner.last_reading = None;
        self.publish_status(&inner);
        info!("disconnected from sensor node");
    }

    /// Cancel in-flight operations and disconnect.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.disconnect().await;
    }

    /// Snapshot of the connection state as of the last transition.
    ///
    /// Reads the published snapshot without taking the state mutex, so it
    /// returns immediately even while a reconnect cycle (including its
    /// backoff sleep) is in flight.
    pub fn status(&self) -> ConnectionStatus {
        self.status_tx.borrow().clone()
    }

    /// Subscribe to status snapshots as they are published.
    pub fn status_updates(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// The most recent `count` cached readings, oldest first.
    pub async fn recent_readings(&self, count: usize) -> Vec<SensorReading> {
        let mut inner = self.inner.lock().await;
        inner.cache.recent(count)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    fn snapshot(inner: &Inner) -> ConnectionStatus {
        ConnectionStatus {
            state: inner.state,
            active_transport: inner.active.map(|idx| inner.transports[idx].kind()),
            retry_count: inner.retry_count,
            cached_readings: inner.cache.len(),
            last_reading: inner.last_reading,
        }
    }

    fn publish_status(&self, inner: &Inner) {
        self.status_tx.send_replace(Self::snapshot(inner));
    }

    async fn read_active(inner: &mut Inner) -> Result<SensorReading> {
        let idx = inner.active.ok_or(Error::NotConnected)?;
        inner.transports[idx].read().await
    }

    /// Try each transport in order; first success wins.
    async fn sweep(inner: &mut Inner, cancel: &CancellationToken) -> Result<TransportKind> {
        let mut last_err = Error::NotConnected;
        for idx in 0..inner.transports.len() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let kind = inner.transports[idx].kind();
            debug!(transport = %kind, "attempting connection");
            match inner.transports[idx].connect().await {
                Ok(()) => {
                    inner.active = Some(idx);
                    return Ok(kind);
                }
                Err(e) => {
                    warn!(transport = %kind, error = %e, "connection attempt failed");
                    last_err = e;
                }
            }
        }
        inner.active = None;
        Err(last_err)
    }

    async fn reconnect_locked(&self, inner: &mut Inner) -> Result<TransportKind> {
        if inner.retry_count >= self.config.max_retries {
            inner.state = LinkState::Disconnected;
            self.publish_status(inner);
            return Err(Error::MaxRetriesExceeded(self.config.max_retries));
        }

        let attempt = inner.retry_count;
        inner.retry_count += 1;
        inner.state = LinkState::Reconnecting;
        self.publish_status(inner);

        if let Some(idx) = inner.active.take() {
            inner.transports[idx].disconnect().await;
        }

        let delay = self.retry.delay_for_attempt(attempt);
        if !delay.is_zero() {
            debug!(?delay, attempt, "backing off before reconnection");
            // The backoff must stay interruptible so a shutdown during a
            // long delay is honored immediately.
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    inner.state = LinkState::Disconnected;
                    self.publish_status(inner);
                    return Err(Error::Cancelled);
                }
                _ = sleep(delay) => {}
            }
        }

        let result = match Self::sweep(inner, &self.cancel).await {
            Ok(kind) => {
                inner.state = LinkState::Connected;
                inner.retry_count = 0;
                info!(transport = %kind, "reconnected to sensor node");
                Ok(kind)
            }
            Err(e) => {
                inner.state = LinkState::Disconnected;
                warn!(
                    attempt = inner.retry_count,
                    max = self.config.max_retries,
                    error = %e,
                    "reconnection cycle failed"
                );
                Err(e)
            }
        };
        self.publish_status(inner);
        result
    }
}

/// Shared handle type used throughout the service layer.
pub type SharedManager = Arc<ConnectionManager>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockHandle, MockTransport};
    use std::time::Duration;

    fn test_config() -> LinkConfig {
        let mut config = LinkConfig::default();
        config.max_retries = 2;
        config.cache_timeout = Duration::from_secs(60);
        config
    }

    fn manager_with_mocks(
        config: LinkConfig,
        mocks: Vec<MockTransport>,
    ) -> (ConnectionManager, Vec<MockHandle>) {
        let handles: Vec<_> = mocks.iter().map(MockTransport::handle).collect();
        let transports: Vec<Box<dyn SensorTransport>> = mocks
            .into_iter()
            .map(|m| Box::new(m) as Box<dyn SensorTransport>)
            .collect();
        let manager = ConnectionManager::with_transports(config, transports)
            .with_retry_policy(RetryPolicy::immediate());
        (manager, handles)
    }

    #[tokio::test]
    async fn test_failover_to_third_transport() {
        let (manager, handles) = manager_with_mocks(
            test_config(),
            vec![
                MockTransport::failing(TransportKind::Wifi),
                MockTransport::failing(TransportKind::Bluetooth),
                MockTransport::new(TransportKind::Serial),
            ],
        );

        let kind = manager.connect().await.unwrap();
        assert_eq!(kind, TransportKind::Serial);

        let status = manager.status();
        assert_eq!(status.state, LinkState::Connected);
        assert_eq!(status.active_transport, Some(TransportKind::Serial));
        assert_eq!(status.retry_count, 0);

        assert_eq!(handles[0].connect_count(), 1);
        assert_eq!(handles[1].connect_count(), 1);
        assert_eq!(handles[2].connect_count(), 1);
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_transport() {
        let (manager, handles) = manager_with_mocks(
            test_config(),
            vec![MockTransport::new(TransportKind::Wifi)],
        );

        manager.connect().await.unwrap();
        let first = manager.read_data().await.unwrap();
        assert_eq!(handles[0].read_count(), 1);

        let second = manager.read_data().await.unwrap();
        assert_eq!(second, first);
        assert_eq!(handles[0].read_count(), 1, "fresh cache must not hit the transport");
    }

    #[tokio::test]
    async fn test_stale_cache_reads_transport_again() {
        let mut config = test_config();
        config.cache_timeout = Duration::from_millis(0);
        let (manager, handles) =
            manager_with_mocks(config, vec![MockTransport::new(TransportKind::Wifi)]);

        manager.connect().await.unwrap();
        manager.read_data().await.unwrap();
        manager.read_data().await.unwrap();
        assert_eq!(handles[0].read_count(), 2);
    }

    #[tokio::test]
    async fn test_out_of_range_reading_rejected() {
        let (manager, handles) = manager_with_mocks(
            test_config(),
            vec![MockTransport::new(TransportKind::Wifi)],
        );
        handles[0]
            .set_reading(SensorReading::new(25.0, 150.0, 1013.0))
            .await;

        manager.connect().await.unwrap();
        let err = manager.read_data().await.unwrap_err();
        assert!(matches!(err, Error::RangeViolation { field: "humidity", .. }));

        let status = manager.status();
        assert_eq!(status.cached_readings, 0, "rejected readings must not be cached");
        assert_eq!(status.state, LinkState::Connected, "range violations must not drop the link");
    }

    #[tokio::test]
    async fn test_read_failure_fails_over() {
        let (manager, handles) = manager_with_mocks(
            test_config(),
            vec![
                MockTransport::new(TransportKind::Wifi),
                MockTransport::new(TransportKind::Bluetooth),
            ],
        );

        manager.connect().await.unwrap();
        handles[0].set_fail_read(true);
        handles[0].set_fail_connect(true);

        let reading = manager.read_data().await.unwrap();
        assert_eq!(reading.humidity, 50.0);

        let status = manager.status();
        assert_eq!(status.active_transport, Some(TransportKind::Bluetooth));
        assert_eq!(status.retry_count, 0, "successful reconnection resets the count");
    }

    #[tokio::test]
    async fn test_retry_exhaustion_fails_fast() {
        let (manager, handles) = manager_with_mocks(
            test_config(),
            vec![MockTransport::failing(TransportKind::Wifi)],
        );

        assert!(manager.connect().await.is_err());
        let connects_after_connect = handles[0].connect_count();

        // max_retries real cycles, each touching the transport.
        for _ in 0..2 {
            let err = manager.try_reconnect().await.unwrap_err();
            assert!(matches!(err, Error::TransportUnavailable { .. }));
        }
        let connects_after_cycles = handles[0].connect_count();
        assert_eq!(connects_after_cycles, connects_after_connect + 2);

        // The next cycle fails before any transport I/O.
        let err = manager.try_reconnect().await.unwrap_err();
        assert!(matches!(err, Error::MaxRetriesExceeded(2)));
        assert_eq!(handles[0].connect_count(), connects_after_cycles);
    }

    #[tokio::test]
    async fn test_disconnect_resets_state() {
        let (manager, handles) = manager_with_mocks(
            test_config(),
            vec![MockTransport::new(TransportKind::Wifi)],
        );

        manager.connect().await.unwrap();
        manager.disconnect().await;

        assert!(!handles[0].is_connected());
        let status = manager.status();
        assert_eq!(status.state, LinkState::Disconnected);
        assert_eq!(status.active_transport, None);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_operations() {
        let (manager, _handles) = manager_with_mocks(
            test_config(),
            vec![MockTransport::new(TransportKind::Wifi)],
        );

        manager.shutdown().await;
        assert!(matches!(manager.connect().await, Err(Error::Cancelled)));
        assert!(matches!(manager.read_data().await, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_status_available_during_backoff() {
        let (manager, _handles) = manager_with_mocks(
            test_config(),
            vec![MockTransport::failing(TransportKind::Wifi)],
        );
        // A long fixed delay parks the cycle in its backoff sleep.
        let manager =
            Arc::new(manager.with_retry_policy(RetryPolicy::fixed(Duration::from_secs(60))));

        let worker = Arc::clone(&manager);
        let cycle = tokio::spawn(async move { worker.try_reconnect().await });
        // Let the cycle take the state lock and reach its backoff sleep.
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }

        // Must return immediately even though the cycle holds the lock.
        let status = manager.status();
        assert_eq!(status.state, LinkState::Reconnecting);
        assert_eq!(status.retry_count, 1);

        // Shutdown interrupts the backoff instead of waiting it out.
        manager.shutdown().await;
        let err = cycle.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let (manager, handles) = manager_with_mocks(
            test_config(),
            vec![MockTransport::new(TransportKind::Wifi)],
        );

        manager.connect().await.unwrap();
        manager.connect().await.unwrap();
        assert_eq!(handles[0].connect_count(), 1);
    }
}
