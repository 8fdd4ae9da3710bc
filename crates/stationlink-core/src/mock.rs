//! Mock transport for testing without hardware.
//!
//! [`MockTransport`] implements [`SensorTransport`] so it can be dropped
//! into the connection manager in place of a real link. A [`MockHandle`]
//! shares state with the transport, letting tests inject failures and
//! inspect call counts after the transport has been moved into the
//! manager.
//!
//! # Example
//!
//! ```
//! use stationlink_core::mock::MockTransport;
//! use stationlink_core::transport::SensorTransport;
//! use stationlink_types::TransportKind;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut transport = MockTransport::new(TransportKind::Wifi);
//!     let handle = transport.handle();
//!
//!     transport.connect().await.unwrap();
//!     let _ = transport.read().await.unwrap();
//!
//!     assert_eq!(handle.connect_count(), 1);
//!     assert_eq!(handle.read_count(), 1);
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use stationlink_types::{SensorReading, TransportKind};

use crate::error::{Error, Result};
use crate::transport::SensorTransport;

struct MockState {
    kind: TransportKind,
    connected: AtomicBool,
    reading: RwLock<SensorReading>,
    connect_count: AtomicU32,
    read_count: AtomicU32,
    fail_connect: AtomicBool,
    fail_read: AtomicBool,
}

/// A scriptable transport for tests.
pub struct MockTransport {
    state: Arc<MockState>,
}

/// Shared view into a [`MockTransport`]'s state.
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<MockState>,
}

impl MockTransport {
    /// Create a mock that connects successfully and serves a fixed reading.
    pub fn new(kind: TransportKind) -> Self {
        Self {
            state: Arc::new(MockState {
                kind,
                connected: AtomicBool::new(false),
                reading: RwLock::new(SensorReading::new(22.5, 50.0, 1013.2)),
                connect_count: AtomicU32::new(0),
                read_count: AtomicU32::new(0),
                fail_connect: AtomicBool::new(false),
                fail_read: AtomicBool::new(false),
            }),
        }
    }

    /// Create a mock whose connect attempts always fail.
    pub fn failing(kind: TransportKind) -> Self {
        let mock = Self::new(kind);
        mock.state.fail_connect.store(true, Ordering::SeqCst);
        mock
    }

    /// Get a handle for inspecting and scripting this mock.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl MockHandle {
    /// Number of connect attempts made so far.
    pub fn connect_count(&self) -> u32 {
        self.state.connect_count.load(Ordering::SeqCst)
    }

    /// Number of read attempts made so far.
    pub fn read_count(&self) -> u32 {
        self.state.read_count.load(Ordering::SeqCst)
    }

    /// Whether the transport currently believes it is connected.
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    /// Make subsequent connect attempts fail (or succeed again).
    pub fn set_fail_connect(&self, fail: bool) {
        self.state.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent reads fail (or succeed again).
    pub fn set_fail_read(&self, fail: bool) {
        self.state.fail_read.store(fail, Ordering::SeqCst);
    }

    /// Replace the reading served by this mock.
    pub async fn set_reading(&self, reading: SensorReading) {
        *self.state.reading.write().await = reading;
    }
}

#[async_trait]
impl SensorTransport for MockTransport {
    fn kind(&self) -> TransportKind {
        self.state.kind
    }

    async fn connect(&mut self) -> Result<()> {
        self.state.connect_count.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(Error::transport_unavailable(
                self.state.kind,
                "mock connect failure",
            ));
        }
        self.state.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn read(&mut self) -> Result<SensorReading> {
        self.state.read_count.fetch_add(1, Ordering::SeqCst);
        if !self.state.connected.load(Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }
        if self.state.fail_read.load(Ordering::SeqCst) {
            return Err(Error::transport_unavailable(
                self.state.kind,
                "mock read failure",
            ));
        }
        Ok(*self.state.reading.read().await)
    }

    async fn disconnect(&mut self) {
        self.state.connected.store(false, Ordering::SeqCst);
    }
}
