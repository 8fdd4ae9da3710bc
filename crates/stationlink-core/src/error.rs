//! Error types for stationlink-core.
//!
//! # Propagation policy
//!
//! Transport adapters convert their stack-specific errors (serial I/O,
//! HTTP, BLE) into these variants at the trait boundary. The manager
//! reacts to link failures by advancing through the transport priority
//! list; a caller sees a connection error only after every transport and
//! the retry budget are exhausted. Data-layer errors pass straight
//! through, since the link itself is fine.
//!
//! | Error | Meaning |
//! |-------|---------|
//! | [`Error::TransportUnavailable`] | open/connect to a transport failed |
//! | [`Error::ReadTimeout`] | no data arrived within the read budget |
//! | [`Error::MalformedPayload`] | bytes arrived but could not be decoded |
//! | [`Error::RangeViolation`] | decoded but physically implausible |
//! | [`Error::MaxRetriesExceeded`] | the manager gave up for this call cycle |

use std::time::Duration;

use thiserror::Error;

use stationlink_types::TransportKind;

/// Errors that can occur when communicating with a sensor node.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A transport could not be opened or its connect attempt failed.
    #[error("transport {kind} unavailable: {reason}")]
    TransportUnavailable {
        /// Which transport failed.
        kind: TransportKind,
        /// Human-readable cause from the underlying stack.
        reason: String,
    },

    /// No data arrived within the transport's read budget.
    #[error("read timed out after {duration:?} on {kind}")]
    ReadTimeout {
        /// The transport that timed out.
        kind: TransportKind,
        /// The budget that was exceeded.
        duration: Duration,
    },

    /// Received bytes could not be decoded as the wire format.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A decoded reading failed the physical plausibility check.
    #[error("range violation: {field} = {value} outside [{min}, {max}]")]
    RangeViolation {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
        /// Lower bound of the accepted range.
        min: f64,
        /// Upper bound of the accepted range.
        max: f64,
    },

    /// The retry budget for the current call cycle is exhausted.
    #[error("maximum retries ({0}) exceeded")]
    MaxRetriesExceeded(u32),

    /// Operation attempted while no transport is active.
    #[error("not connected to sensor node")]
    NotConnected,

    /// Operation was cancelled via the manager's cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid configuration provided.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error from a transport stack.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a transport-unavailable error with context.
    pub fn transport_unavailable(kind: TransportKind, reason: impl Into<String>) -> Self {
        Self::TransportUnavailable {
            kind,
            reason: reason.into(),
        }
    }

    /// Create a read-timeout error.
    pub fn read_timeout(kind: TransportKind, duration: Duration) -> Self {
        Self::ReadTimeout { kind, duration }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether this error indicates the link itself failed.
    ///
    /// Link failures warrant a reconnection attempt; data-layer errors
    /// (malformed payloads, range violations) do not, since the link is
    /// still delivering bytes.
    pub fn is_link_failure(&self) -> bool {
        matches!(
            self,
            Self::TransportUnavailable { .. }
                | Self::ReadTimeout { .. }
                | Self::NotConnected
                | Self::Io(_)
        )
    }
}

impl From<stationlink_types::ParseError> for Error {
    fn from(err: stationlink_types::ParseError) -> Self {
        Error::MalformedPayload(err.to_string())
    }
}

/// Result type alias using stationlink-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::transport_unavailable(TransportKind::Wifi, "connection refused");
        assert!(err.to_string().contains("wifi"));
        assert!(err.to_string().contains("connection refused"));

        let err = Error::read_timeout(TransportKind::Serial, Duration::from_secs(1));
        assert!(err.to_string().contains("serial"));

        let err = Error::MaxRetriesExceeded(3);
        assert!(err.to_string().contains('3'));

        let err = Error::NotConnected;
        assert_eq!(err.to_string(), "not connected to sensor node");
    }

    #[test]
    fn test_range_violation_display() {
        let err = Error::RangeViolation {
            field: "humidity",
            value: 150.0,
            min: 0.0,
            max: 100.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("humidity"));
        assert!(msg.contains("150"));
    }

    #[test]
    fn test_parse_error_conversion() {
        let parse_err = stationlink_types::wire::decode_reading("garbage").unwrap_err();
        let err: Error = parse_err.into();
        assert!(matches!(err, Error::MalformedPayload(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "port not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("port not found"));
    }
}
