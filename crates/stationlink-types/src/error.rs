//! Error types for wire-format parsing in stationlink-types.

use thiserror::Error;

/// Errors that can occur when decoding a sensor payload.
///
/// This error type is transport-agnostic; transport-level errors
/// (connection failures, timeouts) belong in stationlink-core.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Payload was not valid JSON or did not match the wire shape.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// A required field was missing from the payload.
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    /// The timestamp string could not be parsed as ISO-8601.
    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        ParseError::Malformed(err.to_string())
    }
}

/// Result type alias using stationlink-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
