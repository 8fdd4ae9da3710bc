//! The JSON wire format shared by all transports.
//!
//! Every transport delivers readings in the same shape:
//!
//! ```json
//! {"temperature": 21.5, "humidity": 48.0, "pressure": 1012.3,
//!  "timestamp": "2024-06-01T12:00:00Z"}
//! ```
//!
//! Decoding is strict JSON (`serde_json`); payloads are never evaluated or
//! interpreted any other way. Timestamps are emitted as RFC 3339; on decode
//! an offset-less ISO-8601 timestamp is accepted and assumed to be UTC,
//! since some node firmwares omit the offset. A payload without a timestamp
//! is stamped at the moment of decode.

use serde::Deserialize;
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::error::{ParseError, ParseResult};
use crate::reading::SensorReading;

/// Parse an ISO-8601 timestamp string, assuming UTC when no offset is given.
pub fn parse_timestamp(s: &str) -> ParseResult<OffsetDateTime> {
    if let Ok(ts) = OffsetDateTime::parse(s, &Rfc3339) {
        return Ok(ts);
    }
    if let Ok(ts) = OffsetDateTime::parse(s, &Iso8601::DEFAULT) {
        return Ok(ts);
    }
    PrimitiveDateTime::parse(s, &Iso8601::DEFAULT)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|_| ParseError::InvalidTimestamp(s.to_string()))
}

/// Format a timestamp as RFC 3339 for the wire.
pub fn format_timestamp(ts: OffsetDateTime) -> ParseResult<String> {
    ts.format(&Rfc3339)
        .map_err(|e| ParseError::Malformed(e.to_string()))
}

/// Serde adapter used by [`SensorReading`] for its `timestamp` field.
pub mod timestamp {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use time::OffsetDateTime;
    use time::format_description::well_known::Rfc3339;

    pub fn serialize<S>(ts: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = ts.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_timestamp(&s).map_err(de::Error::custom)
    }
}

/// Raw payload shape before field presence has been checked.
#[derive(Debug, Deserialize)]
struct RawReading {
    temperature: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
    timestamp: Option<String>,
}

/// Decode a wire payload into a [`SensorReading`].
///
/// Required fields are `temperature`, `humidity`, and `pressure`; a missing
/// field is reported as [`ParseError::MissingField`], a non-numeric one as
/// [`ParseError::Malformed`]. The timestamp defaults to now if absent.
///
/// Note that this performs shape checking only; physical plausibility is
/// the validator's job in stationlink-core.
pub fn decode_reading(payload: &str) -> ParseResult<SensorReading> {
    let raw: RawReading = serde_json::from_str(payload)?;

    let temperature = raw
        .temperature
        .ok_or(ParseError::MissingField("temperature"))?;
    let humidity = raw.humidity.ok_or(ParseError::MissingField("humidity"))?;
    let pressure = raw.pressure.ok_or(ParseError::MissingField("pressure"))?;

    let timestamp = match raw.timestamp {
        Some(s) => parse_timestamp(&s)?,
        None => OffsetDateTime::now_utc(),
    };

    Ok(SensorReading {
        temperature,
        humidity,
        pressure,
        timestamp,
    })
}

/// Encode a [`SensorReading`] into the wire format.
pub fn encode_reading(reading: &SensorReading) -> ParseResult<String> {
    serde_json::to_string(reading).map_err(ParseError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_decode_full_payload() {
        let reading = decode_reading(
            r#"{"temperature":21.5,"humidity":48.0,"pressure":1012.3,"timestamp":"2024-06-01T12:00:00Z"}"#,
        )
        .unwrap();

        assert_eq!(reading.temperature, 21.5);
        assert_eq!(reading.humidity, 48.0);
        assert_eq!(reading.pressure, 1012.3);
        assert_eq!(reading.timestamp, datetime!(2024-06-01 12:00 UTC));
    }

    #[test]
    fn test_decode_offsetless_timestamp_assumes_utc() {
        let reading = decode_reading(
            r#"{"temperature":25.0,"humidity":60.0,"pressure":1013.0,"timestamp":"2024-01-01T00:00:00"}"#,
        )
        .unwrap();

        assert_eq!(reading.timestamp, datetime!(2024-01-01 00:00 UTC));
    }

    #[test]
    fn test_decode_missing_timestamp_defaults_to_now() {
        let before = OffsetDateTime::now_utc();
        let reading =
            decode_reading(r#"{"temperature":25.0,"humidity":60.0,"pressure":1013.0}"#).unwrap();
        let after = OffsetDateTime::now_utc();

        assert!(reading.timestamp >= before && reading.timestamp <= after);
    }

    #[test]
    fn test_decode_missing_field() {
        let err = decode_reading(r#"{"temperature":25.0,"pressure":1013.0}"#).unwrap_err();
        assert!(matches!(err, ParseError::MissingField("humidity")));
    }

    #[test]
    fn test_decode_non_numeric_field() {
        let err =
            decode_reading(r#"{"temperature":"hot","humidity":60.0,"pressure":1013.0}"#)
                .unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }

    #[test]
    fn test_decode_rejects_non_json() {
        assert!(decode_reading("{'temperature': 25}").is_err());
        assert!(decode_reading("garbage").is_err());
        assert!(decode_reading("").is_err());
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let original = SensorReading::with_timestamp(
            22.75,
            51.25,
            1009.4,
            datetime!(2024-03-15 08:30:45 UTC),
        );

        let encoded = encode_reading(&original).unwrap();
        let decoded = decode_reading(&encoded).unwrap();

        assert_eq!(decoded.temperature, original.temperature);
        assert_eq!(decoded.humidity, original.humidity);
        assert_eq!(decoded.pressure, original.pressure);
        assert_eq!(decoded.timestamp, original.timestamp);
    }

    #[test]
    fn test_parse_timestamp_with_offset() {
        let ts = parse_timestamp("2024-06-01T14:00:00+02:00").unwrap();
        assert_eq!(ts, datetime!(2024-06-01 12:00 UTC));
    }
}
