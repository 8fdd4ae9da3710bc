//! Physical plausibility checks for sensor readings.
//!
//! The validator is a pure gate with no side effects: every reading must
//! pass it before entering the cache or the broadcast pipeline. Values
//! outside the configured ranges are rejected, never clamped.
//!
//! # Example
//!
//! ```
//! use stationlink_core::validate::ReadingValidator;
//! use stationlink_types::SensorReading;
//!
//! let validator = ReadingValidator::default();
//! let reading = SensorReading::new(22.5, 45.0, 1013.0);
//! assert!(validator.validate(&reading).is_ok());
//!
//! let bogus = SensorReading::new(22.5, 150.0, 1013.0);
//! assert!(validator.validate(&bogus).is_err());
//! ```

use stationlink_types::{SensorReading, wire};

use crate::error::{Error, Result};

/// Accepted physical ranges for each field.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Temperature bounds in °C.
    pub temperature: (f64, f64),
    /// Humidity bounds in %.
    pub humidity: (f64, f64),
    /// Pressure bounds in hPa.
    pub pressure: (f64, f64),
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            temperature: (-40.0, 80.0),
            humidity: (0.0, 100.0),
            pressure: (900.0, 1100.0),
        }
    }
}

impl ValidatorConfig {
    /// Set the temperature bounds (°C).
    #[must_use]
    pub fn temperature_range(mut self, min: f64, max: f64) -> Self {
        self.temperature = (min, max);
        self
    }

    /// Set the humidity bounds (%).
    #[must_use]
    pub fn humidity_range(mut self, min: f64, max: f64) -> Self {
        self.humidity = (min, max);
        self
    }

    /// Set the pressure bounds (hPa).
    #[must_use]
    pub fn pressure_range(mut self, min: f64, max: f64) -> Self {
        self.pressure = (min, max);
        self
    }
}

/// Validates readings against physical plausibility ranges.
#[derive(Debug, Clone, Default)]
pub struct ReadingValidator {
    config: ValidatorConfig,
}

impl ReadingValidator {
    /// Create a validator with custom bounds.
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Check a decoded reading against the configured ranges.
    ///
    /// Returns the first violation found; the reading is unmodified either
    /// way.
    pub fn validate(&self, reading: &SensorReading) -> Result<()> {
        check_field("temperature", reading.temperature, self.config.temperature)?;
        check_field("humidity", reading.humidity, self.config.humidity)?;
        check_field("pressure", reading.pressure, self.config.pressure)?;
        Ok(())
    }

    /// Decode a raw wire payload and validate it in one step.
    ///
    /// Shape problems (missing or non-numeric fields, broken JSON) surface
    /// as [`Error::MalformedPayload`]; range problems as
    /// [`Error::RangeViolation`].
    pub fn validate_json(&self, payload: &str) -> Result<SensorReading> {
        let reading = wire::decode_reading(payload)?;
        self.validate(&reading)?;
        Ok(reading)
    }
}

fn check_field(field: &'static str, value: f64, (min, max): (f64, f64)) -> Result<()> {
    // NaN fails both comparisons and is rejected here as well.
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(Error::RangeViolation {
            field,
            value,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_in_range_reading() {
        let validator = ReadingValidator::default();
        let reading = validator
            .validate_json(
                r#"{"temperature":25,"humidity":60,"pressure":1013,"timestamp":"2024-01-01T00:00:00"}"#,
            )
            .unwrap();
        assert_eq!(reading.temperature, 25.0);
    }

    #[test]
    fn test_rejects_humidity_out_of_range() {
        let validator = ReadingValidator::default();
        let err = validator
            .validate_json(r#"{"temperature":25,"humidity":150,"pressure":1013}"#)
            .unwrap_err();

        assert!(matches!(
            err,
            Error::RangeViolation {
                field: "humidity",
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_boundary_violations() {
        let validator = ReadingValidator::default();

        let too_cold = SensorReading::new(-40.1, 50.0, 1013.0);
        assert!(validator.validate(&too_cold).is_err());

        let at_bound = SensorReading::new(-40.0, 0.0, 900.0);
        assert!(validator.validate(&at_bound).is_ok());

        let too_high_pressure = SensorReading::new(20.0, 50.0, 1100.5);
        assert!(validator.validate(&too_high_pressure).is_err());
    }

    #[test]
    fn test_rejects_missing_field_as_malformed() {
        let validator = ReadingValidator::default();
        let err = validator
            .validate_json(r#"{"temperature":25,"humidity":60}"#)
            .unwrap_err();
        assert!(matches!(err, Error::MalformedPayload(_)));
    }

    #[test]
    fn test_rejects_non_numeric_field() {
        let validator = ReadingValidator::default();
        let err = validator
            .validate_json(r#"{"temperature":true,"humidity":60,"pressure":1013}"#)
            .unwrap_err();
        assert!(matches!(err, Error::MalformedPayload(_)));
    }

    #[test]
    fn test_custom_ranges() {
        let validator = ReadingValidator::new(
            ValidatorConfig::default().temperature_range(0.0, 30.0),
        );
        let reading = SensorReading::new(-5.0, 50.0, 1013.0);
        assert!(validator.validate(&reading).is_err());
    }
}
