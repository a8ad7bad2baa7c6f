//! `roastlink-types` – wire record, topic naming and error types shared by
//! every roastlink crate.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One decoded telemetry sample published by the roaster controller.
///
/// Field names on the wire are camel-cased (`beanTemp`, `heaterPWM`, …).
/// Unknown fields are ignored so that newer firmware can add channels
/// without breaking the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Producer-side capture time, milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Bean-mass temperature, °C.
    #[serde(rename = "beanTemp")]
    pub bean_temp: f64,
    /// Chamber / environment temperature, °C.
    #[serde(rename = "envTemp")]
    pub env_temp: f64,
    /// Bean temperature rate of change, °C/min.
    #[serde(rename = "rateOfRise")]
    pub rate_of_rise: f64,
    /// Heater duty cycle, 0–100.
    #[serde(rename = "heaterPWM")]
    pub heater_pwm: u8,
    /// Fan duty cycle, 0–255.
    #[serde(rename = "fanPWM")]
    pub fan_pwm: u8,
    /// Target temperature, °C.
    pub setpoint: f64,
    /// Controller mode; opaque to the bridge.
    #[serde(rename = "controlMode")]
    pub control_mode: u8,
    /// Heater enable flag (0/1).
    #[serde(rename = "heaterEnable")]
    pub heater_enable: u8,
    /// Device uptime counter.
    pub uptime: u64,
}

impl TelemetryRecord {
    /// Decode one inbound message payload.
    ///
    /// Either the whole record decodes or nothing does: a payload that is not
    /// JSON, misses a field, or carries a value of the wrong type (including
    /// an out-of-range integer such as `"heaterPWM": 300`) is rejected.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(payload).map_err(|e| DecodeError::Malformed(e.to_string()))
    }

    /// Render the two-column line consumed by the roast-logging software:
    /// `"<beanTemp>,<envTemp>\n"` with one decimal place each.
    ///
    /// Rust float formatting never consults the locale, so the decimal
    /// separator is always `.`.
    pub fn format_for_serial(&self) -> String {
        format!("{:.1},{:.1}\n", self.bean_temp, self.env_temp)
    }

    /// Capture time as a UTC timestamp, or `None` when the producer clock
    /// value is outside chrono's representable range.
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.timestamp)
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }
}

/// Free-function form of [`TelemetryRecord::decode`].
pub fn decode(payload: &[u8]) -> Result<TelemetryRecord, DecodeError> {
    TelemetryRecord::decode(payload)
}

/// Free-function form of [`TelemetryRecord::format_for_serial`].
pub fn format_for_serial(record: &TelemetryRecord) -> String {
    record.format_for_serial()
}

/// Build the subscription topic for a device: `roaster/<deviceId>/telemetry`.
pub fn telemetry_topic(device_id: &str) -> String {
    format!("roaster/{device_id}/telemetry")
}

/// Build the broker client identifier for a device: `mqtt-bridge-<deviceId>`.
pub fn client_id(device_id: &str) -> String {
    format!("mqtt-bridge-{device_id}")
}

/// Failure to turn an inbound payload into a [`TelemetryRecord`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("malformed telemetry payload: {0}")]
    Malformed(String),
}

/// Error taxonomy of the bridge.
///
/// Only [`BridgeError::SerialOpen`] and [`BridgeError::Config`] are fatal,
/// and only at startup; every other variant is logged by the activity that
/// hit it and the activity carries on.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Failed to open serial port {path}: {details}")]
    SerialOpen { path: String, details: String },

    #[error("Serial write error: {0}")]
    SerialWrite(String),

    #[error("Serial write timed out after {0:?}")]
    SerialTimeout(Duration),

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{"timestamp":1000,"beanTemp":25.0,"envTemp":23.0,"rateOfRise":0,"heaterPWM":10,"fanPWM":150,"setpoint":200,"controlMode":1,"heaterEnable":1,"uptime":5}"#;

    #[test]
    fn decode_sample_payload() {
        let record = TelemetryRecord::decode(SAMPLE.as_bytes()).unwrap();
        assert_eq!(record.timestamp, 1000);
        assert!((record.bean_temp - 25.0).abs() < f64::EPSILON);
        assert!((record.env_temp - 23.0).abs() < f64::EPSILON);
        assert!((record.rate_of_rise - 0.0).abs() < f64::EPSILON);
        assert_eq!(record.heater_pwm, 10);
        assert_eq!(record.fan_pwm, 150);
        assert!((record.setpoint - 200.0).abs() < f64::EPSILON);
        assert_eq!(record.control_mode, 1);
        assert_eq!(record.heater_enable, 1);
        assert_eq!(record.uptime, 5);
    }

    #[test]
    fn sample_formats_as_two_columns() {
        let record = decode(SAMPLE.as_bytes()).unwrap();
        assert_eq!(format_for_serial(&record), "25.0,23.0\n");
    }

    #[test]
    fn format_rounds_to_one_decimal() {
        let payload = r#"{"timestamp":1,"beanTemp":87.456,"envTemp":64.04,"rateOfRise":12.5,"heaterPWM":80,"fanPWM":255,"setpoint":210.0,"controlMode":2,"heaterEnable":0,"uptime":99}"#;
        let record = decode(payload.as_bytes()).unwrap();
        assert_eq!(record.format_for_serial(), "87.5,64.0\n");
    }

    #[test]
    fn format_keeps_negative_and_large_values() {
        let payload = r#"{"timestamp":1,"beanTemp":-3.25,"envTemp":1234.56,"rateOfRise":0,"heaterPWM":0,"fanPWM":0,"setpoint":0,"controlMode":0,"heaterEnable":0,"uptime":0}"#;
        let record = decode(payload.as_bytes()).unwrap();
        let line = record.format_for_serial();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches(',').count(), 1);
        assert!(line.ends_with(",1234.6\n"), "got {line:?}");
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let payload = SAMPLE.replace("\"uptime\":5", "\"uptime\":5,\"firmware\":\"1.2.3\"");
        assert!(decode(payload.as_bytes()).is_ok());
    }

    #[test]
    fn missing_field_is_rejected() {
        let payload = SAMPLE.replace("\"envTemp\":23.0,", "");
        let err = decode(payload.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("envTemp"), "got {err}");
    }

    #[test]
    fn wrong_type_is_rejected() {
        let payload = SAMPLE.replace("\"beanTemp\":25.0", "\"beanTemp\":\"hot\"");
        assert!(decode(payload.as_bytes()).is_err());
    }

    #[test]
    fn out_of_range_integer_is_rejected() {
        let payload = SAMPLE.replace("\"heaterPWM\":10", "\"heaterPWM\":300");
        assert!(decode(payload.as_bytes()).is_err());
        let payload = SAMPLE.replace("\"uptime\":5", "\"uptime\":-5");
        assert!(decode(payload.as_bytes()).is_err());
    }

    #[test]
    fn snake_case_keys_are_rejected() {
        let payload = SAMPLE.replace("beanTemp", "bean_temp");
        assert!(decode(payload.as_bytes()).is_err());
    }

    #[test]
    fn non_json_bytes_are_rejected() {
        assert!(decode(b"25.0,23.0").is_err());
        assert!(decode(&[0xff, 0xfe, 0x00]).is_err());
        assert!(decode(b"").is_err());
        assert!(decode(b"[1,2,3]").is_err());
    }

    #[test]
    fn captured_at_converts_millis() {
        let record = decode(SAMPLE.as_bytes()).unwrap();
        let at = record.captured_at().unwrap();
        assert_eq!(at.timestamp_millis(), 1000);

        let far_future = TelemetryRecord {
            timestamp: u64::MAX,
            ..record
        };
        assert_eq!(far_future.captured_at(), None);
    }

    #[test]
    fn topic_and_client_id_follow_device_id() {
        assert_eq!(telemetry_topic("esp32_roaster_01"), "roaster/esp32_roaster_01/telemetry");
        assert_eq!(client_id("esp32_roaster_01"), "mqtt-bridge-esp32_roaster_01");
    }

    #[test]
    fn bridge_error_display() {
        let err = BridgeError::SerialOpen {
            path: "/dev/ttyUSB0".to_string(),
            details: "No such file or directory".to_string(),
        };
        assert!(err.to_string().contains("/dev/ttyUSB0"));

        let err: BridgeError = DecodeError::Malformed("eof".to_string()).into();
        assert!(matches!(err, BridgeError::Decode(_)));
        assert!(err.to_string().contains("eof"));
    }
}
