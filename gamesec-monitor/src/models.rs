//! Wire and domain models for the monitoring API
//!
//! Covers:
//! - Device catalog entries (`GET /api/devices`)
//! - Telemetry samples (`GET /api/metrics/iot_data/{id}`)
//! - Security alerts (`GET /api/security/device_alerts/{id}`)
//! - Heatmap snapshots (`GET /api/metrics/iot_heatmap/{id}`)
//! - Lenient timestamp decoding (RFC 3339 or naive ISO-8601)

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Raw device record as returned by the catalog endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDevice {
    pub client_id: String,
    #[serde(default)]
    pub name: String,
    pub device_type: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Envelope of `GET /api/devices`
#[derive(Debug, Deserialize)]
pub struct DevicesResponse {
    #[serde(default)]
    pub devices: Vec<RawDevice>,
}

/// Sensor-qualified device kinds the monitor knows how to display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    MouseSensor,
    KeyboardSensor,
    HeadsetSensor,
}

impl DeviceKind {
    /// Parse both legacy (`mouse`) and sensor-qualified (`mouse_sensor`) labels
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "mouse" | "mouse_sensor" => Some(DeviceKind::MouseSensor),
            "keyboard" | "keyboard_sensor" => Some(DeviceKind::KeyboardSensor),
            "headset" | "headset_sensor" => Some(DeviceKind::HeadsetSensor),
            _ => None,
        }
    }

    /// Sensor-qualified label used after normalization
    pub fn label(self) -> &'static str {
        match self {
            DeviceKind::MouseSensor => "mouse_sensor",
            DeviceKind::KeyboardSensor => "keyboard_sensor",
            DeviceKind::HeadsetSensor => "headset_sensor",
        }
    }
}

/// Normalized, monitorable device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub display_name: String,
    pub kind: DeviceKind,
    /// Normalized sensor-qualified type label (e.g. `mouse_sensor`)
    pub device_type: String,
    pub status: Option<String>,
}

impl From<&Device> for RawDevice {
    fn from(device: &Device) -> Self {
        RawDevice {
            client_id: device.id.clone(),
            name: device.display_name.clone(),
            device_type: device.device_type.clone(),
            status: device.status.clone(),
        }
    }
}

/// Self-reported device status carried by every telemetry sample
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceStatus {
    #[serde(default)]
    pub under_attack: bool,
    #[serde(rename = "attack_duration", default)]
    pub attack_duration_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_quality: Option<f64>,
}

/// One timestamped telemetry snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub device_id: String,
    #[serde(with = "lenient_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub status: DeviceStatus,
}

/// Envelope of `GET /api/metrics/iot_data/{id}`
#[derive(Debug, Deserialize)]
pub struct TelemetryResponse {
    #[serde(default)]
    pub data: Vec<TelemetrySample>,
}

/// Alert event classification
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AlertEventType {
    AttackDetected,
    AttackResolved,
    Other(String),
}

impl From<String> for AlertEventType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "attack_detected" => AlertEventType::AttackDetected,
            "attack_resolved" => AlertEventType::AttackResolved,
            _ => AlertEventType::Other(value),
        }
    }
}

impl From<AlertEventType> for String {
    fn from(value: AlertEventType) -> Self {
        match value {
            AlertEventType::AttackDetected => "attack_detected".to_string(),
            AlertEventType::AttackResolved => "attack_resolved".to_string(),
            AlertEventType::Other(other) => other,
        }
    }
}

/// Alert severity; unknown labels degrade to `Info`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "warning" => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

impl From<Severity> for String {
    fn from(value: Severity) -> Self {
        match value {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
        .to_string()
    }
}

/// Alert record as served by the alert feed (no device id on the wire)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    #[serde(with = "lenient_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub event_type: AlertEventType,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    #[serde(default)]
    pub details: Option<serde_json::Map<String, serde_json::Value>>,
}

fn default_severity() -> Severity {
    Severity::Info
}

/// Envelope of `GET /api/security/device_alerts/{id}`
#[derive(Debug, Deserialize)]
pub struct AlertsResponse {
    #[serde(default)]
    pub alerts: Vec<AlertRecord>,
}

/// Security alert attributed to the device it was requested for
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityAlert {
    pub device_id: String,
    #[serde(with = "lenient_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub event_type: AlertEventType,
    pub severity: Severity,
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl SecurityAlert {
    pub fn from_record(device_id: &str, record: AlertRecord) -> Self {
        SecurityAlert {
            device_id: device_id.to_string(),
            timestamp: record.timestamp,
            event_type: record.event_type,
            severity: record.severity,
            details: record.details.unwrap_or_default(),
        }
    }
}

/// Declared heatmap grid size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: usize,
    pub height: usize,
}

/// Body of `GET /api/metrics/iot_heatmap/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapPayload {
    pub position_heatmap: Vec<Vec<f64>>,
    pub click_heatmap: Vec<Vec<f64>>,
    pub resolution: Resolution,
}

/// Timestamps arrive either as RFC 3339 or as naive local ISO-8601 strings
/// (`2024-05-01T12:30:00.123456`). Naive values are read as local time.
pub mod lenient_timestamp {
    use super::*;

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|ts| ts.with_timezone(&Utc))
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_device_kind_labels() {
        assert_eq!(DeviceKind::from_label("mouse"), Some(DeviceKind::MouseSensor));
        assert_eq!(DeviceKind::from_label("headset_sensor"), Some(DeviceKind::HeadsetSensor));
        assert_eq!(DeviceKind::from_label("system"), None);
        assert_eq!(DeviceKind::KeyboardSensor.label(), "keyboard_sensor");
    }

    #[test]
    fn test_sample_decoding_with_extra_status_fields() {
        let raw = json!({
            "device_id": "keyboard-001",
            "session_id": "session_1",
            "timestamp": "2024-05-01T12:30:00.123456",
            "metrics": {"keypresses_per_second": 4, "device_temperature": 29.6},
            "status": {
                "under_attack": true,
                "attack_duration": 12,
                "battery_level": 100,
                "connection_quality": 55,
                "illumination": {"mode": "wave", "color": "#ff0000", "brightness": 80}
            }
        });

        let sample: TelemetrySample = serde_json::from_value(raw).unwrap();
        assert!(sample.status.under_attack);
        assert_eq!(sample.status.attack_duration_seconds, 12.0);
        assert_eq!(sample.metrics["keypresses_per_second"], 4.0);
        assert_eq!(sample.status.connection_quality, Some(55.0));
    }

    #[test]
    fn test_sample_without_status_is_secure() {
        let raw = json!({"device_id": "m1", "timestamp": "2024-05-01T12:30:00Z"});
        let sample: TelemetrySample = serde_json::from_value(raw).unwrap();
        assert!(!sample.status.under_attack);
        assert!(sample.metrics.is_empty());
    }

    #[test]
    fn test_alert_record_decoding() {
        let raw = json!({
            "timestamp": "2024-05-01T12:30:00+00:00",
            "event_type": "port_scan",
            "details": null,
            "severity": "CRITICAL"
        });
        let record: AlertRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(record.severity, Severity::Critical);
        assert_eq!(record.event_type, AlertEventType::Other("port_scan".into()));

        let alert = SecurityAlert::from_record("mouse-001", record);
        assert_eq!(alert.device_id, "mouse-001");
        assert!(alert.details.is_empty());
    }

    #[test]
    fn test_unknown_severity_degrades_to_info() {
        assert_eq!(Severity::from("notice".to_string()), Severity::Info);
        assert_eq!(String::from(Severity::Warning), "warning");
    }

    #[test]
    fn test_naive_timestamp_is_local_time() {
        let parsed = lenient_timestamp::parse("2024-05-01T12:30:00").unwrap();
        let expected = Local
            .with_ymd_and_hms(2024, 5, 1, 12, 30, 0)
            .earliest()
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(parsed, expected);
        assert!(lenient_timestamp::parse("yesterday").is_none());
    }
}
