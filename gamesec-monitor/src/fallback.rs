//! Locally synthesized data substituted for failed fetches
//!
//! Only consulted under `FallbackPolicy::Synthetic` (telemetry and alerts)
//! or when nothing real has ever been received (catalog and heatmap).

use crate::models::{AlertEventType, Device, DeviceKind, DeviceStatus, SecurityAlert, Severity, TelemetrySample};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::BTreeMap;

/// Two-device catalog installed when the first catalog fetch fails
pub fn fallback_catalog() -> Vec<Device> {
    vec![
        Device {
            id: "mouse-001".into(),
            display_name: "Gaming Mouse Sensor".into(),
            kind: DeviceKind::MouseSensor,
            device_type: DeviceKind::MouseSensor.label().into(),
            status: Some("active".into()),
        },
        Device {
            id: "keyboard-001".into(),
            display_name: "Gaming Keyboard Sensor".into(),
            kind: DeviceKind::KeyboardSensor,
            device_type: DeviceKind::KeyboardSensor.label().into(),
            status: Some("active".into()),
        },
    ]
}

fn baseline_metrics(kind: Option<DeviceKind>) -> BTreeMap<String, f64> {
    let pairs: &[(&str, f64)] = match kind {
        Some(DeviceKind::MouseSensor) | None => &[
            ("clicks_per_second", 4.0),
            ("movements_count", 120.0),
            ("dpi", 16_000.0),
            ("polling_rate", 1_000.0),
            ("avg_click_distance", 42.5),
            ("button_count", 8.0),
        ],
        Some(DeviceKind::KeyboardSensor) => &[
            ("keypresses_per_second", 6.0),
            ("keys_pressed_count", 45.0),
            ("avg_hold_duration_ms", 95.0),
            ("polling_rate", 1_000.0),
            ("current_rollover", 2.0),
            ("max_rollover", 10.0),
        ],
        Some(DeviceKind::HeadsetSensor) => &[
            ("input_rate", 120.0),
            ("response_time", 2.5),
            ("error_rate", 0.1),
        ],
    };
    pairs.iter().map(|(name, value)| (name.to_string(), *value)).collect()
}

/// One secure sample for the device; kind decides which metrics appear
pub fn synthetic_sample(device_id: &str, kind: Option<DeviceKind>, now: DateTime<Utc>) -> TelemetrySample {
    TelemetrySample {
        device_id: device_id.to_string(),
        timestamp: now,
        metrics: baseline_metrics(kind),
        status: DeviceStatus {
            under_attack: false,
            attack_duration_seconds: 0.0,
            battery_level: Some(85.0),
            connection_quality: Some(95.0),
        },
    }
}

/// One critical `attack_detected` alert stamped `now`
pub fn synthetic_alert(device_id: &str, now: DateTime<Utc>) -> SecurityAlert {
    let details = match json!({"attack_type": "ping_flood", "intensity": 72, "threshold": 50}) {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    SecurityAlert {
        device_id: device_id.to_string(),
        timestamp: now,
        event_type: AlertEventType::AttackDetected,
        severity: Severity::Critical,
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlator::correlate;

    #[test]
    fn test_fallback_catalog_is_normalized() {
        let devices = fallback_catalog();
        let as_raw: Vec<_> = devices.iter().map(crate::models::RawDevice::from).collect();
        assert_eq!(crate::catalog::normalize_devices(&as_raw), devices);
        assert_eq!(devices[0].id, "mouse-001");
        assert_eq!(devices[1].display_name, "Gaming Keyboard Sensor");
    }

    #[test]
    fn test_metrics_follow_kind() {
        let now = Utc::now();
        let mouse = synthetic_sample("m1", Some(DeviceKind::MouseSensor), now);
        let keyboard = synthetic_sample("k1", Some(DeviceKind::KeyboardSensor), now);
        assert!(mouse.metrics.contains_key("dpi"));
        assert!(keyboard.metrics.contains_key("keypresses_per_second"));
        assert!(!keyboard.status.under_attack);
    }

    #[test]
    fn test_synthetic_alert_alone_means_attack() {
        let now = Utc::now();
        let sample = synthetic_sample("m1", None, now);
        let alerts = [synthetic_alert("m1", now)];
        assert_eq!(alerts[0].details["attack_type"], "ping_flood");
        assert!(correlate(Some(&sample), &alerts, now).under_attack);
    }
}
