/*!
Builders de payloads JSON pour les endpoints du serveur de monitoring

Les formes reproduisent celles du serveur réel, y compris les timestamps
ISO-8601 naïfs (`2024-05-01T12:30:00.123456`, heure locale).
*/

use chrono::{DateTime, Local, Utc};
use serde_json::{json, Value};

/// Helper pour créer des payloads de test
pub struct PayloadBuilder;

impl PayloadBuilder {
    /// Timestamp naïf en heure locale, comme `datetime.now().isoformat()`
    pub fn naive_timestamp(ts: DateTime<Utc>) -> String {
        ts.with_timezone(&Local).naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }

    /// Entrée du catalogue `GET /api/devices`
    pub fn device(client_id: &str, name: &str, device_type: &str) -> Value {
        json!({
            "client_id": client_id,
            "name": name,
            "device_type": device_type,
            "status": "active",
            "registered_at": Utc::now().to_rfc3339()
        })
    }

    /// Enveloppe `{"devices": [...]}`
    pub fn devices(devices: Vec<Value>) -> Value {
        json!({ "devices": devices })
    }

    /// Échantillon de télémétrie souris à l'instant `ts`
    pub fn sample_at(device_id: &str, ts: DateTime<Utc>, under_attack: bool, attack_duration: f64) -> Value {
        json!({
            "device_id": device_id,
            "session_id": "test-session",
            "timestamp": Self::naive_timestamp(ts),
            "metrics": {
                "clicks_per_second": 4,
                "movements_count": 120,
                "dpi": 16000,
                "polling_rate": 1000,
                "avg_click_distance": 42.5,
                "button_count": 8,
                "device_temperature": 31.5
            },
            "status": {
                "under_attack": under_attack,
                "attack_duration": attack_duration,
                "battery_level": 85,
                "connection_quality": if under_attack { 45 } else { 95 }
            }
        })
    }

    pub fn sample(device_id: &str, under_attack: bool, attack_duration: f64) -> Value {
        Self::sample_at(device_id, Utc::now(), under_attack, attack_duration)
    }

    /// Enveloppe `{"data": [...]}`
    pub fn telemetry(samples: Vec<Value>) -> Value {
        json!({ "data": samples })
    }

    /// Alerte telle que servie par `GET /api/security/device_alerts/{id}`
    /// (pas de device_id dans l'enregistrement)
    pub fn alert_at(event_type: &str, severity: &str, ts: DateTime<Utc>) -> Value {
        json!({
            "timestamp": Self::naive_timestamp(ts),
            "event_type": event_type,
            "details": {
                "attack_type": "ping_flood",
                "intensity": 72,
                "threshold": 50
            },
            "severity": severity
        })
    }

    pub fn critical_alert(ts: DateTime<Utc>) -> Value {
        Self::alert_at("attack_detected", "critical", ts)
    }

    /// Enveloppe `{"alerts": [...]}`
    pub fn alerts(alerts: Vec<Value>) -> Value {
        json!({ "alerts": alerts })
    }

    /// Heatmap uniforme `height` x `width`
    pub fn heatmap(width: usize, height: usize, fill: f64) -> Value {
        json!({
            "position_heatmap": vec![vec![fill; width]; height],
            "click_heatmap": vec![vec![fill; width]; height],
            "resolution": { "width": width, "height": height }
        })
    }

    /// Corps de `POST /api/security/alert`
    pub fn alert_report(device_id: &str, event_type: &str) -> Value {
        json!({
            "device_id": device_id,
            "event_type": event_type,
            "details": { "attack_type": "ping_flood", "intensity": 72, "threshold": 50 }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamesec_monitor::models::{AlertsResponse, DevicesResponse, Severity, TelemetryResponse};

    #[test]
    fn test_payloads_decode_as_models() {
        let devices: DevicesResponse =
            serde_json::from_value(PayloadBuilder::devices(vec![PayloadBuilder::device("m1", "Mouse", "mouse")]))
                .unwrap();
        assert_eq!(devices.devices[0].client_id, "m1");

        let now = Utc::now();
        let telemetry: TelemetryResponse =
            serde_json::from_value(PayloadBuilder::telemetry(vec![PayloadBuilder::sample_at("m1", now, true, 12.0)]))
                .unwrap();
        assert!(telemetry.data[0].status.under_attack);
        // microsecond precision survives the naive round trip
        assert_eq!(telemetry.data[0].timestamp.timestamp_micros(), now.timestamp_micros());

        let alerts: AlertsResponse =
            serde_json::from_value(PayloadBuilder::alerts(vec![PayloadBuilder::critical_alert(now)])).unwrap();
        assert_eq!(alerts.alerts[0].severity, Severity::Critical);
    }
}
