//! Attack-state correlation
//!
//! Fuses a device's self-reported status with the independent alert stream.
//! Either source alone is sufficient evidence of an attack: the latest sample
//! saying `under_attack`, or any critical alert younger than the window.

use crate::models::{SecurityAlert, Severity, TelemetrySample};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Age (ms) below which a critical alert counts as current evidence
pub const CRITICAL_ALERT_WINDOW_MS: i64 = 60_000;

/// Derived verdict, recomputed on every read
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AttackState {
    pub under_attack: bool,
    pub attack_duration_seconds: f64,
}

/// True when the alert is critical and strictly younger than the window.
/// Future-dated alerts (negative age) count as recent.
pub fn is_recent_critical(alert: &SecurityAlert, now: DateTime<Utc>) -> bool {
    alert.severity == Severity::Critical
        && now.signed_duration_since(alert.timestamp).num_milliseconds() < CRITICAL_ALERT_WINDOW_MS
}

pub fn correlate<'a>(
    sample: Option<&TelemetrySample>,
    alerts: impl IntoIterator<Item = &'a SecurityAlert>,
    now: DateTime<Utc>,
) -> AttackState {
    let self_reported = sample.is_some_and(|s| s.status.under_attack);
    let recent_critical = alerts.into_iter().any(|alert| is_recent_critical(alert, now));

    AttackState {
        under_attack: self_reported || recent_critical,
        attack_duration_seconds: sample.map_or(0.0, |s| s.status.attack_duration_seconds),
    }
}
