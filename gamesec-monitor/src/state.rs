//! Explicit state holder
//!
//! Everything the presenter reads lives in `MonitorState`. The scheduler task
//! is the only writer; readers take the shared read lock and query.

use crate::catalog::{DeviceCatalog, SelectionChange};
use crate::config::MonitorConfig;
use crate::correlator::{correlate, AttackState};
use crate::error::SchedulerError;
use crate::feed::{AlertFeed, TelemetryFeed};
use crate::heatmap::HeatmapGrid;
use crate::models::{Device, SecurityAlert, TelemetrySample};
use crate::scheduler::Cadence;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub type Shared<T> = Arc<RwLock<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(RwLock::new(value))
}

/// Which per-device feed a fetch result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    Telemetry,
    Alerts,
    Heatmap,
}

/// Last error per feed for one device; `None` means the last fetch succeeded
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedHealth {
    pub telemetry: Option<String>,
    pub alerts: Option<String>,
    pub heatmap: Option<String>,
}

impl FeedHealth {
    fn slot(&mut self, kind: FeedKind) -> &mut Option<String> {
        match kind {
            FeedKind::Telemetry => &mut self.telemetry,
            FeedKind::Alerts => &mut self.alerts,
            FeedKind::Heatmap => &mut self.heatmap,
        }
    }

    /// Attack evidence is incomplete when either evidence feed failed
    pub fn is_degraded(&self) -> bool {
        self.telemetry.is_some() || self.alerts.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    /// Both evidence feeds answered on their last poll
    Live,
    /// At least one evidence feed failed; the verdict uses whatever real data exists
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityVerdict {
    pub device_id: Option<String>,
    pub attack: AttackState,
    pub status: VerdictStatus,
}

#[derive(Debug)]
pub struct MonitorState {
    catalog: DeviceCatalog,
    telemetry: TelemetryFeed,
    alerts: AlertFeed,
    heatmaps: HashMap<String, HeatmapGrid>,
    health: HashMap<String, FeedHealth>,
    cadence: Cadence,
    refreshing: bool,
    catalog_error: Option<String>,
    cycles_completed: u64,
}

impl MonitorState {
    pub fn new(capacity: usize, cadence: Cadence) -> Self {
        Self {
            catalog: DeviceCatalog::new(),
            telemetry: TelemetryFeed::new(capacity),
            alerts: AlertFeed::new(capacity),
            heatmaps: HashMap::new(),
            health: HashMap::new(),
            cadence,
            refreshing: true,
            catalog_error: None,
            cycles_completed: 0,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Result<Self, SchedulerError> {
        let cadence = Cadence::try_from(config.polling.cadence_secs)?;
        Ok(Self::new(config.buffers.capacity, cadence))
    }

    // --- queries ---

    pub fn catalog(&self) -> &DeviceCatalog {
        &self.catalog
    }

    pub fn devices(&self) -> &[Device] {
        self.catalog.devices()
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.catalog.selected_id()
    }

    pub fn selected_device(&self) -> Option<&Device> {
        self.catalog.selected_device()
    }

    /// `None` means no data yet for this device
    pub fn latest_sample(&self, device_id: &str) -> Option<&TelemetrySample> {
        self.telemetry.latest(device_id)
    }

    pub fn latest_metrics(&self, device_id: &str) -> Option<&BTreeMap<String, f64>> {
        self.latest_sample(device_id).map(|sample| &sample.metrics)
    }

    pub fn telemetry(&self, device_id: &str) -> Vec<&TelemetrySample> {
        self.telemetry.entries(device_id).collect()
    }

    pub fn alerts(&self, device_id: &str) -> Vec<&SecurityAlert> {
        self.alerts.entries(device_id).collect()
    }

    /// Most recent alerts first
    pub fn recent_alerts(&self, device_id: &str, limit: usize) -> Vec<&SecurityAlert> {
        self.alerts.entries(device_id).rev().take(limit).collect()
    }

    pub fn heatmap(&self, device_id: &str) -> Option<&HeatmapGrid> {
        self.heatmaps.get(device_id)
    }

    pub fn health(&self, device_id: &str) -> FeedHealth {
        self.health.get(device_id).cloned().unwrap_or_default()
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    pub fn catalog_error(&self) -> Option<&str> {
        self.catalog_error.as_deref()
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }

    pub fn attack_state(&self, device_id: &str, now: DateTime<Utc>) -> AttackState {
        correlate(self.latest_sample(device_id), self.alerts.entries(device_id), now)
    }

    pub fn verdict_for(&self, device_id: &str, now: DateTime<Utc>) -> SecurityVerdict {
        let status = if self.health.get(device_id).is_some_and(FeedHealth::is_degraded) {
            VerdictStatus::Degraded
        } else {
            VerdictStatus::Live
        };
        SecurityVerdict {
            device_id: Some(device_id.to_string()),
            attack: self.attack_state(device_id, now),
            status,
        }
    }

    /// Verdict for the selected device; secure and live when nothing is selected
    pub fn verdict_at(&self, now: DateTime<Utc>) -> SecurityVerdict {
        match self.selected_id() {
            Some(id) => self.verdict_for(id, now),
            None => SecurityVerdict {
                device_id: None,
                attack: AttackState::default(),
                status: VerdictStatus::Live,
            },
        }
    }

    pub fn verdict(&self) -> SecurityVerdict {
        self.verdict_at(Utc::now())
    }

    // --- mutations (scheduler task only) ---

    pub(crate) fn replace_catalog(&mut self, devices: Vec<Device>) -> SelectionChange {
        self.catalog.replace(devices)
    }

    pub(crate) fn set_catalog_error(&mut self, error: Option<String>) {
        self.catalog_error = error;
    }

    pub(crate) fn select(&mut self, device_id: Option<&str>) -> Result<SelectionChange, SchedulerError> {
        self.catalog.select(device_id)
    }

    pub(crate) fn set_cadence(&mut self, cadence: Cadence) {
        self.cadence = cadence;
    }

    pub(crate) fn set_refreshing(&mut self, refreshing: bool) {
        self.refreshing = refreshing;
    }

    /// Append the newest sample of a poll unless it is already the latest
    pub(crate) fn record_telemetry(&mut self, device_id: &str, samples: Vec<TelemetrySample>) -> bool {
        match samples.into_iter().last() {
            Some(sample) => self.telemetry.push_if_new(device_id, sample),
            None => false,
        }
    }

    pub(crate) fn record_alerts(&mut self, device_id: &str, alerts: Vec<SecurityAlert>) -> usize {
        self.alerts.merge_new(device_id, alerts)
    }

    pub(crate) fn record_heatmap(&mut self, device_id: &str, grid: HeatmapGrid) {
        self.heatmaps.insert(device_id.to_string(), grid);
    }

    pub(crate) fn mark_ok(&mut self, device_id: &str, kind: FeedKind) {
        if let Some(health) = self.health.get_mut(device_id) {
            *health.slot(kind) = None;
        }
    }

    pub(crate) fn mark_failed(&mut self, device_id: &str, kind: FeedKind, error: String) {
        *self.health.entry(device_id.to_string()).or_default().slot(kind) = Some(error);
    }

    pub(crate) fn finish_cycle(&mut self) {
        self.cycles_completed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::{fallback_catalog, synthetic_alert};
    use crate::models::DeviceStatus;

    fn sample(device_id: &str, under_attack: bool, secs: i64) -> TelemetrySample {
        TelemetrySample {
            device_id: device_id.into(),
            timestamp: DateTime::from_timestamp(1_714_564_800 + secs, 0).unwrap(),
            metrics: BTreeMap::from([("dpi".to_string(), 16_000.0)]),
            status: DeviceStatus {
                under_attack,
                ..DeviceStatus::default()
            },
        }
    }

    fn state_with_catalog() -> MonitorState {
        let mut state = MonitorState::new(500, Cadence::Every5s);
        state.replace_catalog(fallback_catalog());
        state
    }

    #[test]
    fn test_unknown_device_has_no_data() {
        let state = state_with_catalog();
        assert!(state.latest_sample("ghost").is_none());
        assert!(state.latest_metrics("mouse-001").is_none());
        assert!(state.alerts("mouse-001").is_empty());
    }

    #[test]
    fn test_repeated_poll_does_not_grow_feed() {
        let mut state = state_with_catalog();
        let poll = vec![sample("mouse-001", false, 0), sample("mouse-001", false, 5)];
        assert!(state.record_telemetry("mouse-001", poll.clone()));
        assert!(!state.record_telemetry("mouse-001", poll));
        assert_eq!(state.telemetry("mouse-001").len(), 1);
        assert_eq!(state.latest_metrics("mouse-001").unwrap()["dpi"], 16_000.0);
    }

    #[test]
    fn test_verdict_follows_selection() {
        let mut state = state_with_catalog();
        state.record_telemetry("keyboard-001", vec![sample("keyboard-001", true, 0)]);

        let now = Utc::now();
        assert!(!state.verdict_at(now).attack.under_attack);

        state.select(Some("keyboard-001")).unwrap();
        let verdict = state.verdict_at(now);
        assert_eq!(verdict.device_id.as_deref(), Some("keyboard-001"));
        assert!(verdict.attack.under_attack);
    }

    #[test]
    fn test_degraded_status_clears_on_success() {
        let mut state = state_with_catalog();
        state.mark_failed("mouse-001", FeedKind::Alerts, "timeout".into());
        assert_eq!(state.verdict().status, VerdictStatus::Degraded);

        state.mark_failed("mouse-001", FeedKind::Heatmap, "timeout".into());
        state.mark_ok("mouse-001", FeedKind::Alerts);
        assert_eq!(state.verdict().status, VerdictStatus::Live);
        assert!(state.health("mouse-001").heatmap.is_some());
    }

    #[test]
    fn test_alerts_are_merged_and_listed_newest_first() {
        let mut state = state_with_catalog();
        let now = Utc::now();
        let first = synthetic_alert("mouse-001", now - chrono::TimeDelta::minutes(5));
        let second = synthetic_alert("mouse-001", now);

        assert_eq!(state.record_alerts("mouse-001", vec![first.clone()]), 1);
        assert_eq!(state.record_alerts("mouse-001", vec![first, second.clone()]), 1);
        assert_eq!(state.recent_alerts("mouse-001", 1), vec![&second]);
    }

    #[test]
    fn test_verdict_expires_without_new_data() {
        let mut state = state_with_catalog();
        let raised = Utc::now();
        state.record_alerts("mouse-001", vec![synthetic_alert("mouse-001", raised)]);
        state.set_refreshing(false);

        assert!(state.verdict_at(raised + chrono::TimeDelta::seconds(59)).attack.under_attack);
        assert!(!state.verdict_at(raised + chrono::TimeDelta::seconds(60)).attack.under_attack);
    }

    #[test]
    fn test_no_selection_is_secure() {
        let state = MonitorState::new(10, Cadence::Every1s);
        let verdict = state.verdict();
        assert_eq!(verdict.device_id, None);
        assert_eq!(verdict.attack, AttackState::default());
    }
}
