/**
 * POLLING SCHEDULER - drives every fetch the monitor makes
 *
 * LOOPS:
 * - catalog : fixed interval, fires at start, keeps running while paused
 * - data    : telemetry + alerts for the selected device, at the user cadence
 * - heatmap : heatmap snapshot for the selected device, fixed interval
 *
 * The data and heatmap loops only run while refreshing and a device is
 * selected. Any reconfiguration (device change, cadence change, resume)
 * cancels the pending timer, fires immediately and re-arms.
 *
 * One task owns all state mutation. Commands, timer ticks and fetch results
 * all arrive as events and are applied one at a time in arrival order.
 * Fetches run in their own tasks and report back through the event queue,
 * each tagged with the device id it was issued for.
 */

use crate::api::MonitorApi;
use crate::catalog::{normalize_devices, SelectionChange};
use crate::config::{FallbackPolicy, MonitorConfig, PolicyConfig, StaleResponsePolicy};
use crate::error::{ConfigError, FetchError, SchedulerError};
use crate::fallback::{fallback_catalog, synthetic_alert, synthetic_sample};
use crate::heatmap::{synthetic, HeatmapGrid};
use crate::models::{RawDevice, SecurityAlert, TelemetrySample};
use crate::state::{new_state, FeedKind, MonitorState, Shared};
use crate::timer::TimerSlot;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

/// Data loop cadence; only these four are offered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Cadence {
    Every1s,
    Every5s,
    Every10s,
    Every30s,
}

impl Cadence {
    pub const ALL: [Cadence; 4] = [Cadence::Every1s, Cadence::Every5s, Cadence::Every10s, Cadence::Every30s];

    pub fn as_secs(self) -> u64 {
        match self {
            Cadence::Every1s => 1,
            Cadence::Every5s => 5,
            Cadence::Every10s => 10,
            Cadence::Every30s => 30,
        }
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_secs(self.as_secs())
    }
}

impl TryFrom<u64> for Cadence {
    type Error = SchedulerError;

    fn try_from(secs: u64) -> Result<Self, Self::Error> {
        Cadence::ALL
            .into_iter()
            .find(|cadence| cadence.as_secs() == secs)
            .ok_or(SchedulerError::InvalidCadence(secs))
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", self.as_secs())
    }
}

#[derive(Debug)]
enum Command {
    SetCadence(Cadence),
    Select(Option<String>, oneshot::Sender<Result<(), SchedulerError>>),
    Pause,
    Resume,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopKind {
    Catalog,
    Data,
    Heatmap,
}

#[derive(Debug)]
enum Event {
    Tick(LoopKind, u64),
    CatalogFetched(Result<Vec<RawDevice>, FetchError>),
    TelemetryFetched {
        device_id: String,
        result: Result<Vec<TelemetrySample>, FetchError>,
    },
    AlertsFetched {
        device_id: String,
        result: Result<Vec<SecurityAlert>, FetchError>,
    },
    CycleFinished {
        device_id: String,
    },
    HeatmapFetched {
        device_id: String,
        result: Result<HeatmapGrid, FetchError>,
    },
}

pub struct PollingScheduler<A: MonitorApi> {
    api: Arc<A>,
    state: Shared<MonitorState>,
    policy: PolicyConfig,
    catalog_interval: Duration,
    heatmap_interval: Duration,
    heatmap_size: (usize, usize),
}

impl<A: MonitorApi> PollingScheduler<A> {
    pub fn new(api: Arc<A>, config: &MonitorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let state = MonitorState::from_config(config)?;

        Ok(Self {
            api,
            state: new_state(state),
            policy: config.policy.clone(),
            catalog_interval: config.polling.catalog_interval(),
            heatmap_interval: config.polling.heatmap_interval(),
            heatmap_size: (config.heatmap.width, config.heatmap.height),
        })
    }

    pub fn state(&self) -> Shared<MonitorState> {
        self.state.clone()
    }

    /// Spawn the scheduler task. Must be called inside a tokio runtime.
    pub fn start(self, cadence: Cadence) -> SchedulerHandle {
        self.state.write().set_cadence(cadence);

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (revision_tx, revision_rx) = watch::channel(0u64);
        let state = self.state.clone();

        let actor = Actor {
            api: self.api,
            state: self.state,
            policy: self.policy,
            catalog_interval: self.catalog_interval,
            heatmap_interval: self.heatmap_interval,
            heatmap_size: self.heatmap_size,
            events: event_tx,
            revision: revision_tx,
            catalog_timer: TimerSlot::new(),
            data_timer: TimerSlot::new(),
            heatmap_timer: TimerSlot::new(),
            fetches: JoinSet::new(),
        };
        let task = tokio::spawn(actor.run(command_rx, event_rx));

        SchedulerHandle {
            commands: command_tx,
            state,
            revision: revision_rx,
            task,
        }
    }
}

/// Control surface and read access for a running scheduler
pub struct SchedulerHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: Shared<MonitorState>,
    revision: watch::Receiver<u64>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    fn send(&self, command: Command) -> Result<(), SchedulerError> {
        self.commands.send(command).map_err(|_| SchedulerError::SchedulerClosed)
    }

    pub fn state(&self) -> Shared<MonitorState> {
        self.state.clone()
    }

    /// Run `f` under the read lock
    pub fn read<R>(&self, f: impl FnOnce(&MonitorState) -> R) -> R {
        f(&self.state.read())
    }

    /// Receiver that changes every time the state does
    pub fn revision(&self) -> watch::Receiver<u64> {
        self.revision.clone()
    }

    pub fn set_cadence(&self, cadence: Cadence) -> Result<(), SchedulerError> {
        self.send(Command::SetCadence(cadence))
    }

    /// Select a device from the catalog (`None` clears the selection)
    pub async fn select_device(&self, device_id: Option<&str>) -> Result<(), SchedulerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Select(device_id.map(str::to_string), reply_tx))?;
        reply_rx.await.map_err(|_| SchedulerError::SchedulerClosed)?
    }

    pub fn pause(&self) -> Result<(), SchedulerError> {
        self.send(Command::Pause)
    }

    pub fn resume(&self) -> Result<(), SchedulerError> {
        self.send(Command::Resume)
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Cancel every timer and wait for the scheduler task to exit.
    /// In-flight fetches are aborted, not awaited.
    pub async fn stop(self) {
        let _ = self.commands.send(Command::Stop);
        if let Err(err) = self.task.await {
            warn!("Scheduler task ended abnormally: {}", err);
        }
    }
}

struct Actor<A: MonitorApi> {
    api: Arc<A>,
    state: Shared<MonitorState>,
    policy: PolicyConfig,
    catalog_interval: Duration,
    heatmap_interval: Duration,
    heatmap_size: (usize, usize),
    events: mpsc::UnboundedSender<Event>,
    revision: watch::Sender<u64>,
    catalog_timer: TimerSlot,
    data_timer: TimerSlot,
    heatmap_timer: TimerSlot,
    fetches: JoinSet<()>,
}

impl<A: MonitorApi> Actor<A> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) {
        info!(
            "Scheduler started (cadence {}, catalog every {:?}, heatmap every {:?})",
            self.state.read().cadence(),
            self.catalog_interval,
            self.heatmap_interval
        );

        self.fetch_catalog();
        self.arm(LoopKind::Catalog);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Stop) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(event) = events.recv() => self.handle_event(event),
            }
            while self.fetches.try_join_next().is_some() {}
        }

        self.catalog_timer.cancel();
        self.data_timer.cancel();
        self.heatmap_timer.cancel();
        self.fetches.abort_all();
        info!("Scheduler stopped");
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    fn arm(&mut self, kind: LoopKind) {
        let (slot, delay) = match kind {
            LoopKind::Catalog => (&mut self.catalog_timer, self.catalog_interval),
            LoopKind::Data => (&mut self.data_timer, self.state.read().cadence().as_duration()),
            LoopKind::Heatmap => (&mut self.heatmap_timer, self.heatmap_interval),
        };
        slot.arm(delay, &self.events, move |generation| Event::Tick(kind, generation));
    }

    /// Selected device when the data and heatmap loops should be running
    fn active_device(&self) -> Option<String> {
        let state = self.state.read();
        if !state.is_refreshing() {
            return None;
        }
        state.selected_id().map(str::to_string)
    }

    fn is_live(&self, device_id: &str) -> bool {
        self.state.read().selected_id() == Some(device_id)
    }

    // --- loop (re)configuration ---

    fn restart_data_loop(&mut self) {
        self.data_timer.cancel();
        if let Some(device_id) = self.active_device() {
            self.start_cycle(device_id);
            self.arm(LoopKind::Data);
        }
    }

    fn restart_heatmap_loop(&mut self) {
        self.heatmap_timer.cancel();
        if let Some(device_id) = self.active_device() {
            self.fetch_heatmap(device_id);
            self.arm(LoopKind::Heatmap);
        }
    }

    fn on_selection_change(&mut self, change: &SelectionChange) {
        if let SelectionChange::Changed { previous, current } = change {
            info!("Selected device {:?} -> {:?}", previous, current);
            self.restart_data_loop();
            self.restart_heatmap_loop();
        }
    }

    // --- fetch tasks ---

    fn fetch_catalog(&mut self) {
        let api = self.api.clone();
        let events = self.events.clone();
        self.fetches.spawn(async move {
            let result = api.fetch_devices().await;
            let _ = events.send(Event::CatalogFetched(result));
        });
    }

    /// Telemetry and alerts run concurrently; each result is reported as
    /// soon as it resolves
    fn start_cycle(&mut self, device_id: String) {
        debug!("Starting data cycle for {}", device_id);
        let api = self.api.clone();
        let events = self.events.clone();
        self.fetches.spawn(async move {
            let telemetry = async {
                let result = api.fetch_telemetry(&device_id).await;
                let _ = events.send(Event::TelemetryFetched {
                    device_id: device_id.clone(),
                    result,
                });
            };
            let alerts = async {
                let result = api.fetch_alerts(&device_id).await;
                let _ = events.send(Event::AlertsFetched {
                    device_id: device_id.clone(),
                    result,
                });
            };
            tokio::join!(telemetry, alerts);
            let _ = events.send(Event::CycleFinished { device_id });
        });
    }

    fn fetch_heatmap(&mut self, device_id: String) {
        let api = self.api.clone();
        let events = self.events.clone();
        self.fetches.spawn(async move {
            let result = api
                .fetch_heatmap(&device_id)
                .await
                .and_then(|payload| HeatmapGrid::from_payload(&payload).map_err(FetchError::from));
            let _ = events.send(Event::HeatmapFetched { device_id, result });
        });
    }

    // --- commands ---

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SetCadence(cadence) => {
                if self.state.read().cadence() == cadence {
                    return;
                }
                info!("Cadence set to {}", cadence);
                self.state.write().set_cadence(cadence);
                self.bump();
                self.restart_data_loop();
            }
            Command::Select(device_id, reply) => {
                let result = self.state.write().select(device_id.as_deref());
                match result {
                    Ok(change) => {
                        if change.is_changed() {
                            self.bump();
                        }
                        self.on_selection_change(&change);
                        let _ = reply.send(Ok(()));
                    }
                    Err(err) => {
                        warn!("Rejected selection: {}", err);
                        let _ = reply.send(Err(err));
                    }
                }
            }
            Command::Pause => {
                if !self.state.read().is_refreshing() {
                    return;
                }
                info!("Refresh paused");
                self.state.write().set_refreshing(false);
                self.data_timer.cancel();
                self.heatmap_timer.cancel();
                self.bump();
            }
            Command::Resume => {
                if self.state.read().is_refreshing() {
                    return;
                }
                info!("Refresh resumed");
                self.state.write().set_refreshing(true);
                self.bump();
                self.restart_data_loop();
                self.restart_heatmap_loop();
            }
            // Handled by the run loop
            Command::Stop => {}
        }
    }

    // --- events ---

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Tick(kind, generation) => self.on_tick(kind, generation),
            Event::CatalogFetched(result) => self.on_catalog(result),
            Event::TelemetryFetched { device_id, result } => self.on_telemetry(&device_id, result),
            Event::AlertsFetched { device_id, result } => self.on_alerts(&device_id, result),
            Event::CycleFinished { device_id } => {
                if self.is_live(&device_id) {
                    self.state.write().finish_cycle();
                    self.bump();
                }
            }
            Event::HeatmapFetched { device_id, result } => self.on_heatmap(&device_id, result),
        }
    }

    fn on_tick(&mut self, kind: LoopKind, generation: u64) {
        let accepted = match kind {
            LoopKind::Catalog => self.catalog_timer.accept(generation),
            LoopKind::Data => self.data_timer.accept(generation),
            LoopKind::Heatmap => self.heatmap_timer.accept(generation),
        };
        if !accepted {
            debug!("Ignoring stale {:?} tick", kind);
            return;
        }

        match kind {
            LoopKind::Catalog => {
                self.fetch_catalog();
                self.arm(LoopKind::Catalog);
            }
            LoopKind::Data => {
                if let Some(device_id) = self.active_device() {
                    self.start_cycle(device_id);
                    self.arm(LoopKind::Data);
                }
            }
            LoopKind::Heatmap => {
                if let Some(device_id) = self.active_device() {
                    self.fetch_heatmap(device_id);
                    self.arm(LoopKind::Heatmap);
                }
            }
        }
    }

    fn on_catalog(&mut self, result: Result<Vec<RawDevice>, FetchError>) {
        let change = {
            let mut state = self.state.write();
            match result {
                Ok(raw) => {
                    let devices = normalize_devices(&raw);
                    debug!("Catalog refreshed: {} of {} devices monitorable", devices.len(), raw.len());
                    state.set_catalog_error(None);
                    state.replace_catalog(devices)
                }
                Err(err) => {
                    warn!("Catalog fetch failed: {}", err);
                    state.set_catalog_error(Some(err.to_string()));
                    if self.policy.fallback == FallbackPolicy::Synthetic || state.catalog().is_empty() {
                        state.replace_catalog(fallback_catalog())
                    } else {
                        SelectionChange::Unchanged
                    }
                }
            }
        };
        self.bump();
        self.on_selection_change(&change);
    }

    /// False when the response should be dropped because its device is no
    /// longer selected
    fn accept_response(&self, device_id: &str, kind: FeedKind) -> bool {
        if self.is_live(device_id) {
            return true;
        }
        match self.policy.stale_responses {
            StaleResponsePolicy::Discard => {
                debug!("Discarding stale {:?} response for {}", kind, device_id);
                false
            }
            StaleResponsePolicy::FileUnderOrigin => {
                debug!("Filing stale {:?} response under {}", kind, device_id);
                true
            }
        }
    }

    fn on_telemetry(&mut self, device_id: &str, result: Result<Vec<TelemetrySample>, FetchError>) {
        if !self.accept_response(device_id, FeedKind::Telemetry) {
            return;
        }

        {
            let mut state = self.state.write();
            match result {
                Ok(samples) => {
                    state.mark_ok(device_id, FeedKind::Telemetry);
                    state.record_telemetry(device_id, samples);
                }
                Err(err) => {
                    warn!("Telemetry fetch for {} failed: {}", device_id, err);
                    state.mark_failed(device_id, FeedKind::Telemetry, err.to_string());
                    if self.policy.fallback == FallbackPolicy::Synthetic {
                        let kind = state.catalog().get(device_id).map(|device| device.kind);
                        state.record_telemetry(device_id, vec![synthetic_sample(device_id, kind, Utc::now())]);
                    }
                }
            }
        }
        self.bump();
    }

    fn on_alerts(&mut self, device_id: &str, result: Result<Vec<SecurityAlert>, FetchError>) {
        if !self.accept_response(device_id, FeedKind::Alerts) {
            return;
        }

        {
            let mut state = self.state.write();
            match result {
                Ok(alerts) => {
                    state.mark_ok(device_id, FeedKind::Alerts);
                    let appended = state.record_alerts(device_id, alerts);
                    if appended > 0 {
                        debug!("{} new alerts for {}", appended, device_id);
                    }
                }
                Err(err) => {
                    warn!("Alert fetch for {} failed: {}", device_id, err);
                    state.mark_failed(device_id, FeedKind::Alerts, err.to_string());
                    if self.policy.fallback == FallbackPolicy::Synthetic {
                        state.record_alerts(device_id, vec![synthetic_alert(device_id, Utc::now())]);
                    }
                }
            }
        }
        self.bump();
    }

    fn on_heatmap(&mut self, device_id: &str, result: Result<HeatmapGrid, FetchError>) {
        if !self.accept_response(device_id, FeedKind::Heatmap) {
            return;
        }

        {
            let mut state = self.state.write();
            match result {
                Ok(grid) => {
                    state.mark_ok(device_id, FeedKind::Heatmap);
                    state.record_heatmap(device_id, grid);
                }
                Err(err) => {
                    warn!("Heatmap fetch for {} failed: {}", device_id, err);
                    state.mark_failed(device_id, FeedKind::Heatmap, err.to_string());
                    if self.policy.fallback == FallbackPolicy::Synthetic || state.heatmap(device_id).is_none() {
                        let (width, height) = self.heatmap_size;
                        state.record_heatmap(device_id, synthetic::generate(device_id, width, height));
                    }
                }
            }
        }
        self.bump();
    }
}
