//! GameSec Monitor - client-side security monitor for IoT gaming peripherals
//!
//! Polls a monitoring server for the device catalog, per-device telemetry,
//! security alerts and interaction heatmaps, and derives a live attack
//! verdict for the selected device:
//! - `scheduler` drives every fetch and owns all state mutation
//! - `correlator` fuses self-reported status with recent critical alerts
//! - `heatmap` aggregates interaction grids and maps cells to colours
//! - `state` is what a presenter reads

pub mod api;
pub mod catalog;
pub mod config;
pub mod correlator;
pub mod error;
pub mod fallback;
pub mod feed;
pub mod heatmap;
pub mod models;
pub mod scheduler;
pub mod state;
pub mod timer;

pub use api::{HttpMonitorApi, MonitorApi};
pub use config::MonitorConfig;
pub use correlator::{correlate, AttackState};
pub use error::{ConfigError, FetchError, SchedulerError};
pub use scheduler::{Cadence, PollingScheduler, SchedulerHandle};
pub use state::{MonitorState, SecurityVerdict, VerdictStatus};
