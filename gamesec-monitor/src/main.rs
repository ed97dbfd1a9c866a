//! GameSec Monitor console - live attack verdict for the selected peripheral
//!
//! Prints one status line per state change and accepts commands on stdin:
//! `devices`, `select <id>`, `cadence <1|5|10|30>`, `pause`, `resume`,
//! `alerts`, `heatmap`, `quit`.

use anyhow::{bail, Context, Result};
use gamesec_monitor::heatmap::{band_of, ColorBand, HeatmapKind};
use gamesec_monitor::state::MonitorState;
use gamesec_monitor::{Cadence, HttpMonitorApi, MonitorConfig, PollingScheduler, SchedulerHandle, VerdictStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

const RENDER_INTERVAL: Duration = Duration::from_secs(1);

/// Console presenter
struct Console {
    handle: SchedulerHandle,
    last_line: String,
}

impl Console {
    fn status_line(state: &MonitorState) -> String {
        let Some(device) = state.selected_device() else {
            return match state.catalog_error() {
                Some(err) => format!("no device selected (catalog error: {err})"),
                None => "no device selected".to_string(),
            };
        };

        let verdict = state.verdict();
        let mut line = format!(
            "{} [{}] {}",
            device.display_name,
            device.id,
            if verdict.attack.under_attack { "UNDER ATTACK" } else { "secure" }
        );
        if verdict.attack.under_attack {
            line.push_str(&format!(" for {:.0}s", verdict.attack.attack_duration_seconds));
        }
        if verdict.status == VerdictStatus::Degraded {
            line.push_str(" (degraded)");
        }
        match state.latest_sample(&device.id) {
            Some(sample) => {
                if let Some(quality) = sample.status.connection_quality {
                    line.push_str(&format!(", link {quality:.0}%"));
                }
                if let Some(battery) = sample.status.battery_level {
                    line.push_str(&format!(", battery {battery:.0}%"));
                }
            }
            None => line.push_str(", no data"),
        }
        if !state.is_refreshing() {
            line.push_str(" [paused]");
        }
        line
    }

    fn print_status(&mut self) {
        let line = self.handle.read(Self::status_line);
        if line != self.last_line {
            println!("{line}");
            self.last_line = line;
        }
    }

    fn print_devices(&self) {
        self.handle.read(|state| {
            for device in state.devices() {
                let marker = if state.selected_id() == Some(device.id.as_str()) { "*" } else { " " };
                println!("{marker} {:<16} {:<28} {}", device.id, device.display_name, device.device_type);
            }
        });
    }

    fn print_alerts(&self) {
        self.handle.read(|state| {
            let Some(id) = state.selected_id() else { return };
            for alert in state.recent_alerts(id, 10) {
                println!(
                    "{} {:?} {}",
                    alert.timestamp.format("%H:%M:%S"),
                    alert.severity,
                    String::from(alert.event_type.clone())
                );
            }
        });
    }

    /// Coarse text rendering: one character per band, every 4th cell
    fn print_heatmap(&self) {
        self.handle.read(|state| {
            let Some(grid) = state.selected_id().and_then(|id| state.heatmap(id)) else {
                println!("no heatmap yet");
                return;
            };
            for row in grid.snapshot(HeatmapKind::Movement).iter().step_by(4) {
                let line: String = row
                    .iter()
                    .step_by(4)
                    .map(|value| match band_of(*value) {
                        ColorBand::Transparent => ' ',
                        ColorBand::Blue => '.',
                        ColorBand::Green => ':',
                        ColorBand::Amber => '+',
                        ColorBand::Orange => '*',
                        ColorBand::Red => '#',
                    })
                    .collect();
                println!("{line}");
            }
        });
    }

    /// Returns false on `quit`
    async fn handle_input(&mut self, input: &str) -> Result<bool> {
        let mut words = input.split_whitespace();
        match (words.next(), words.next()) {
            (None, _) => {}
            (Some("quit" | "exit"), _) => return Ok(false),
            (Some("devices"), _) => self.print_devices(),
            (Some("alerts"), _) => self.print_alerts(),
            (Some("heatmap"), _) => self.print_heatmap(),
            (Some("pause"), _) => self.handle.pause()?,
            (Some("resume"), _) => self.handle.resume()?,
            (Some("select"), id) => {
                if let Err(err) = self.handle.select_device(id).await {
                    println!("{err}");
                }
            }
            (Some("cadence"), Some(secs)) => match secs.parse::<u64>().map(Cadence::try_from) {
                Ok(Ok(cadence)) => self.handle.set_cadence(cadence)?,
                Ok(Err(err)) => println!("{err}"),
                Err(_) => println!("cadence expects a number of seconds"),
            },
            (Some(other), _) => println!("unknown command: {other}"),
        }
        Ok(true)
    }

    async fn run(mut self) -> Result<()> {
        let mut revision = self.handle.revision();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;
        // verdicts age without any state change (alerts leave the window)
        let mut render = tokio::time::interval(RENDER_INTERVAL);
        render.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                changed = revision.changed() => {
                    if changed.is_err() {
                        bail!("scheduler stopped unexpectedly");
                    }
                    self.print_status();
                }
                _ = render.tick() => self.print_status(),
                line = lines.next_line(), if stdin_open => {
                    match line.context("Failed to read stdin")? {
                        Some(input) => {
                            if !self.handle_input(input.trim()).await? {
                                break;
                            }
                        }
                        None => stdin_open = false,
                    }
                }
                _ = &mut ctrl_c => {
                    info!("Interrupted");
                    break;
                }
            }
        }

        self.handle.stop().await;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gamesec_monitor=info")),
        )
        .init();

    info!("GameSec Monitor v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = MonitorConfig::load().await.context("Failed to load configuration")?;
    if config.api.token.is_none() {
        warn!("No API token configured; requests will be unauthenticated");
    }
    let cadence = config.polling.cadence().context("Invalid polling cadence")?;

    let api = HttpMonitorApi::new(&config.api).context("Failed to build HTTP client")?;
    info!("Monitoring server at {}", api.base_url());

    let scheduler = PollingScheduler::new(Arc::new(api), &config).context("Failed to create scheduler")?;
    let console = Console {
        handle: scheduler.start(cadence),
        last_line: String::new(),
    };

    console.run().await.context("Monitor execution failed")?;
    Ok(())
}
