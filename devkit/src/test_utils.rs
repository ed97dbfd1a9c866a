/*!
Test Harness pour le scheduler gamesec-monitor

Facilite l'écriture de tests avec:
- Setup automatique du mock API et de la config
- Démarrage/arrêt du scheduler
- Attentes sur l'état (`wait_for`) et sur les requêtes émises
*/

use crate::mock_api::{Endpoint, MockMonitorApi};
use crate::payloads::PayloadBuilder;
use anyhow::{Context, Result};
use gamesec_monitor::config::{FallbackPolicy, MonitorConfig, StaleResponsePolicy};
use gamesec_monitor::state::MonitorState;
use gamesec_monitor::{PollingScheduler, SchedulerHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};

/// Harness de test complet pour le scheduler
pub struct TestHarness {
    pub api: Arc<MockMonitorApi>,
    pub config: MonitorConfig,
    handle: Option<SchedulerHandle>,
}

impl TestHarness {
    /// Crée un nouveau harness de test (config par défaut, mock vide)
    pub fn new() -> Self {
        env_logger::try_init().ok(); // Init logging pour tests

        Self {
            api: Arc::new(MockMonitorApi::new()),
            config: MonitorConfig::default(),
            handle: None,
        }
    }

    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.config.policy.fallback = fallback;
        self
    }

    pub fn with_stale_responses(mut self, policy: StaleResponsePolicy) -> Self {
        self.config.policy.stale_responses = policy;
        self
    }

    pub fn with_cadence_secs(mut self, secs: u64) -> Self {
        self.config.polling.cadence_secs = secs;
        self
    }

    /// Script le catalogue: `(client_id, name, device_type)`
    pub fn with_devices(self, devices: &[(&str, &str, &str)]) -> Self {
        let entries = devices
            .iter()
            .map(|(id, name, kind)| PayloadBuilder::device(id, name, kind))
            .collect();
        self.api.set_devices(PayloadBuilder::devices(entries));
        self
    }

    /// Démarre le scheduler avec la cadence de la config
    pub fn start(&mut self) -> Result<&SchedulerHandle> {
        let cadence = self.config.polling.cadence().context("Invalid cadence in test config")?;
        let scheduler =
            PollingScheduler::new(self.api.clone(), &self.config).context("Failed to create scheduler")?;
        log::info!("Starting scheduler (cadence {})", cadence);
        Ok(&*self.handle.insert(scheduler.start(cadence)))
    }

    pub fn handle(&self) -> Result<&SchedulerHandle> {
        self.handle.as_ref().context("Scheduler not started")
    }

    /// Lecture de l'état sous verrou
    pub fn read<R>(&self, f: impl FnOnce(&MonitorState) -> R) -> Result<R> {
        Ok(self.handle()?.read(f))
    }

    /// Attend que `predicate` soit vrai sur l'état, réévalué à chaque révision
    pub async fn wait_for(
        &self,
        description: &str,
        timeout_ms: u64,
        predicate: impl Fn(&MonitorState) -> bool,
    ) -> Result<()> {
        let handle = self.handle()?;
        let mut revision = handle.revision();
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);

        loop {
            if handle.read(&predicate) {
                log::info!("✅ {}", description);
                return Ok(());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, revision.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) => anyhow::bail!("Scheduler stopped while waiting for: {}", description),
                Err(_) => {
                    log::warn!("⏰ Timeout waiting for: {}", description);
                    anyhow::bail!("Timeout after {}ms waiting for: {}", timeout_ms, description);
                }
            }
        }
    }

    /// Attend qu'au moins `count` requêtes aient été émises sur un endpoint
    pub async fn wait_for_requests(
        &self,
        endpoint: Endpoint,
        device_id: Option<&str>,
        count: usize,
        timeout_ms: u64,
    ) -> Result<()> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);

        while Instant::now() < deadline {
            if self.api.count(endpoint, device_id) >= count {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        anyhow::bail!(
            "Expected {} {:?} requests for {:?}, got {}",
            count,
            endpoint,
            device_id,
            self.api.count(endpoint, device_id)
        );
    }

    /// Arrête le scheduler s'il tourne
    pub async fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop().await;
            log::info!("🧹 Scheduler stopped");
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_harness_basic_functionality() {
        let mut harness = TestHarness::new().with_devices(&[("mouse-001", "Gaming Mouse", "mouse")]);
        assert!(harness.read(|_| ()).is_err());

        harness.start().unwrap();
        harness
            .wait_for("catalog loaded", 2_000, |state| state.selected_id() == Some("mouse-001"))
            .await
            .unwrap();
        harness
            .wait_for_requests(Endpoint::Telemetry, Some("mouse-001"), 1, 2_000)
            .await
            .unwrap();

        harness.stop().await;
        assert!(harness.handle().is_err());
    }
}
