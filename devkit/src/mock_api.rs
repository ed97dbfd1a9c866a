/*!
Mock de l'API de monitoring pour tester le scheduler sans serveur

Les réponses sont des corps JSON scriptés par endpoint et par device, décodés
avec les mêmes enveloppes que le client HTTP. Chaque requête est journalisée.
Une "porte" (gate) permet de retenir une réponse en vol pour simuler un
serveur lent, puis de la relâcher au moment choisi par le test.
*/

use gamesec_monitor::error::FetchError;
use gamesec_monitor::models::{
    AlertsResponse, DevicesResponse, HeatmapPayload, RawDevice, SecurityAlert, TelemetryResponse, TelemetrySample,
};
use gamesec_monitor::MonitorApi;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Devices,
    Telemetry,
    Alerts,
    Heatmap,
}

impl Endpoint {
    fn url(self, device_id: Option<&str>) -> String {
        let id = device_id.unwrap_or_default();
        match self {
            Endpoint::Devices => "mock://api/devices".to_string(),
            Endpoint::Telemetry => format!("mock://api/metrics/iot_data/{id}"),
            Endpoint::Alerts => format!("mock://api/security/device_alerts/{id}"),
            Endpoint::Heatmap => format!("mock://api/metrics/iot_heatmap/{id}"),
        }
    }

    fn empty_body(self) -> Value {
        match self {
            Endpoint::Devices => json!({ "devices": [] }),
            Endpoint::Telemetry => json!({ "data": [] }),
            Endpoint::Alerts => json!({ "alerts": [] }),
            Endpoint::Heatmap => json!({
                "position_heatmap": [[0, 0], [0, 0]],
                "click_heatmap": [[0, 0], [0, 0]],
                "resolution": { "width": 2, "height": 2 }
            }),
        }
    }
}

/// Type d'échec simulé
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Serveur injoignable
    Transport,
    /// Réponse HTTP non-2xx
    Status(u16),
    /// Corps JSON invalide
    Decode,
}

#[derive(Debug, Clone)]
enum Reply {
    Json(Value),
    Fail(MockFailure),
}

type Key = (Endpoint, Option<String>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRequest {
    pub endpoint: Endpoint,
    pub device_id: Option<String>,
}

#[derive(Default)]
struct MockState {
    replies: HashMap<Key, Reply>,
    gates: HashMap<Key, watch::Sender<bool>>,
    requests: Vec<MockRequest>,
}

/// Mock qui implémente `MonitorApi`
#[derive(Clone, Default)]
pub struct MockMonitorApi {
    inner: Arc<Mutex<MockState>>,
}

impl MockMonitorApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(endpoint: Endpoint, device_id: Option<&str>) -> Key {
        (endpoint, device_id.map(str::to_string))
    }

    /// Script le corps JSON renvoyé pour un endpoint (`device_id` ignoré pour `Devices`)
    pub fn respond(&self, endpoint: Endpoint, device_id: Option<&str>, body: Value) -> &Self {
        let device_id = if endpoint == Endpoint::Devices { None } else { device_id };
        self.inner
            .lock()
            .replies
            .insert(Self::key(endpoint, device_id), Reply::Json(body));
        self
    }

    /// Script un échec pour un endpoint
    pub fn fail(&self, endpoint: Endpoint, device_id: Option<&str>, failure: MockFailure) -> &Self {
        let device_id = if endpoint == Endpoint::Devices { None } else { device_id };
        self.inner
            .lock()
            .replies
            .insert(Self::key(endpoint, device_id), Reply::Fail(failure));
        self
    }

    pub fn set_devices(&self, body: Value) -> &Self {
        self.respond(Endpoint::Devices, None, body)
    }

    pub fn set_telemetry(&self, device_id: &str, body: Value) -> &Self {
        self.respond(Endpoint::Telemetry, Some(device_id), body)
    }

    pub fn set_alerts(&self, device_id: &str, body: Value) -> &Self {
        self.respond(Endpoint::Alerts, Some(device_id), body)
    }

    pub fn set_heatmap(&self, device_id: &str, body: Value) -> &Self {
        self.respond(Endpoint::Heatmap, Some(device_id), body)
    }

    /// Retient les réponses de cet endpoint jusqu'à `release`
    pub fn hold(&self, endpoint: Endpoint, device_id: Option<&str>) {
        let (gate, _) = watch::channel(false);
        self.inner.lock().gates.insert(Self::key(endpoint, device_id), gate);
    }

    /// Relâche toutes les réponses retenues pour cet endpoint
    pub fn release(&self, endpoint: Endpoint, device_id: Option<&str>) {
        if let Some(gate) = self.inner.lock().gates.remove(&Self::key(endpoint, device_id)) {
            gate.send_replace(true);
        }
    }

    /// Nombre de requêtes actuellement retenues par une porte
    pub fn held(&self, endpoint: Endpoint, device_id: Option<&str>) -> usize {
        self.inner
            .lock()
            .gates
            .get(&Self::key(endpoint, device_id))
            .map_or(0, watch::Sender::receiver_count)
    }

    /// Récupère toutes les requêtes reçues (pour assertions de tests)
    pub fn requests(&self) -> Vec<MockRequest> {
        self.inner.lock().requests.clone()
    }

    pub fn count(&self, endpoint: Endpoint, device_id: Option<&str>) -> usize {
        self.inner
            .lock()
            .requests
            .iter()
            .filter(|r| r.endpoint == endpoint && r.device_id.as_deref() == device_id)
            .count()
    }

    pub fn clear_requests(&self) {
        self.inner.lock().requests.clear();
    }

    async fn call<T: DeserializeOwned>(&self, endpoint: Endpoint, device_id: Option<&str>) -> Result<T, FetchError> {
        let gate = {
            let mut state = self.inner.lock();
            state.requests.push(MockRequest {
                endpoint,
                device_id: device_id.map(str::to_string),
            });
            state.gates.get(&Self::key(endpoint, device_id)).map(watch::Sender::subscribe)
        };

        if let Some(mut gate) = gate {
            log::debug!("[MOCK] Holding {:?} for {:?}", endpoint, device_id);
            // Sender dropped counts as released
            let _ = gate.wait_for(|open| *open).await;
        }

        let url = endpoint.url(device_id);
        let reply = self
            .inner
            .lock()
            .replies
            .get(&Self::key(endpoint, device_id))
            .cloned()
            .unwrap_or_else(|| Reply::Json(endpoint.empty_body()));

        match reply {
            Reply::Json(body) => serde_json::from_value(body).map_err(|source| FetchError::Decode { url, source }),
            Reply::Fail(MockFailure::Transport) => Err(FetchError::Unavailable(format!("{url}: connection refused"))),
            Reply::Fail(MockFailure::Status(status)) => Err(FetchError::Status { url, status }),
            Reply::Fail(MockFailure::Decode) => {
                let source = match serde_json::from_str::<Value>("{\"data\": [") {
                    Err(err) => err,
                    Ok(_) => return Err(FetchError::Unavailable(url)),
                };
                Err(FetchError::Decode { url, source })
            }
        }
    }
}

impl MonitorApi for MockMonitorApi {
    async fn fetch_devices(&self) -> Result<Vec<RawDevice>, FetchError> {
        let response: DevicesResponse = self.call(Endpoint::Devices, None).await?;
        Ok(response.devices)
    }

    async fn fetch_telemetry(&self, device_id: &str) -> Result<Vec<TelemetrySample>, FetchError> {
        let response: TelemetryResponse = self.call(Endpoint::Telemetry, Some(device_id)).await?;
        Ok(response.data)
    }

    async fn fetch_alerts(&self, device_id: &str) -> Result<Vec<SecurityAlert>, FetchError> {
        let response: AlertsResponse = self.call(Endpoint::Alerts, Some(device_id)).await?;
        Ok(response
            .alerts
            .into_iter()
            .map(|record| SecurityAlert::from_record(device_id, record))
            .collect())
    }

    async fn fetch_heatmap(&self, device_id: &str) -> Result<HeatmapPayload, FetchError> {
        self.call(Endpoint::Heatmap, Some(device_id)).await
    }
}
