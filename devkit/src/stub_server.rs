/*!
Serveur stub axum reproduisant le serveur de monitoring

ROUTES :
- GET  /api/devices                       (bearer)
- GET  /api/metrics/iot_data/{id}         (bearer)
- GET  /api/security/device_alerts/{id}   (bearer)
- GET  /api/metrics/iot_heatmap/{id}      (bearer)
- POST /api/metrics/iot_data              ingestion télémétrie, 100 derniers par device
- POST /api/security/alert                ingestion alerte, 100 dernières par device

Sévérité d'une alerte ingérée : `critical` si `attack_detected`, sinon `warning`.
*/

use crate::payloads::PayloadBuilder;
use anyhow::{Context, Result};
use axum::extract::{Path, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use gamesec_monitor::heatmap::synthetic;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Entrées conservées par device, comme le serveur réel
pub const RETAINED_PER_DEVICE: usize = 100;

#[derive(Debug, Default)]
struct StubData {
    devices: Vec<Value>,
    iot_data: HashMap<String, Vec<Value>>,
    alerts: HashMap<String, Vec<Value>>,
    malformed: bool,
}

#[derive(Clone)]
struct StubState {
    data: Arc<Mutex<StubData>>,
    token: Option<String>,
    heatmap_size: (usize, usize),
}

fn push_bounded(list: &mut Vec<Value>, value: Value) {
    list.push(value);
    if list.len() > RETAINED_PER_DEVICE {
        let excess = list.len() - RETAINED_PER_DEVICE;
        list.drain(..excess);
    }
}

async fn require_bearer(State(state): State<StubState>, req: Request, next: Next) -> Result<Response, StatusCode> {
    let Some(expected) = state.token.as_deref() else {
        return Ok(next.run(req).await);
    };

    let ok = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected);

    if !ok {
        log::warn!("[STUB] Rejected unauthenticated request to {}", req.uri().path());
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

async fn get_devices(State(state): State<StubState>) -> Response {
    let data = state.data.lock();
    if data.malformed {
        return (StatusCode::OK, "{\"devices\": [").into_response();
    }
    Json(PayloadBuilder::devices(data.devices.clone())).into_response()
}

async fn get_iot_data(State(state): State<StubState>, Path(device_id): Path<String>) -> Json<Value> {
    let data = state.data.lock();
    let samples = data.iot_data.get(&device_id).cloned().unwrap_or_default();
    Json(PayloadBuilder::telemetry(samples))
}

async fn get_device_alerts(State(state): State<StubState>, Path(device_id): Path<String>) -> Json<Value> {
    let data = state.data.lock();
    let alerts = data.alerts.get(&device_id).cloned().unwrap_or_default();
    Json(PayloadBuilder::alerts(alerts))
}

async fn get_iot_heatmap(State(state): State<StubState>, Path(device_id): Path<String>) -> Json<Value> {
    let (width, height) = state.heatmap_size;
    let payload = synthetic::generate(&device_id, width, height).to_payload();
    Json(json!({
        "device_id": device_id,
        "timestamp": Utc::now().to_rfc3339(),
        "position_heatmap": payload.position_heatmap,
        "click_heatmap": payload.click_heatmap,
        "resolution": { "width": width, "height": height }
    }))
}

async fn receive_iot_data(State(state): State<StubState>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let Some(device_id) = body.get("device_id").and_then(Value::as_str).map(str::to_string) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "Missing device ID" })));
    };

    let mut data = state.data.lock();
    push_bounded(data.iot_data.entry(device_id).or_default(), body);
    (StatusCode::OK, Json(json!({ "status": "success" })))
}

async fn receive_security_alert(State(state): State<StubState>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let device_id = body.get("device_id").and_then(Value::as_str);
    let event_type = body.get("event_type").and_then(Value::as_str);
    let (Some(device_id), Some(event_type)) = (device_id, event_type) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "Missing required fields" })));
    };

    let severity = if event_type == "attack_detected" { "critical" } else { "warning" };
    log::info!("[STUB] {} alert from {}: {}", severity, device_id, event_type);

    let alert = json!({
        "timestamp": PayloadBuilder::naive_timestamp(Utc::now()),
        "event_type": event_type,
        "details": body.get("details").cloned().unwrap_or(Value::Null),
        "severity": severity
    });

    let mut data = state.data.lock();
    push_bounded(data.alerts.entry(device_id.to_string()).or_default(), alert);
    (StatusCode::OK, Json(json!({ "status": "success" })))
}

fn build_router(state: StubState) -> Router {
    let protected = Router::new()
        .route("/api/devices", get(get_devices))
        .route("/api/metrics/iot_data/{device_id}", get(get_iot_data))
        .route("/api/security/device_alerts/{device_id}", get(get_device_alerts))
        .route("/api/metrics/iot_heatmap/{device_id}", get(get_iot_heatmap))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/metrics/iot_data", post(receive_iot_data))
        .route("/api/security/alert", post(receive_security_alert))
        .merge(protected)
        .with_state(state)
}

/// Serveur stub lancé en tâche de fond
pub struct StubServer {
    addr: SocketAddr,
    data: Arc<Mutex<StubData>>,
    task: JoinHandle<()>,
}

impl StubServer {
    /// Bind sur `addr` (port 0 pour un port libre) et sert en tâche de fond
    pub async fn spawn(addr: &str, token: Option<&str>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind stub server on {addr}"))?;
        let addr = listener.local_addr().context("Failed to read stub server address")?;

        let data = Arc::new(Mutex::new(StubData::default()));
        let state = StubState {
            data: data.clone(),
            token: token.map(str::to_string),
            heatmap_size: (192, 108),
        };
        let app = build_router(state);

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("[STUB] Server error: {}", e);
            }
        });
        log::info!("[STUB] Listening on http://{}", addr);

        Ok(Self { addr, data, task })
    }

    /// Port libre sur localhost
    pub async fn spawn_local(token: Option<&str>) -> Result<Self> {
        Self::spawn("127.0.0.1:0", token).await
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn add_device(&self, client_id: &str, name: &str, device_type: &str) {
        self.data.lock().devices.push(PayloadBuilder::device(client_id, name, device_type));
    }

    pub fn push_sample(&self, sample: Value) {
        let Some(device_id) = sample.get("device_id").and_then(Value::as_str).map(str::to_string) else {
            return;
        };
        push_bounded(self.data.lock().iot_data.entry(device_id).or_default(), sample);
    }

    pub fn push_alert(&self, device_id: &str, alert: Value) {
        push_bounded(self.data.lock().alerts.entry(device_id.to_string()).or_default(), alert);
    }

    pub fn sample_count(&self, device_id: &str) -> usize {
        self.data.lock().iot_data.get(device_id).map_or(0, Vec::len)
    }

    pub fn alerts_for(&self, device_id: &str) -> Vec<Value> {
        self.data.lock().alerts.get(device_id).cloned().unwrap_or_default()
    }

    /// Le catalogue renvoie un JSON tronqué tant que le flag est actif
    pub fn set_malformed(&self, malformed: bool) {
        self.data.lock().malformed = malformed;
    }

    /// Démo hors-ligne : le device `mouse-001` avec un échantillon sain et une alerte critique
    pub fn seed_demo(&self) {
        self.add_device("mouse-001", "Gaming Mouse", "mouse_sensor");
        self.push_sample(PayloadBuilder::sample("mouse-001", false, 0.0));
        self.push_alert("mouse-001", PayloadBuilder::critical_alert(Utc::now()));
    }

    pub async fn wait(self) -> Result<()> {
        self.task.await.context("Stub server task failed")
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_history() {
        let mut list = Vec::new();
        for n in 0..150 {
            push_bounded(&mut list, json!(n));
        }
        assert_eq!(list.len(), RETAINED_PER_DEVICE);
        assert_eq!(list[0], json!(50));
    }
}
