//! HTTP client against the axum stub server

use gamesec_devkit::stub_server::RETAINED_PER_DEVICE;
use gamesec_devkit::{PayloadBuilder, StubServer};
use gamesec_monitor::config::ApiConfig;
use gamesec_monitor::models::{AlertEventType, Severity};
use gamesec_monitor::{Cadence, FetchError, HttpMonitorApi, MonitorApi, MonitorConfig, PollingScheduler};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const TOKEN: &str = "test-token";

fn client(server: &StubServer, token: Option<&str>) -> HttpMonitorApi {
    let config = ApiConfig {
        base_url: server.base_url(),
        token: token.map(str::to_string),
        request_timeout_secs: 2,
    };
    HttpMonitorApi::new(&config).unwrap()
}

#[tokio::test]
async fn test_bearer_token_is_required() {
    let server = StubServer::spawn_local(Some(TOKEN)).await.unwrap();
    server.add_device("m1", "Mouse", "mouse");

    let devices = client(&server, Some(TOKEN)).fetch_devices().await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].client_id, "m1");

    let err = client(&server, None).fetch_devices().await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 401, .. }), "got {err:?}");
    assert!(err.is_transport());

    let err = client(&server, Some("wrong")).fetch_telemetry("m1").await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 401, .. }));
    server.shutdown();
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server = StubServer::spawn_local(None).await.unwrap();
    server.set_malformed(true);

    let err = client(&server, None).fetch_devices().await.unwrap_err();
    assert!(err.is_decode(), "got {err:?}");

    server.set_malformed(false);
    assert!(client(&server, None).fetch_devices().await.unwrap().is_empty());
    server.shutdown();
}

#[tokio::test]
async fn test_ingested_data_is_served_back() {
    let server = StubServer::spawn_local(None).await.unwrap();
    let http = reqwest::Client::new();

    let response = http
        .post(format!("{}/api/metrics/iot_data", server.base_url()))
        .json(&PayloadBuilder::sample("m1", true, 12.0))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    for event_type in ["attack_detected", "attack_resolved"] {
        let response = http
            .post(format!("{}/api/security/alert", server.base_url()))
            .json(&PayloadBuilder::alert_report("m1", event_type))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
    }

    let missing = http
        .post(format!("{}/api/security/alert", server.base_url()))
        .json(&json!({ "device_id": "m1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::BAD_REQUEST);

    let api = client(&server, None);
    let samples = api.fetch_telemetry("m1").await.unwrap();
    assert_eq!(samples.len(), 1);
    assert!(samples[0].status.under_attack);
    assert_eq!(samples[0].status.attack_duration_seconds, 12.0);

    let alerts = api.fetch_alerts("m1").await.unwrap();
    assert_eq!(alerts.len(), 2);
    assert!(alerts.iter().all(|a| a.device_id == "m1"));
    assert_eq!(alerts[0].event_type, AlertEventType::AttackDetected);
    assert_eq!(alerts[0].severity, Severity::Critical);
    assert_eq!(alerts[1].severity, Severity::Warning);
    server.shutdown();
}

#[tokio::test]
async fn test_device_ids_never_reach_another_device() {
    let server = StubServer::spawn_local(Some(TOKEN)).await.unwrap();
    server.push_sample(PayloadBuilder::sample("m1", true, 30.0));
    server.push_sample(PayloadBuilder::sample("m1#spare", false, 0.0));
    let api = client(&server, Some(TOKEN));

    let samples = api.fetch_telemetry("m1#spare").await.unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].device_id, "m1#spare");
    assert!(!samples[0].status.under_attack);

    assert!(api.fetch_telemetry("m1?x=1").await.unwrap().is_empty());
    assert!(api.fetch_alerts("m1#").await.unwrap().is_empty());
    assert_eq!(api.fetch_telemetry("m1").await.unwrap().len(), 1);
    server.shutdown();
}

#[tokio::test]
async fn test_ingest_history_is_bounded() {
    let server = StubServer::spawn_local(None).await.unwrap();
    let http = reqwest::Client::new();

    for _ in 0..RETAINED_PER_DEVICE + 5 {
        http.post(format!("{}/api/security/alert", server.base_url()))
            .json(&PayloadBuilder::alert_report("k1", "attack_detected"))
            .send()
            .await
            .unwrap();
    }
    assert_eq!(server.alerts_for("k1").len(), RETAINED_PER_DEVICE);
    server.shutdown();
}

#[tokio::test]
async fn test_heatmap_matches_declared_resolution() {
    let server = StubServer::spawn_local(Some(TOKEN)).await.unwrap();
    let payload = client(&server, Some(TOKEN)).fetch_heatmap("m1").await.unwrap();

    assert_eq!(payload.position_heatmap.len(), payload.resolution.height);
    assert_eq!(payload.click_heatmap[0].len(), payload.resolution.width);
    assert!(payload.position_heatmap.iter().flatten().all(|v| (0.0..=100.0).contains(v)));
    server.shutdown();
}

#[tokio::test]
async fn test_scheduler_over_http_detects_attack() {
    let server = StubServer::spawn_local(Some(TOKEN)).await.unwrap();
    server.seed_demo();

    let mut config = MonitorConfig::default();
    config.api.base_url = server.base_url();
    config.api.token = Some(TOKEN.to_string());

    let api = Arc::new(HttpMonitorApi::new(&config.api).unwrap());
    let handle = PollingScheduler::new(api, &config).unwrap().start(Cadence::Every1s);
    let mut revision = handle.revision();

    let detected = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let verdict = handle.read(|state| state.verdict());
            if verdict.attack.under_attack {
                return verdict;
            }
            if revision.changed().await.is_err() {
                panic!("scheduler stopped");
            }
        }
    })
    .await
    .expect("verdict within 5s");

    assert_eq!(detected.device_id.as_deref(), Some("mouse-001"));
    handle.read(|state| {
        assert_eq!(state.devices()[0].display_name, "Gaming Mouse Sensor");
        assert!(state.latest_sample("mouse-001").is_some());
    });

    handle.stop().await;
    server.shutdown();
}
