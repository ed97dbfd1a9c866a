/**
 * MONITOR API - HTTP transport for the monitoring server
 *
 * ROLE:
 * Four read-only endpoints, all behind a bearer token:
 * - GET /api/devices                          -> device catalog
 * - GET /api/metrics/iot_data/{id}            -> telemetry samples
 * - GET /api/security/device_alerts/{id}      -> security alerts
 * - GET /api/metrics/iot_heatmap/{id}         -> heatmap snapshot
 *
 * The scheduler is generic over `MonitorApi` so tests can drive it with a
 * scripted implementation instead of a live server.
 */

use crate::config::ApiConfig;
use crate::error::FetchError;
use crate::models::{
    AlertsResponse, DevicesResponse, HeatmapPayload, RawDevice, SecurityAlert, TelemetryResponse, TelemetrySample,
};
use serde::de::DeserializeOwned;
use std::future::Future;
use tracing::debug;

pub trait MonitorApi: Send + Sync + 'static {
    fn fetch_devices(&self) -> impl Future<Output = Result<Vec<RawDevice>, FetchError>> + Send;

    fn fetch_telemetry(&self, device_id: &str) -> impl Future<Output = Result<Vec<TelemetrySample>, FetchError>> + Send;

    /// Alerts carry no device id on the wire; implementations stamp `device_id`
    fn fetch_alerts(&self, device_id: &str) -> impl Future<Output = Result<Vec<SecurityAlert>, FetchError>> + Send;

    fn fetch_heatmap(&self, device_id: &str) -> impl Future<Output = Result<HeatmapPayload, FetchError>> + Send;
}

/// reqwest-backed client
#[derive(Debug, Clone)]
pub struct HttpMonitorApi {
    client: reqwest::Client,
    base_url: reqwest::Url,
    token: Option<String>,
}

impl HttpMonitorApi {
    pub fn new(config: &ApiConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("gamesec-monitor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| FetchError::Transport {
                url: config.base_url.clone(),
                source,
            })?;

        let base_url = reqwest::Url::parse(&config.base_url)
            .map_err(|err| FetchError::InvalidUrl(format!("{}: {}", config.base_url, err)))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::InvalidUrl(config.base_url.clone()));
        }

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Append path segments to the base; each segment is percent-encoded,
    /// so a device id can never reach another route or device
    fn endpoint(&self, segments: &[&str]) -> String {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.into()
    }

    pub fn devices_url(&self) -> String {
        self.endpoint(&["api", "devices"])
    }

    pub fn telemetry_url(&self, device_id: &str) -> String {
        self.endpoint(&["api", "metrics", "iot_data", device_id])
    }

    pub fn alerts_url(&self, device_id: &str) -> String {
        self.endpoint(&["api", "security", "device_alerts", device_id])
    }

    pub fn heatmap_url(&self, device_id: &str) -> String {
        self.endpoint(&["api", "metrics", "iot_heatmap", device_id])
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, FetchError> {
        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|source| FetchError::Transport {
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        // Body read separately so a truncated body is a transport failure,
        // not a decode failure
        let body = response.bytes().await.map_err(|source| FetchError::Transport {
            url: url.clone(),
            source,
        })?;
        debug!("GET {} -> {} bytes", url, body.len());

        serde_json::from_slice(&body).map_err(|source| FetchError::Decode { url, source })
    }
}

impl MonitorApi for HttpMonitorApi {
    async fn fetch_devices(&self) -> Result<Vec<RawDevice>, FetchError> {
        let response: DevicesResponse = self.get_json(self.devices_url()).await?;
        Ok(response.devices)
    }

    async fn fetch_telemetry(&self, device_id: &str) -> Result<Vec<TelemetrySample>, FetchError> {
        let response: TelemetryResponse = self.get_json(self.telemetry_url(device_id)).await?;
        Ok(response.data)
    }

    async fn fetch_alerts(&self, device_id: &str) -> Result<Vec<SecurityAlert>, FetchError> {
        let response: AlertsResponse = self.get_json(self.alerts_url(device_id)).await?;
        Ok(response
            .alerts
            .into_iter()
            .map(|record| SecurityAlert::from_record(device_id, record))
            .collect())
    }

    async fn fetch_heatmap(&self, device_id: &str) -> Result<HeatmapPayload, FetchError> {
        self.get_json(self.heatmap_url(device_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_strip_trailing_slash() {
        let config = ApiConfig {
            base_url: "http://monitor.local:5000/".into(),
            ..ApiConfig::default()
        };
        let api = HttpMonitorApi::new(&config).unwrap();
        assert_eq!(api.devices_url(), "http://monitor.local:5000/api/devices");
        assert_eq!(api.telemetry_url("mouse-001"), "http://monitor.local:5000/api/metrics/iot_data/mouse-001");
        assert_eq!(
            api.alerts_url("mouse-001"),
            "http://monitor.local:5000/api/security/device_alerts/mouse-001"
        );
        assert_eq!(api.heatmap_url("k1"), "http://monitor.local:5000/api/metrics/iot_heatmap/k1");
    }

    #[test]
    fn test_device_id_is_one_escaped_segment() {
        let config = ApiConfig {
            base_url: "http://monitor.local:5000/proxy".into(),
            ..ApiConfig::default()
        };
        let api = HttpMonitorApi::new(&config).unwrap();
        assert_eq!(
            api.telemetry_url("m1#spare"),
            "http://monitor.local:5000/proxy/api/metrics/iot_data/m1%23spare"
        );
        assert_eq!(
            api.alerts_url("a/b?c"),
            "http://monitor.local:5000/proxy/api/security/device_alerts/a%2Fb%3Fc"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        for base_url in ["not a url", "mailto:ops@example.com"] {
            let config = ApiConfig {
                base_url: base_url.into(),
                ..ApiConfig::default()
            };
            assert!(matches!(HttpMonitorApi::new(&config), Err(FetchError::InvalidUrl(_))));
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let config = ApiConfig {
            base_url: "http://127.0.0.1:1".into(),
            request_timeout_secs: 1,
            ..ApiConfig::default()
        };
        let api = HttpMonitorApi::new(&config).unwrap();
        let err = api.fetch_devices().await.unwrap_err();
        assert!(err.is_transport());
        assert!(!err.is_decode());
    }
}
