//! HTTP client for the Data API.
//!
//! Thin typed wrapper over the documented endpoints: stream queries,
//! aggregate queries, media queries, sensor listings, and device status.
//! Authentication is an `X-API-Key` header on every request.

use super::types::{
    AggregateWindow, DeviceStatus, DeviceStatusResponse, LatestSensorEventQuery,
    LatestStatusByWorkspaceQuery, MediaItem, MediaQuery, SensorEvent, SensorInfo,
    SensorsByDeviceQuery, SensorsByWorkspaceQuery, StreamAggregateQuery, StreamQuery,
};
use crate::timeutil::format_api_instant;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Default API base when none is configured.
pub const DEFAULT_API_BASE: &str = "https://data-api.boulderai.com/";

/// Data API client error types.
#[derive(Debug)]
pub enum ApiError {
    /// Network/HTTP error
    Network(String),
    /// Server returned an error response
    Server { status: u16, message: String },
    /// Response body could not be decoded
    Decode(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Network(msg) => write!(f, "Data API network error: {msg}"),
            ApiError::Server { status, message } => {
                write!(f, "Data API server error ({status}): {message}")
            }
            ApiError::Decode(msg) => write!(f, "Data API decode error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Asynchronous Data API client.
pub struct DataApiClient {
    api_base: String,
    api_key: String,
    client: reqwest::Client,
}

impl DataApiClient {
    /// Create a client for the given base URL and API key.
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        let mut api_base = api_base.into();
        if !api_base.ends_with('/') {
            api_base.push('/');
        }

        Self {
            api_base,
            api_key: api_key.into(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        debug!(path, "Data API POST");
        let response = self
            .client
            .post(self.url(path))
            .header("X-API-Key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Self::decode(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        debug!(path, "Data API GET");
        let response = self
            .client
            .get(self.url(path))
            .header("X-API-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiError::Server {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Query flattened stream data.
    pub async fn query_stream_flat(
        &self,
        query: &StreamQuery,
    ) -> Result<Vec<SensorEvent>, ApiError> {
        self.post_json("data/stream/query", query).await
    }

    /// Query aggregated stream data. The row shape depends on the requested
    /// functions, so rows are returned as raw JSON values.
    pub async fn query_stream_aggregate(
        &self,
        query: &StreamAggregateQuery,
    ) -> Result<Vec<serde_json::Value>, ApiError> {
        self.post_json("data/stream/aggregate/query", query).await
    }

    /// Query aggregated stream data with a known windowed row shape, as
    /// produced by single-function queries (e.g. a COUNT sweep).
    pub async fn query_stream_aggregate_windows(
        &self,
        query: &StreamAggregateQuery,
    ) -> Result<Vec<AggregateWindow>, ApiError> {
        self.post_json("data/stream/aggregate/query", query).await
    }

    /// Query media items recorded for a stream.
    pub async fn query_media(&self, query: &MediaQuery) -> Result<Vec<MediaItem>, ApiError> {
        self.post_json("media/query", query).await
    }

    /// Get the most recent event for one sensor on a stream.
    pub async fn latest_stream_event(
        &self,
        query: &LatestSensorEventQuery,
    ) -> Result<SensorEvent, ApiError> {
        self.get_json(&format!(
            "data/stream/{}/latest?sensorId={}",
            query.stream_id, query.sensor_id
        ))
        .await
    }

    /// List sensors active in a workspace over a time range.
    pub async fn sensors_by_workspace(
        &self,
        query: &SensorsByWorkspaceQuery,
    ) -> Result<Vec<SensorInfo>, ApiError> {
        self.get_json(&format!(
            "workspace/{}/stream/sensor?startTime={}&endTime={}",
            query.workspace_id,
            format_api_instant(query.start_time),
            format_api_instant(query.end_time)
        ))
        .await
    }

    /// List sensors active on a device over a time range.
    pub async fn sensors_by_device(
        &self,
        query: &SensorsByDeviceQuery,
    ) -> Result<Vec<SensorInfo>, ApiError> {
        self.get_json(&format!(
            "device/{}/sensors?startTime={}&endTime={}",
            query.device_id,
            format_api_instant(query.start_time),
            format_api_instant(query.end_time)
        ))
        .await
    }

    /// Get the latest status report for every device in a workspace.
    pub async fn status_by_workspace(
        &self,
        query: &LatestStatusByWorkspaceQuery,
    ) -> Result<Vec<DeviceStatus>, ApiError> {
        let response: DeviceStatusResponse = self
            .get_json(&format!("workspace/{}/devices/status", query.workspace_id))
            .await?;
        Ok(response.data)
    }
}

/// Blocking Data API client for use in synchronous contexts (the CLI).
pub struct BlockingDataApiClient {
    inner: DataApiClient,
    runtime: tokio::runtime::Runtime,
}

impl BlockingDataApiClient {
    /// Create a blocking client for the given base URL and API key.
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>) -> Result<Self, ApiError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to create runtime: {e}")))?;

        Ok(Self {
            inner: DataApiClient::new(api_key, api_base),
            runtime,
        })
    }

    pub fn query_stream_flat(&self, query: &StreamQuery) -> Result<Vec<SensorEvent>, ApiError> {
        self.runtime.block_on(self.inner.query_stream_flat(query))
    }

    pub fn query_stream_aggregate(
        &self,
        query: &StreamAggregateQuery,
    ) -> Result<Vec<serde_json::Value>, ApiError> {
        self.runtime
            .block_on(self.inner.query_stream_aggregate(query))
    }

    pub fn query_stream_aggregate_windows(
        &self,
        query: &StreamAggregateQuery,
    ) -> Result<Vec<AggregateWindow>, ApiError> {
        self.runtime
            .block_on(self.inner.query_stream_aggregate_windows(query))
    }

    pub fn query_media(&self, query: &MediaQuery) -> Result<Vec<MediaItem>, ApiError> {
        self.runtime.block_on(self.inner.query_media(query))
    }

    pub fn latest_stream_event(
        &self,
        query: &LatestSensorEventQuery,
    ) -> Result<SensorEvent, ApiError> {
        self.runtime.block_on(self.inner.latest_stream_event(query))
    }

    pub fn sensors_by_workspace(
        &self,
        query: &SensorsByWorkspaceQuery,
    ) -> Result<Vec<SensorInfo>, ApiError> {
        self.runtime
            .block_on(self.inner.sensors_by_workspace(query))
    }

    pub fn sensors_by_device(
        &self,
        query: &SensorsByDeviceQuery,
    ) -> Result<Vec<SensorInfo>, ApiError> {
        self.runtime.block_on(self.inner.sensors_by_device(query))
    }

    pub fn status_by_workspace(
        &self,
        query: &LatestStatusByWorkspaceQuery,
    ) -> Result<Vec<DeviceStatus>, ApiError> {
        self.runtime
            .block_on(self.inner.status_by_workspace(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = DataApiClient::new("key", "https://data-api.example.com");
        assert_eq!(
            client.url("data/stream/query"),
            "https://data-api.example.com/data/stream/query"
        );

        let already = DataApiClient::new("key", "https://data-api.example.com/");
        assert_eq!(
            already.url("media/query"),
            "https://data-api.example.com/media/query"
        );
    }

    #[test]
    fn test_status_query_builds_endpoint_path() {
        let client = DataApiClient::new("key", "https://data-api.example.com");
        let query = LatestStatusByWorkspaceQuery {
            workspace_id: "c9a2e1".to_string(),
        };
        assert_eq!(
            client.url(&format!("workspace/{}/devices/status", query.workspace_id)),
            "https://data-api.example.com/workspace/c9a2e1/devices/status"
        );
    }
}
