//! Request and response types for the Data API.
//!
//! Query bodies are serialized camelCase with absent optional fields
//! omitted entirely, matching what the API expects. Response timestamps
//! stay as raw strings on the wire types; they are turned into typed
//! instants through [`crate::timeutil`] so that one malformed record
//! cannot fail a whole batch at deserialization time.

use crate::timeutil::{self, TimeParseError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How in-progress events are treated by a stream query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InProgressEvents {
    None,
    Include,
    Only,
}

/// Flat stream data query (`POST data/stream/query`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    pub sensors: Vec<String>,
    #[serde(with = "api_time")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "api_time")]
    pub end_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with_meta: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_progress_events: Option<InProgressEvents>,
}

impl StreamQuery {
    /// Query a stream by its id over a time range.
    pub fn new(
        stream_id: impl Into<String>,
        sensors: Vec<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            stream_id: Some(stream_id.into()),
            device_id: None,
            sensors,
            start_time,
            end_time,
            limit: None,
            order: None,
            with_meta: None,
            in_progress_events: None,
        }
    }

    /// Query by device id instead of stream id (DNNCam-style devices).
    pub fn for_device(
        device_id: impl Into<String>,
        sensors: Vec<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            device_id: Some(device_id.into()),
            stream_id: None,
            sensors,
            start_time,
            end_time,
            limit: None,
            order: None,
            with_meta: None,
            in_progress_events: None,
        }
    }

    pub fn with_in_progress(mut self, mode: InProgressEvents) -> Self {
        self.in_progress_events = Some(mode);
        self
    }
}

/// Aggregated stream data query (`POST data/stream/aggregate/query`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamAggregateQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    pub sensors: Vec<String>,
    #[serde(with = "api_time")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "api_time")]
    pub end_time: DateTime<Utc>,
    /// Aggregation window, e.g. `1h`
    pub interval: String,
    /// Aggregation functions, e.g. `sum`, `avg`
    pub functions: Vec<String>,
    pub fill_empty_windows: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
}

/// One windowed row from an aggregate query with a known result shape
/// (single-function queries such as a COUNT sweep).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateWindow {
    pub window_start: String,
    pub window_end: String,
    pub sensor_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(default)]
    pub values: Vec<AggregateValue>,
}

/// One aggregated value inside a window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateValue {
    pub value: f64,
}

impl AggregateWindow {
    /// Column label for this window's sensor, including the direction when
    /// the sensor reports one.
    pub fn label(&self) -> String {
        match &self.direction {
            Some(direction) => format!("{} {direction}", self.sensor_name),
            None => self.sensor_name.clone(),
        }
    }

    /// The aggregated value truncated to a count; windows without values
    /// count zero.
    pub fn count(&self) -> i64 {
        self.values.first().map(|v| v.value as i64).unwrap_or(0)
    }
}

/// Media data query (`POST media/query`). Media type is fixed to video.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaQuery {
    pub stream_id: String,
    #[serde(with = "api_time")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "api_time")]
    pub end_time: DateTime<Utc>,
    pub media_type: String,
}

impl MediaQuery {
    pub fn new(
        stream_id: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            stream_id: stream_id.into(),
            start_time,
            end_time,
            media_type: "VIDEO".to_string(),
        }
    }
}

/// Workspace sensor listing query (`GET workspace/{id}/stream/sensor`).
#[derive(Debug, Clone)]
pub struct SensorsByWorkspaceQuery {
    pub workspace_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Device sensor listing query (`GET device/{id}/sensors`).
#[derive(Debug, Clone)]
pub struct SensorsByDeviceQuery {
    pub device_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Latest event lookup (`GET data/stream/{id}/latest`).
#[derive(Debug, Clone)]
pub struct LatestSensorEventQuery {
    pub stream_id: String,
    pub sensor_id: String,
}

/// Latest device status listing (`GET workspace/{id}/devices/status`).
#[derive(Debug, Clone)]
pub struct LatestStatusByWorkspaceQuery {
    pub workspace_id: String,
}

/// A field of an event that could not be interpreted. Carries the event id
/// so batch drivers can report which record was skipped.
#[derive(Debug, Clone)]
pub enum EventFieldError {
    /// `timeCollected` (or a derived time) failed to parse
    BadTimestamp { event_id: String, source: TimeParseError },
    /// The event has no `value`, required for on-period start derivation
    MissingValue { event_id: String },
}

impl std::fmt::Display for EventFieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventFieldError::BadTimestamp { event_id, source } => {
                write!(f, "event {event_id}: {source}")
            }
            EventFieldError::MissingValue { event_id } => {
                write!(f, "event {event_id} has no value content")
            }
        }
    }
}

impl std::error::Error for EventFieldError {}

/// Known metadata attached to an event. Sensors do not emit every key,
/// and unknown keys are preserved as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMeta {
    /// How long the triggering object was present, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_on: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_objects_in_region: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<MetaObject>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The tracked object referenced by an event's metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaObject {
    pub unique_id: String,
}

/// A timestamped record emitted by a sensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorEvent {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    /// Collection instant as sent by the API; parse via [`Self::collected_at`]
    pub time_collected: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default)]
    pub meta: EventMeta,
}

impl SensorEvent {
    /// The instant this event was collected.
    pub fn collected_at(&self) -> Result<DateTime<Utc>, EventFieldError> {
        timeutil::parse_instant(&self.time_collected).map_err(|source| {
            EventFieldError::BadTimestamp {
                event_id: self.id.clone(),
                source,
            }
        })
    }

    /// Start of the on-period for presence/collision style sensors, whose
    /// `value` is the on-duration in seconds ending at `timeCollected`.
    pub fn on_period_start(&self) -> Result<DateTime<Utc>, EventFieldError> {
        let value = self.value.ok_or(EventFieldError::MissingValue {
            event_id: self.id.clone(),
        })?;
        let collected = self.collected_at()?;
        Ok(collected - chrono::Duration::milliseconds((value * 1000.0) as i64))
    }

    /// Object count in the monitored region; absent key counts as zero.
    pub fn objects_in_region(&self) -> i64 {
        self.meta.num_objects_in_region.unwrap_or(0)
    }
}

/// A media item (recorded video) returned by a media query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    pub time_collected: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    pub url: String,
}

impl MediaItem {
    pub fn collected_at(&self) -> Result<DateTime<Utc>, EventFieldError> {
        timeutil::parse_instant(&self.time_collected).map_err(|source| {
            EventFieldError::BadTimestamp {
                event_id: self.id.clone(),
                source,
            }
        })
    }
}

/// One sensor known to a workspace or device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    pub sensor_name: String,
}

/// Latest status report for one device.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub device_id: String,
    #[serde(default)]
    pub services: Vec<ServiceStatus>,
    pub main_memory_storage: StorageStatus,
}

/// One service running (or not) on a device.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub name: String,
    pub status: ServiceState,
}

/// Nested state object inside a service status.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceState {
    pub status: String,
}

/// Main storage usage for a device.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStatus {
    pub percentage_use: f64,
}

/// Envelope around the device status listing.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceStatusResponse {
    pub data: Vec<DeviceStatus>,
}

/// Serde support for query time bounds in the API wire format.
mod api_time {
    use chrono::{DateTime, Utc};
    use serde::Serializer;

    pub fn serialize<S>(t: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&crate::timeutil::format_api_instant(*t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn range() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2021, 11, 27, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2021, 11, 28, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_stream_query_omits_absent_optionals() {
        let (start, end) = range();
        let query = StreamQuery::new("BAI_0000134", vec!["0__PRESENCE_PERSON_1".into()], start, end);
        let json = serde_json::to_value(&query).unwrap();

        assert_eq!(json["streamId"], "BAI_0000134");
        assert_eq!(json["startTime"], "2021-11-27T00:00:00.000Z");
        let object = json.as_object().unwrap();
        assert!(!object.contains_key("deviceId"));
        assert!(!object.contains_key("limit"));
        assert!(!object.contains_key("inProgressEvents"));
    }

    #[test]
    fn test_in_progress_serializes_upper_case() {
        let (start, end) = range();
        let query = StreamQuery::new("BAI_0000729", vec![], start, end)
            .with_in_progress(InProgressEvents::Only);
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json["inProgressEvents"], "ONLY");
    }

    #[test]
    fn test_media_query_is_video() {
        let (start, end) = range();
        let json = serde_json::to_value(MediaQuery::new("BAI_0000134", start, end)).unwrap();
        assert_eq!(json["mediaType"], "VIDEO");
    }

    #[test]
    fn test_event_deserializes_with_unknown_meta_keys() {
        let event: SensorEvent = serde_json::from_str(
            r#"{
                "id": "evt-1",
                "sensorId": "0__PRESENCE_PERSON_1",
                "deviceId": "BAI_0000134",
                "timeCollected": "2021-11-27T14:05:03.000Z",
                "value": 2.5,
                "meta": {"timeOn": 2.5, "zoneName": "entrance"}
            }"#,
        )
        .unwrap();

        assert_eq!(event.meta.time_on, Some(2.5));
        assert_eq!(event.meta.extra["zoneName"], "entrance");
        assert_eq!(event.objects_in_region(), 0);
    }

    #[test]
    fn test_collected_at_reports_event_id() {
        let event: SensorEvent = serde_json::from_str(
            r#"{"id": "evt-2", "timeCollected": "banana"}"#,
        )
        .unwrap();
        let err = event.collected_at().unwrap_err();
        assert!(matches!(err, EventFieldError::BadTimestamp { ref event_id, .. } if event_id == "evt-2"));
    }

    #[test]
    fn test_aggregate_window_label_and_count() {
        let window: AggregateWindow = serde_json::from_str(
            r#"{
                "windowStart": "2021-11-27T14:00:00.000Z",
                "windowEnd": "2021-11-27T14:30:00.000Z",
                "sensorName": "LINE_CROSSING",
                "direction": "IN",
                "values": [{"value": 7.0}]
            }"#,
        )
        .unwrap();
        assert_eq!(window.label(), "LINE_CROSSING IN");
        assert_eq!(window.count(), 7);

        let bare: AggregateWindow = serde_json::from_str(
            r#"{
                "windowStart": "2021-11-27T14:00:00.000Z",
                "windowEnd": "2021-11-27T14:30:00.000Z",
                "sensorName": "COLLISION_1"
            }"#,
        )
        .unwrap();
        assert_eq!(bare.label(), "COLLISION_1");
        assert_eq!(bare.count(), 0);
    }

    #[test]
    fn test_on_period_start() {
        let event: SensorEvent = serde_json::from_str(
            r#"{"id": "evt-3", "timeCollected": "2021-11-27T14:05:10.000Z", "value": 10.0}"#,
        )
        .unwrap();
        let start = event.on_period_start().unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2021, 11, 27, 14, 5, 0).unwrap());

        let no_value: SensorEvent =
            serde_json::from_str(r#"{"id": "evt-4", "timeCollected": "2021-11-27T14:05:10.000Z"}"#)
                .unwrap();
        assert!(matches!(
            no_value.on_period_start(),
            Err(EventFieldError::MissingValue { .. })
        ));
    }
}
