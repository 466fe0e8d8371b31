//! CSV export of query and correlation results.

use crate::api::types::{MediaItem, SensorEvent};
use crate::correlate::{event_anchor, is_duration_sensor, Closest};
use crate::timeutil::format_api_instant;
use serde::Serialize;
use std::path::Path;

/// CSV export errors.
#[derive(Debug)]
pub enum ExportError {
    Io(String),
    Csv(String),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Io(e) => write!(f, "CSV IO error: {e}"),
            ExportError::Csv(e) => write!(f, "CSV write error: {e}"),
        }
    }
}

impl std::error::Error for ExportError {}

/// Write serializable rows to a CSV file, headers included.
pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| ExportError::Io(e.to_string()))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| ExportError::Csv(e.to_string()))?;
    }
    writer.flush().map_err(|e| ExportError::Io(e.to_string()))?;
    Ok(())
}

/// One event in an event-query report, with optional cross-reference and
/// clip columns.
#[derive(Debug, Clone, Serialize)]
pub struct EventReportRow {
    pub event_id: String,
    pub value: Option<f64>,
    /// Derived on-period start for duration-style sensors
    pub start_time: Option<String>,
    pub time_collected: String,
    /// Closest cross-reference event instant, when cross-referencing
    pub cross_reference_time: Option<String>,
    /// Signed distance to the cross-reference event
    pub cross_reference_difference: Option<String>,
    /// Authenticated URL of the uploaded clip, when clips were uploaded
    pub clip_url: Option<String>,
}

impl EventReportRow {
    /// Build a row for one event. The cross-reference columns are filled
    /// from the closest match when one was computed.
    pub fn new(event: &SensorEvent, cross: Option<&Closest<'_, SensorEvent>>) -> Self {
        let duration_style = event
            .sensor_name
            .as_deref()
            .or(event.sensor_id.as_deref())
            .map(is_duration_sensor)
            .unwrap_or(false);
        let start_time = if duration_style {
            event
                .on_period_start()
                .ok()
                .map(format_api_instant)
        } else {
            None
        };

        Self {
            event_id: event.id.clone(),
            value: event.value,
            start_time,
            time_collected: event.time_collected.clone(),
            cross_reference_time: cross
                .and_then(|c| event_anchor(c.item).ok())
                .map(format_api_instant),
            cross_reference_difference: cross.map(|c| c.offset_display()),
            clip_url: None,
        }
    }

    pub fn with_clip_url(mut self, url: impl Into<String>) -> Self {
        self.clip_url = Some(url.into());
        self
    }
}

/// One event paired with its closest media item.
#[derive(Debug, Clone, Serialize)]
pub struct MediaReportRow {
    pub sensor_id: Option<String>,
    pub device_id: Option<String>,
    pub event_id: String,
    pub event_time_collected: String,
    pub event_time_on: Option<f64>,
    pub media_id: String,
    pub media_time_collected: String,
    pub media_duration_ms: Option<i64>,
    pub media_url: String,
}

impl MediaReportRow {
    pub fn new(event: &SensorEvent, media: &MediaItem) -> Self {
        Self {
            sensor_id: event.sensor_id.clone(),
            device_id: event.device_id.clone(),
            event_id: event.id.clone(),
            event_time_collected: event.time_collected.clone(),
            event_time_on: event.meta.time_on,
            media_id: media.id.clone(),
            media_time_collected: media.time_collected.clone(),
            media_duration_ms: media.duration_ms,
            media_url: media.url.clone(),
        }
    }
}
