//! Workspace-wide aggregate sweeps.
//!
//! A sweep runs one COUNT aggregate per device in a workspace and pivots
//! the windowed results into a per-device table: one row per window, one
//! column per sensor label. Tables are written to CSV with window bounds
//! rendered in the local timezone.

use crate::api::types::{AggregateWindow, SensorInfo};
use crate::export::ExportError;
use crate::timeutil;
use chrono::Local;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::warn;

/// Group a workspace sensor listing into sensors per device. Listing
/// entries without a device id are skipped.
pub fn device_sensor_map(sensors: &[SensorInfo]) -> BTreeMap<String, BTreeSet<String>> {
    let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for sensor in sensors {
        if let Some(device_id) = &sensor.device_id {
            map.entry(device_id.clone())
                .or_default()
                .insert(sensor.sensor_name.clone());
        }
    }
    map
}

/// Pivoted aggregate windows for one device.
#[derive(Debug, Clone, Default)]
pub struct AggregateReport {
    /// Sorted sensor column labels
    pub labels: Vec<String>,
    /// Rows ordered by window start
    pub rows: Vec<AggregateReportRow>,
}

/// One window row of an [`AggregateReport`].
#[derive(Debug, Clone)]
pub struct AggregateReportRow {
    pub window_start: String,
    pub window_end: String,
    /// Counts in label order; a window missing a label counts zero
    pub counts: Vec<i64>,
}

/// Pivot windowed aggregate results into a report table.
pub fn build_report(windows: &[AggregateWindow]) -> AggregateReport {
    let labels: Vec<String> = windows
        .iter()
        .map(AggregateWindow::label)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut grouped: BTreeMap<&str, (&str, BTreeMap<String, i64>)> = BTreeMap::new();
    for window in windows {
        let entry = grouped
            .entry(window.window_start.as_str())
            .or_insert_with(|| (window.window_end.as_str(), BTreeMap::new()));
        entry.1.insert(window.label(), window.count());
    }

    let rows = grouped
        .into_iter()
        .map(|(start, (end, counts))| AggregateReportRow {
            window_start: start.to_string(),
            window_end: end.to_string(),
            counts: labels
                .iter()
                .map(|label| counts.get(label).copied().unwrap_or(0))
                .collect(),
        })
        .collect();

    AggregateReport { labels, rows }
}

/// Render an API window bound in local time. Unparsable bounds are
/// reported and passed through as-is.
pub fn local_timestamp(raw: &str) -> String {
    match timeutil::parse_instant(raw) {
        Ok(instant) => instant
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        Err(e) => {
            warn!("keeping raw window bound: {e}");
            raw.to_string()
        }
    }
}

/// Write a report to CSV, window bounds in local time.
pub fn write_report_csv(path: &Path, report: &AggregateReport) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| ExportError::Io(e.to_string()))?;

    let mut header = vec![
        "Window Start (local)".to_string(),
        "Window End (local)".to_string(),
    ];
    header.extend(report.labels.iter().cloned());
    writer
        .write_record(&header)
        .map_err(|e| ExportError::Csv(e.to_string()))?;

    for row in &report.rows {
        let mut record = vec![
            local_timestamp(&row.window_start),
            local_timestamp(&row.window_end),
        ];
        record.extend(row.counts.iter().map(i64::to_string));
        writer
            .write_record(&record)
            .map_err(|e| ExportError::Csv(e.to_string()))?;
    }
    writer.flush().map_err(|e| ExportError::Io(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::AggregateValue;

    fn sensor(device_id: Option<&str>, name: &str) -> SensorInfo {
        SensorInfo {
            device_id: device_id.map(str::to_string),
            stream_id: None,
            sensor_name: name.to_string(),
        }
    }

    fn window(
        start: &str,
        end: &str,
        sensor: &str,
        direction: Option<&str>,
        value: f64,
    ) -> AggregateWindow {
        AggregateWindow {
            window_start: start.to_string(),
            window_end: end.to_string(),
            sensor_name: sensor.to_string(),
            direction: direction.map(str::to_string),
            values: vec![AggregateValue { value }],
        }
    }

    #[test]
    fn test_device_sensor_map_groups_and_skips_unattached() {
        let sensors = vec![
            sensor(Some("BAI_0000002"), "COLLISION_1"),
            sensor(Some("BAI_0000001"), "LINE_CROSSING"),
            sensor(Some("BAI_0000001"), "COLLISION_1"),
            sensor(Some("BAI_0000001"), "COLLISION_1"),
            sensor(None, "ORPHANED"),
        ];
        let map = device_sensor_map(&sensors);

        assert_eq!(map.len(), 2);
        assert_eq!(
            map["BAI_0000001"],
            ["COLLISION_1".to_string(), "LINE_CROSSING".to_string()].into()
        );
        assert_eq!(map["BAI_0000002"], ["COLLISION_1".to_string()].into());
    }

    #[test]
    fn test_build_report_pivots_by_window() {
        let windows = vec![
            window(
                "2021-11-27T14:30:00.000Z",
                "2021-11-27T15:00:00.000Z",
                "LINE_CROSSING",
                Some("IN"),
                3.0,
            ),
            window(
                "2021-11-27T14:00:00.000Z",
                "2021-11-27T14:30:00.000Z",
                "LINE_CROSSING",
                Some("IN"),
                7.0,
            ),
            window(
                "2021-11-27T14:00:00.000Z",
                "2021-11-27T14:30:00.000Z",
                "LINE_CROSSING",
                Some("OUT"),
                2.0,
            ),
        ];
        let report = build_report(&windows);

        assert_eq!(
            report.labels,
            vec!["LINE_CROSSING IN", "LINE_CROSSING OUT"]
        );
        assert_eq!(report.rows.len(), 2);
        // Rows ordered by window start
        assert_eq!(report.rows[0].window_start, "2021-11-27T14:00:00.000Z");
        assert_eq!(report.rows[0].window_end, "2021-11-27T14:30:00.000Z");
        assert_eq!(report.rows[0].counts, vec![7, 2]);
        // The later window never saw the OUT sensor
        assert_eq!(report.rows[1].counts, vec![3, 0]);
    }

    #[test]
    fn test_build_report_empty_is_empty() {
        let report = build_report(&[]);
        assert!(report.labels.is_empty());
        assert!(report.rows.is_empty());
    }

    #[test]
    fn test_local_timestamp_keeps_unparsable_input() {
        assert_eq!(local_timestamp("garbage"), "garbage");
    }

    #[test]
    fn test_local_timestamp_renders_offset_free_instant() {
        let rendered = local_timestamp("2021-11-27T14:00:00.000Z");
        assert_eq!(rendered.len(), 19);
        assert!(!rendered.contains('T'));
        assert!(!rendered.contains('Z'));
    }

    #[test]
    fn test_write_report_csv_has_label_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BAI_0000001-sensors.csv");
        let windows = vec![window(
            "2021-11-27T14:00:00.000Z",
            "2021-11-27T14:30:00.000Z",
            "LINE_CROSSING",
            Some("IN"),
            7.0,
        )];
        write_report_csv(&path, &build_report(&windows)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Window Start (local),Window End (local),LINE_CROSSING IN"
        );
        assert!(lines.next().unwrap().ends_with(",7"));
        assert!(lines.next().is_none());
    }
}
