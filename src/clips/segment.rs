//! Raw video segment metadata.
//!
//! Devices upload fixed-length raw video files into daily folders on the
//! object store, named `DataAcqVideo_<start timestamp>.mp4`. The embedded
//! start instant is the only timing information a segment carries.

use crate::timeutil::{self, TimeParseError};
use chrono::{DateTime, NaiveDate, Utc};

const SEGMENT_PREFIX: &str = "DataAcqVideo_";
const SEGMENT_SUFFIX: &str = ".mp4";

/// One raw video file covering a device's capture window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSegment {
    pub device_id: String,
    /// Daily folder the segment lives in (named after the capture date)
    pub day: NaiveDate,
    /// Full object path within the store's bucket
    pub object_path: String,
    /// Bare file name, e.g. `DataAcqVideo_2021-11-27-14-05-00.000.mp4`
    pub file_name: String,
    /// Capture start instant parsed from the file name
    pub started_at: DateTime<Utc>,
}

impl VideoSegment {
    /// Interpret one object listing entry as a segment.
    ///
    /// Returns `None` for objects that are not raw video segments (other
    /// files share the daily folders and are skipped silently), and
    /// `Some(Err(_))` for a segment-shaped name whose timestamp does not
    /// parse, so callers can report it and continue.
    pub fn from_listing(
        device_id: &str,
        object_path: &str,
    ) -> Option<Result<Self, TimeParseError>> {
        let file_name = object_path.rsplit('/').next().unwrap_or(object_path);
        let timestamp = file_name
            .strip_prefix(SEGMENT_PREFIX)?
            .strip_suffix(SEGMENT_SUFFIX)?;

        Some(
            timeutil::parse_segment_timestamp(timestamp).map(|started_at| Self {
                device_id: device_id.to_string(),
                day: started_at.date_naive(),
                object_path: object_path.to_string(),
                file_name: file_name.to_string(),
                started_at,
            }),
        )
    }
}
