//! Timestamp parsing and time-range resolution.
//!
//! All timestamp strings in the system (event fields, segment file names,
//! CLI arguments) go through this module, so the rest of the crate operates
//! on typed instants and durations only.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

/// Wire format the Data API expects for query time bounds.
pub const API_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Format of the timestamp embedded in raw video segment file names,
/// e.g. `2021-11-27-14-05-00.000`.
const SEGMENT_TIME_FORMAT: &str = "%Y-%m-%d-%H-%M-%S%.3f";

/// Accepted input formats for timestamps without an explicit offset.
/// Naive inputs are interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d",
];

/// A timestamp string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeParseError {
    /// The string that failed to parse
    pub input: String,
}

impl TimeParseError {
    fn new(input: &str) -> Self {
        Self {
            input: input.to_string(),
        }
    }
}

impl std::fmt::Display for TimeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unparsable timestamp '{}'", self.input)
    }
}

impl std::error::Error for TimeParseError {}

/// Parse an event or CLI timestamp into a UTC instant.
///
/// Accepts RFC 3339 (with offset) and the common offset-less ISO variants;
/// offset-less inputs are taken as UTC.
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
        // Date-only inputs have no time component to parse
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Ok(naive.and_utc());
            }
        }
    }
    Err(TimeParseError::new(s))
}

/// Parse the start instant embedded in a segment file name's timestamp
/// portion (the part between the `DataAcqVideo_` prefix and `.mp4`).
pub fn parse_segment_timestamp(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    NaiveDateTime::parse_from_str(s, SEGMENT_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| TimeParseError::new(s))
}

/// Format an instant the way the Data API expects it in query bodies.
pub fn format_api_instant(t: DateTime<Utc>) -> String {
    t.format(API_TIME_FORMAT).to_string()
}

/// A resolved UTC query range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Time-range selection as given on the command line, before resolution.
#[derive(Debug, Clone, Default)]
pub struct TimeRangeSpec {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub last_minutes: Option<i64>,
    pub last_days: Option<i64>,
    pub last_hours: Option<i64>,
}

/// Errors from resolving a time-range specification.
#[derive(Debug)]
pub enum TimeRangeError {
    /// A bound failed to parse
    Parse(TimeParseError),
    /// Neither an explicit start nor a relative window was given
    Unbounded,
}

impl std::fmt::Display for TimeRangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeRangeError::Parse(e) => write!(f, "{e}"),
            TimeRangeError::Unbounded => {
                write!(f, "no time range specified: pass --start-time or one of --last-minutes/--last-hours/--last-days")
            }
        }
    }
}

impl std::error::Error for TimeRangeError {}

impl From<TimeParseError> for TimeRangeError {
    fn from(e: TimeParseError) -> Self {
        TimeRangeError::Parse(e)
    }
}

impl TimeRangeSpec {
    /// Resolve the specification against a reference "now".
    ///
    /// The end bound defaults to `now`. A relative window (`last_*`) takes
    /// precedence over an explicit start and is anchored at the end bound;
    /// when several are given the smallest unit wins.
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<TimeRange, TimeRangeError> {
        let end = match &self.end_time {
            Some(s) => parse_instant(s)?,
            None => now,
        };

        let relative = self
            .last_minutes
            .map(Duration::minutes)
            .or(self.last_hours.map(Duration::hours))
            .or(self.last_days.map(Duration::days));

        let start = match (relative, &self.start_time) {
            (Some(window), _) => end - window,
            (None, Some(s)) => parse_instant(s)?,
            (None, None) => return Err(TimeRangeError::Unbounded),
        };

        Ok(TimeRange { start, end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_rfc3339() {
        let t = parse_instant("2021-11-27T14:05:00.000Z").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2021, 11, 27, 14, 5, 0).unwrap());

        let offset = parse_instant("2021-11-27T07:05:00-07:00").unwrap();
        assert_eq!(offset, t);
    }

    #[test]
    fn test_parse_naive_as_utc() {
        let t = parse_instant("2021-11-27T14:05:00").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2021, 11, 27, 14, 5, 0).unwrap());

        let date_only = parse_instant("2021-11-27").unwrap();
        assert_eq!(
            date_only,
            Utc.with_ymd_and_hms(2021, 11, 27, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_garbage_fails() {
        let err = parse_instant("not-a-time").unwrap_err();
        assert_eq!(err.input, "not-a-time");
    }

    #[test]
    fn test_parse_segment_timestamp() {
        let t = parse_segment_timestamp("2021-11-27-14-05-00.000").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2021, 11, 27, 14, 5, 0).unwrap());

        assert!(parse_segment_timestamp("2021-11-27").is_err());
    }

    #[test]
    fn test_format_api_instant() {
        let t = Utc.with_ymd_and_hms(2021, 11, 27, 14, 5, 0).unwrap();
        assert_eq!(format_api_instant(t), "2021-11-27T14:05:00.000Z");
    }

    #[test]
    fn test_resolve_relative_window() {
        let now = Utc.with_ymd_and_hms(2022, 1, 10, 12, 0, 0).unwrap();
        let spec = TimeRangeSpec {
            last_hours: Some(5),
            ..Default::default()
        };
        let range = spec.resolve(now).unwrap();
        assert_eq!(range.end, now);
        assert_eq!(range.start, now - Duration::hours(5));
    }

    #[test]
    fn test_resolve_relative_anchored_at_explicit_end() {
        let now = Utc.with_ymd_and_hms(2022, 1, 10, 12, 0, 0).unwrap();
        let spec = TimeRangeSpec {
            end_time: Some("2022-01-01T00:00:00Z".to_string()),
            last_days: Some(3),
            ..Default::default()
        };
        let range = spec.resolve(now).unwrap();
        let end = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(range.end, end);
        assert_eq!(range.start, end - Duration::days(3));
    }

    #[test]
    fn test_resolve_unbounded_is_error() {
        let spec = TimeRangeSpec::default();
        assert!(matches!(
            spec.resolve(Utc::now()),
            Err(TimeRangeError::Unbounded)
        ));
    }
}
