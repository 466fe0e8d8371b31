//! Event-clip temporal correlation.
//!
//! Pure computations over already-fetched, in-memory lists: matching an
//! event instant to the raw video segment whose capture window covers it,
//! deriving a padded trim window clamped to segment bounds, and finding the
//! candidate event or media item closest in time to a target instant.
//! "No match" is a normal absent result everywhere, never an error.

use crate::api::types::SensorEvent;
use chrono::{DateTime, Duration, Utc};
use tracing::warn;

/// Nominal length of one raw video segment, in minutes.
pub const SEGMENT_LENGTH_MINUTES: i64 = 5;

/// Default padding before the event when trimming a clip, in seconds.
pub const SECONDS_BEFORE_EVENT: i64 = 10;

/// Default padding after the event when trimming a clip, in seconds.
pub const SECONDS_AFTER_EVENT: i64 = 5;

/// Nominal segment duration as a [`Duration`].
pub fn nominal_segment_duration() -> Duration {
    Duration::minutes(SEGMENT_LENGTH_MINUTES)
}

/// Find the segment whose capture window plausibly contains the event.
///
/// A segment matches iff its start instant is strictly later than
/// `event_instant - nominal_duration` and strictly earlier than
/// `event_instant`. Segment ends are not tracked on the store, so this is
/// the adopted containment rule. First match in iteration order wins;
/// callers should pass segments already filtered to one device and day.
pub fn locate_segment<'a, T, F>(
    event_instant: DateTime<Utc>,
    nominal_duration: Duration,
    segments: &'a [T],
    start_of: F,
) -> Option<&'a T>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    let after = event_instant - nominal_duration;
    segments.iter().find(|segment| {
        let start = start_of(segment);
        start > after && start < event_instant
    })
}

/// A sub-range of a segment to extract, expressed as offsets from the
/// segment's start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimWindow {
    pub start: Duration,
    pub end: Duration,
}

impl TrimWindow {
    /// Window start as `HH:MM:SS.mmm`, the form trim tools accept.
    pub fn start_timestamp(&self) -> String {
        format_offset(self.start)
    }

    /// Window end as `HH:MM:SS.mmm`.
    pub fn end_timestamp(&self) -> String {
        format_offset(self.end)
    }
}

fn format_offset(d: Duration) -> String {
    let total_ms = d.num_milliseconds().max(0);
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms / 60_000) % 60;
    let seconds = (total_ms / 1000) % 60;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

/// Compute the padded trim window for an event within a segment.
///
/// Offsets are clamped to `[0, nominal_duration]`; clamping is the
/// documented recovery when the padding would cross a segment boundary,
/// not a fault. No frame alignment is attempted.
pub fn compute_trim_window(
    event_instant: DateTime<Utc>,
    segment_start: DateTime<Utc>,
    nominal_duration: Duration,
    pad_before: Duration,
    pad_after: Duration,
) -> TrimWindow {
    let relative = event_instant - segment_start;

    let start = if pad_before > relative {
        Duration::zero()
    } else {
        relative - pad_before
    };

    let end = if relative + pad_after > nominal_duration {
        nominal_duration
    } else {
        relative + pad_after
    };

    TrimWindow { start, end }
}

/// A candidate selected by [`closest_event`], with the signed distance to
/// the target (negative means the candidate precedes the target).
#[derive(Debug, Clone, Copy)]
pub struct Closest<'a, T> {
    pub item: &'a T,
    pub offset: Duration,
}

impl<T> Closest<'_, T> {
    /// Signed offset rendered for display, e.g. `-0:00:01`.
    pub fn offset_display(&self) -> String {
        format_signed_duration(self.offset)
    }
}

/// Render a signed duration as `[-]H:MM:SS[.mmm]`.
pub fn format_signed_duration(d: Duration) -> String {
    let sign = if d < Duration::zero() { "-" } else { "" };
    let total_ms = d.num_milliseconds().abs();
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms / 60_000) % 60;
    let seconds = (total_ms / 1000) % 60;
    let millis = total_ms % 1000;
    if millis == 0 {
        format!("{sign}{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{sign}{hours}:{minutes:02}:{seconds:02}.{millis:03}")
    }
}

/// Find the candidate whose instant is closest to the target.
///
/// Candidates for which `instant_of` returns `None` (e.g. a record whose
/// timestamp failed to parse and was already reported) are skipped. The
/// first candidate at the minimum absolute distance wins; the sign of
/// `candidate - target` is the authoritative direction.
pub fn closest_event<'a, T, F>(
    target: DateTime<Utc>,
    candidates: &'a [T],
    instant_of: F,
) -> Option<Closest<'a, T>>
where
    F: Fn(&T) -> Option<DateTime<Utc>>,
{
    let mut best: Option<Closest<'a, T>> = None;
    for candidate in candidates {
        let Some(instant) = instant_of(candidate) else {
            continue;
        };
        let offset = instant - target;
        let distance = offset.abs();
        match &best {
            Some(current) if distance >= current.offset.abs() => {}
            _ => {
                best = Some(Closest {
                    item: candidate,
                    offset,
                })
            }
        }
    }
    best
}

/// Whether a sensor reports on-periods, i.e. its `value` is a duration in
/// seconds ending at `timeCollected` (collision and presence sensors).
pub fn is_duration_sensor(sensor_name: &str) -> bool {
    let name = sensor_name.rsplit("__").next().unwrap_or(sensor_name);
    let numbered_suffix = name
        .rsplit('_')
        .next()
        .map(|tail| !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false);
    numbered_suffix && (name.starts_with("COLLISION_") || name.starts_with("PRESENCE_"))
}

/// The instant to correlate an event on: the derived on-period start for
/// duration-style sensors, the collection instant otherwise.
///
/// Errors carry the event id; batch drivers report and move on.
pub fn event_anchor(
    event: &SensorEvent,
) -> Result<DateTime<Utc>, crate::api::types::EventFieldError> {
    let duration_style = event
        .sensor_name
        .as_deref()
        .or(event.sensor_id.as_deref())
        .map(is_duration_sensor)
        .unwrap_or(false);
    if duration_style && event.value.is_some() {
        event.on_period_start()
    } else {
        event.collected_at()
    }
}

/// Find, among `cross_events`, the one closest to the given anchor instant.
/// Cross-reference events with unusable timestamps are reported and skipped.
pub fn cross_reference<'a>(
    anchor: DateTime<Utc>,
    cross_events: &'a [SensorEvent],
) -> Option<Closest<'a, SensorEvent>> {
    closest_event(anchor, cross_events, |event| match event_anchor(event) {
        Ok(instant) => Some(instant),
        Err(e) => {
            warn!("skipping cross-reference candidate: {e}");
            None
        }
    })
}

/// Keep events that fall in the first `restrict` minutes of every `modulo`
/// minute interval, counted from the top of the hour. Events with
/// unparsable timestamps are reported and dropped.
pub fn filter_by_minute_window(
    events: Vec<SensorEvent>,
    modulo: u32,
    restrict: u32,
) -> Vec<SensorEvent> {
    use chrono::Timelike;
    events
        .into_iter()
        .filter(|event| match event.collected_at() {
            Ok(instant) => instant.minute() % modulo < restrict,
            Err(e) => {
                warn!("dropping event from minute filter: {e}");
                false
            }
        })
        .collect()
}
