//! Integration tests for the clip extraction pipeline, with the object
//! store and trimmer replaced by in-memory fakes.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use sensorclip::api::SensorEvent;
use sensorclip::clips::{
    ClipExtractor, ClipTrimmer, SegmentStore, StoreError, TrimError, VideoSegment,
};
use sensorclip::correlate::TrimWindow;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

fn segment(device_id: &str, name: &str) -> VideoSegment {
    VideoSegment::from_listing(
        device_id,
        &format!("gcpbai/{device_id}/2021-11-27/{name}"),
    )
    .expect("segment-shaped name")
    .expect("valid timestamp")
}

fn event(id: &str, time_collected: &str) -> SensorEvent {
    SensorEvent {
        id: id.to_string(),
        sensor_id: None,
        sensor_name: Some("COLLISION_1".to_string()),
        device_id: Some("BAI_0000754".to_string()),
        stream_id: None,
        time_collected: time_collected.to_string(),
        value: None,
        meta: Default::default(),
    }
}

#[derive(Default)]
struct StoreLog {
    listings: Vec<(String, NaiveDate)>,
    fetches: Vec<String>,
    uploads: Vec<String>,
}

struct FakeStore {
    segments: Vec<VideoSegment>,
    log: Rc<RefCell<StoreLog>>,
}

impl SegmentStore for FakeStore {
    fn list_segments(
        &self,
        device_id: &str,
        day: NaiveDate,
    ) -> Result<Vec<VideoSegment>, StoreError> {
        self.log
            .borrow_mut()
            .listings
            .push((device_id.to_string(), day));
        Ok(self.segments.clone())
    }

    fn fetch(&self, segment: &VideoSegment, dest: &Path) -> Result<(), StoreError> {
        self.log.borrow_mut().fetches.push(segment.file_name.clone());
        std::fs::write(dest, b"raw video").map_err(|e| StoreError::Failed {
            op: "fetch".to_string(),
            detail: e.to_string(),
        })
    }

    fn upload(&self, _local: &Path, remote_path: &str) -> Result<String, StoreError> {
        self.log.borrow_mut().uploads.push(remote_path.to_string());
        Ok(format!("https://storage.cloud.google.com/{remote_path}"))
    }
}

struct FakeTrimmer {
    windows: Rc<RefCell<Vec<TrimWindow>>>,
}

impl ClipTrimmer for FakeTrimmer {
    fn trim(&self, input: &Path, output: &Path, window: &TrimWindow) -> Result<(), TrimError> {
        assert!(input.is_file(), "trim input must exist");
        self.windows.borrow_mut().push(*window);
        std::fs::write(output, b"clip").map_err(|e| TrimError::Failed {
            detail: e.to_string(),
        })
    }
}

fn extractor_with(
    segments: Vec<VideoSegment>,
    output_dir: &Path,
) -> (ClipExtractor, Rc<RefCell<StoreLog>>, Rc<RefCell<Vec<TrimWindow>>>) {
    let log = Rc::new(RefCell::new(StoreLog::default()));
    let windows = Rc::new(RefCell::new(Vec::new()));
    let extractor = ClipExtractor::new(
        Box::new(FakeStore {
            segments,
            log: Rc::clone(&log),
        }),
        Box::new(FakeTrimmer {
            windows: Rc::clone(&windows),
        }),
        output_dir,
    );
    (extractor, log, windows)
}

#[test]
fn test_extract_trims_covering_segment() {
    let dir = tempfile::tempdir().unwrap();
    let segments = vec![
        segment("BAI_0000754", "DataAcqVideo_2021-11-27-14-00-00.000.mp4"),
        segment("BAI_0000754", "DataAcqVideo_2021-11-27-14-05-00.000.mp4"),
    ];
    let (extractor, log, windows) = extractor_with(segments, dir.path());

    // 2 min 30 s into the second segment
    let result = extractor
        .extract("BAI_0000754", &event("evt-1", "2021-11-27T14:07:30.000Z"))
        .unwrap();

    let clip = result.expect("segment covers the event");
    assert_eq!(clip, dir.path().join("evt-1.mp4"));
    assert!(clip.is_file());

    let log = log.borrow();
    assert_eq!(
        log.listings,
        vec![(
            "BAI_0000754".to_string(),
            NaiveDate::from_ymd_opt(2021, 11, 27).unwrap()
        )]
    );
    assert_eq!(
        log.fetches,
        vec!["DataAcqVideo_2021-11-27-14-05-00.000.mp4".to_string()]
    );

    // Default padding: 10 s before, 5 s after the 2:30 offset
    let windows = windows.borrow();
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].start, Duration::seconds(140));
    assert_eq!(windows[0].end, Duration::seconds(155));
}

#[test]
fn test_extract_without_covering_segment_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let segments = vec![segment(
        "BAI_0000754",
        "DataAcqVideo_2021-11-27-14-00-00.000.mp4",
    )];
    let (extractor, log, windows) = extractor_with(segments, dir.path());

    let result = extractor
        .extract("BAI_0000754", &event("evt-2", "2021-11-27T18:00:00.000Z"))
        .unwrap();

    assert!(result.is_none());
    assert!(log.borrow().fetches.is_empty());
    assert!(windows.borrow().is_empty());
}

#[test]
fn test_extract_reuses_cached_segment() {
    let dir = tempfile::tempdir().unwrap();
    let segments = vec![segment(
        "BAI_0000754",
        "DataAcqVideo_2021-11-27-14-00-00.000.mp4",
    )];
    let (extractor, log, _windows) = extractor_with(segments, dir.path());

    // Two events in the same segment: the download happens once
    extractor
        .extract("BAI_0000754", &event("evt-3", "2021-11-27T14:01:00.000Z"))
        .unwrap()
        .expect("covered");
    extractor
        .extract("BAI_0000754", &event("evt-4", "2021-11-27T14:03:00.000Z"))
        .unwrap()
        .expect("covered");

    assert_eq!(log.borrow().fetches.len(), 1);
    assert!(dir.path().join("evt-3.mp4").is_file());
    assert!(dir.path().join("evt-4.mp4").is_file());
}

#[test]
fn test_cleanup_removes_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    let segments = vec![segment(
        "BAI_0000754",
        "DataAcqVideo_2021-11-27-14-00-00.000.mp4",
    )];
    let (extractor, _log, _windows) = extractor_with(segments, dir.path());

    extractor
        .extract("BAI_0000754", &event("evt-5", "2021-11-27T14:01:00.000Z"))
        .unwrap()
        .expect("covered");
    assert!(dir.path().join("tmp").is_dir());

    extractor.cleanup().unwrap();
    assert!(!dir.path().join("tmp").exists());
    // Extracted clips survive cleanup
    assert!(dir.path().join("evt-5.mp4").is_file());
}

#[test]
fn test_upload_clips_builds_object_paths() {
    let dir = tempfile::tempdir().unwrap();
    let (extractor, log, _windows) = extractor_with(Vec::new(), dir.path());

    let clip = dir.path().join("evt-6.mp4");
    std::fs::write(&clip, b"clip").unwrap();

    let uploaded = extractor
        .upload_clips(&[clip.clone()], "bai-rawdata/event-clips/")
        .unwrap();

    assert_eq!(log.borrow().uploads, vec!["bai-rawdata/event-clips/evt-6.mp4"]);
    assert_eq!(uploaded.len(), 1);
    assert_eq!(uploaded[0].0, clip);
    assert!(uploaded[0].1.ends_with("evt-6.mp4"));
}

#[test]
fn test_extract_reports_bad_event_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    let (extractor, _log, _windows) = extractor_with(Vec::new(), dir.path());

    let err = extractor
        .extract("BAI_0000754", &event("evt-bad", "not-a-timestamp"))
        .unwrap_err();
    assert!(err.to_string().contains("evt-bad"));
}

#[test]
fn test_segment_order_does_not_change_match() {
    let dir = tempfile::tempdir().unwrap();
    let mut segments = vec![
        segment("BAI_0000754", "DataAcqVideo_2021-11-27-14-00-00.000.mp4"),
        segment("BAI_0000754", "DataAcqVideo_2021-11-27-14-05-00.000.mp4"),
        segment("BAI_0000754", "DataAcqVideo_2021-11-27-14-10-00.000.mp4"),
    ];
    segments.reverse();
    let (extractor, log, _windows) = extractor_with(segments, dir.path());

    extractor
        .extract("BAI_0000754", &event("evt-7", "2021-11-27T14:07:30.000Z"))
        .unwrap()
        .expect("covered");

    assert_eq!(
        log.borrow().fetches,
        vec!["DataAcqVideo_2021-11-27-14-05-00.000.mp4".to_string()]
    );
}

#[test]
fn test_event_instant_sanity() {
    // The listing day comes from the event's UTC date
    let t = Utc.with_ymd_and_hms(2021, 11, 27, 23, 59, 0).unwrap();
    assert_eq!(
        t.date_naive(),
        NaiveDate::from_ymd_opt(2021, 11, 27).unwrap()
    );
}
