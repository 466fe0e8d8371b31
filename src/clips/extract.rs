//! Per-event clip extraction pipeline.
//!
//! For each event: find the raw segment covering the event instant, download
//! it to a working directory (reusing a cached copy when consecutive events
//! fall in the same segment), compute the padded trim window, and cut the
//! clip with the injected trimmer. Store and trimmer are capabilities
//! supplied by the caller, so the pipeline is testable without network or
//! video tooling.

use super::store::{SegmentStore, StoreError};
use super::trim::{ClipTrimmer, TrimError};
use crate::api::types::{EventFieldError, SensorEvent};
use crate::correlate::{
    compute_trim_window, locate_segment, nominal_segment_duration, SECONDS_AFTER_EVENT,
    SECONDS_BEFORE_EVENT,
};
use chrono::Duration;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Clip extraction errors. A failed event is fatal to that event only;
/// batch drivers report and continue.
#[derive(Debug)]
pub enum ExtractError {
    Event(EventFieldError),
    Store(StoreError),
    Trim(TrimError),
    Io(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Event(e) => write!(f, "{e}"),
            ExtractError::Store(e) => write!(f, "{e}"),
            ExtractError::Trim(e) => write!(f, "{e}"),
            ExtractError::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ExtractError {}

impl From<EventFieldError> for ExtractError {
    fn from(e: EventFieldError) -> Self {
        ExtractError::Event(e)
    }
}

impl From<StoreError> for ExtractError {
    fn from(e: StoreError) -> Self {
        ExtractError::Store(e)
    }
}

impl From<TrimError> for ExtractError {
    fn from(e: TrimError) -> Self {
        ExtractError::Trim(e)
    }
}

/// Extracts short event clips from raw device video.
pub struct ClipExtractor {
    store: Box<dyn SegmentStore>,
    trimmer: Box<dyn ClipTrimmer>,
    output_dir: PathBuf,
    pad_before: Duration,
    pad_after: Duration,
}

impl ClipExtractor {
    pub fn new(
        store: Box<dyn SegmentStore>,
        trimmer: Box<dyn ClipTrimmer>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            trimmer,
            output_dir: output_dir.into(),
            pad_before: Duration::seconds(SECONDS_BEFORE_EVENT),
            pad_after: Duration::seconds(SECONDS_AFTER_EVENT),
        }
    }

    /// Override the default 10 s before / 5 s after padding.
    pub fn with_padding(mut self, pad_before: Duration, pad_after: Duration) -> Self {
        self.pad_before = pad_before;
        self.pad_after = pad_after;
        self
    }

    fn work_dir(&self) -> PathBuf {
        self.output_dir.join("tmp")
    }

    /// Extract the clip for one event.
    ///
    /// Returns `Ok(None)` when no segment covers the event instant; events
    /// without recorded video are a common, expected outcome.
    pub fn extract(
        &self,
        device_id: &str,
        event: &SensorEvent,
    ) -> Result<Option<PathBuf>, ExtractError> {
        let event_instant = event.collected_at()?;

        let segments = self
            .store
            .list_segments(device_id, event_instant.date_naive())?;
        debug!(
            event = %event.id,
            count = segments.len(),
            "listed candidate segments"
        );

        let Some(segment) = locate_segment(
            event_instant,
            nominal_segment_duration(),
            &segments,
            |s| s.started_at,
        ) else {
            return Ok(None);
        };

        let local_segment = self.work_dir().join(&segment.file_name);
        if !local_segment.is_file() {
            // A different segment may be cached from the previous event;
            // drop it before downloading the next one.
            let work_dir = self.work_dir();
            if work_dir.is_dir() {
                std::fs::remove_dir_all(&work_dir).map_err(|e| ExtractError::Io(e.to_string()))?;
            }
            std::fs::create_dir_all(&work_dir).map_err(|e| ExtractError::Io(e.to_string()))?;
            info!(segment = %segment.file_name, "downloading segment");
            self.store.fetch(segment, &local_segment)?;
        }

        let window = compute_trim_window(
            event_instant,
            segment.started_at,
            nominal_segment_duration(),
            self.pad_before,
            self.pad_after,
        );

        std::fs::create_dir_all(&self.output_dir).map_err(|e| ExtractError::Io(e.to_string()))?;
        let output = self.output_dir.join(format!("{}.mp4", event.id));
        self.trimmer.trim(&local_segment, &output, &window)?;
        Ok(Some(output))
    }

    /// Upload previously extracted clips to the given remote base path.
    /// Returns `(local path, authenticated URL)` pairs in input order.
    pub fn upload_clips(
        &self,
        clips: &[PathBuf],
        remote_base: &str,
    ) -> Result<Vec<(PathBuf, String)>, ExtractError> {
        let base = format!("{}/", remote_base.trim_matches('/')).replace("//", "/");
        let mut uploaded = Vec::with_capacity(clips.len());
        for clip in clips {
            let file_name = clip
                .file_name()
                .ok_or_else(|| ExtractError::Io(format!("clip path {} has no file name", clip.display())))?
                .to_string_lossy();
            let object_path = format!("{base}{file_name}");
            let url = self.store.upload(clip, &object_path)?;
            uploaded.push((clip.clone(), url));
        }
        Ok(uploaded)
    }

    /// Remove the cached segment working directory.
    pub fn cleanup(&self) -> Result<(), ExtractError> {
        let work_dir = self.work_dir();
        if work_dir.is_dir() {
            std::fs::remove_dir_all(&work_dir).map_err(|e| ExtractError::Io(e.to_string()))?;
        }
        Ok(())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}
