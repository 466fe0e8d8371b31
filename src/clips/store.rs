//! Segment listing, download and upload against the remote object store.
//!
//! The extractor only sees the [`SegmentStore`] trait; the shipped
//! implementation shells out to the `gsutil` command-line tool, which
//! carries its own authentication.

use super::segment::VideoSegment;
use chrono::NaiveDate;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

/// Default bucket holding raw device video.
pub const DEFAULT_BUCKET: &str = "bai-rawdata";

/// Default path prefix inside the default bucket.
pub const DEFAULT_BASE_PATH: &str = "gcpbai";

/// Object store errors.
#[derive(Debug)]
pub enum StoreError {
    /// The storage tool could not be executed
    Command(String),
    /// The storage tool ran but reported failure
    Failed { op: String, detail: String },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Command(msg) => write!(f, "storage command error: {msg}"),
            StoreError::Failed { op, detail } => write!(f, "storage {op} failed: {detail}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Capabilities the clip extractor needs from the object store.
pub trait SegmentStore {
    /// List the raw video segments recorded by a device on a calendar day.
    /// Segment-shaped names with unparsable timestamps are reported and
    /// skipped, never fatal to the listing.
    fn list_segments(&self, device_id: &str, day: NaiveDate) -> Result<Vec<VideoSegment>, StoreError>;

    /// Download one segment to a local file.
    fn fetch(&self, segment: &VideoSegment, dest: &Path) -> Result<(), StoreError>;

    /// Upload a local file to `<bucket>/path/to/file` (the upload target
    /// need not be the segment source bucket). Returns the authenticated
    /// browser URL of the uploaded object.
    fn upload(&self, local: &Path, remote_path: &str) -> Result<String, StoreError>;
}

/// Where raw segments live: a bucket plus the path layout beneath it.
#[derive(Debug, Clone)]
pub struct RemoteLayout {
    pub bucket: String,
    base_path: String,
    /// Custom source trees keep video under a `data_acq_video` subfolder
    acq_subdir: bool,
}

impl RemoteLayout {
    /// The standard raw-data bucket layout.
    pub fn standard() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            acq_subdir: false,
        }
    }

    /// Parse a `<bucket>/path/to/deviceDirs/` source argument.
    pub fn from_source_path(source: &str) -> Self {
        let mut parts = source.splitn(2, '/');
        let bucket = parts.next().unwrap_or_default().to_string();
        let base_path = parts
            .next()
            .unwrap_or_default()
            .trim_matches('/')
            .to_string();
        Self {
            bucket,
            base_path,
            acq_subdir: true,
        }
    }

    /// Daily folder prefix for a device.
    pub fn day_prefix(&self, device_id: &str, day: NaiveDate) -> String {
        let date = day.format("%Y-%m-%d");
        let prefix = if self.acq_subdir {
            if self.base_path.is_empty() {
                format!("{device_id}/data_acq_video/{date}/")
            } else {
                format!("{}/{device_id}/data_acq_video/{date}/", self.base_path)
            }
        } else {
            format!("{}/{device_id}/{date}/", self.base_path)
        };
        // The storage tool rejects double slashes in object paths
        prefix.replace("//", "/")
    }
}

/// Download an arbitrary `gs://` URL with gsutil. Media items reference
/// their recordings by full URL rather than by segment path.
pub fn download_url(url: &str, dest: &Path) -> Result<(), StoreError> {
    debug!(url, "downloading object");
    let output = Command::new("gsutil")
        .args(["cp", url, &dest.to_string_lossy()])
        .output()
        .map_err(|e| StoreError::Command(format!("failed to execute gsutil: {e}")))?;
    if !output.status.success() {
        return Err(StoreError::Failed {
            op: "download".to_string(),
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Segment store backed by the `gsutil` command-line tool.
pub struct GsutilStore {
    layout: RemoteLayout,
    gsutil: String,
}

impl GsutilStore {
    pub fn new(layout: RemoteLayout) -> Self {
        Self {
            layout,
            gsutil: "gsutil".to_string(),
        }
    }

    /// Use a specific gsutil binary instead of whatever is on PATH.
    pub fn with_binary(mut self, path: impl Into<String>) -> Self {
        self.gsutil = path.into();
        self
    }

    fn run(&self, op: &str, args: &[&str]) -> Result<String, StoreError> {
        debug!(op, ?args, "running gsutil");
        let output = Command::new(&self.gsutil)
            .args(args)
            .output()
            .map_err(|e| StoreError::Command(format!("failed to execute {}: {e}", self.gsutil)))?;
        if !output.status.success() {
            return Err(StoreError::Failed {
                op: op.to_string(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn gs_url(&self, object_path: &str) -> String {
        format!("gs://{}/{}", self.layout.bucket, object_path)
    }
}

impl SegmentStore for GsutilStore {
    fn list_segments(&self, device_id: &str, day: NaiveDate) -> Result<Vec<VideoSegment>, StoreError> {
        let prefix = self.layout.day_prefix(device_id, day);
        let listing = self.run("list", &["ls", &self.gs_url(&prefix)])?;

        let mut segments = Vec::new();
        for line in listing.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            // Listing entries come back as gs://<bucket>/<object path>
            let object_path = line
                .strip_prefix("gs://")
                .and_then(|rest| rest.split_once('/'))
                .map(|(_, path)| path)
                .unwrap_or(line);
            match VideoSegment::from_listing(device_id, object_path) {
                Some(Ok(segment)) => segments.push(segment),
                Some(Err(e)) => warn!("skipping segment {object_path}: {e}"),
                None => {}
            }
        }
        Ok(segments)
    }

    fn fetch(&self, segment: &VideoSegment, dest: &Path) -> Result<(), StoreError> {
        let url = self.gs_url(&segment.object_path);
        self.run("fetch", &["cp", &url, &dest.to_string_lossy()])?;
        Ok(())
    }

    fn upload(&self, local: &Path, remote_path: &str) -> Result<String, StoreError> {
        let url = format!("gs://{remote_path}");
        self.run("upload", &["cp", &local.to_string_lossy(), &url])?;
        Ok(format!("https://storage.cloud.google.com/{remote_path}"))
    }
}
