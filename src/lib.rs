//! sensorclip - Data API client and event clip extraction toolkit.
//!
//! This library provides a typed client for the sensor/event Data API,
//! temporal correlation of events against raw video segments and other
//! event streams, and a clip extraction pipeline driven by an external
//! object store and trim tool.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         sensorclip                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐    ┌─────────────┐    ┌─────────────────┐   │
//! │  │  Data API  │──▶│  Correlator  │──▶│  Clip Extractor  │   │
//! │  │  (events)  │    │ (pure time  │    │ (store + trim)  │   │
//! │  └────────────┘    │  matching)  │    └─────────────────┘   │
//! │        │           └─────────────┘             │            │
//! │        ▼                                       ▼            │
//! │  ┌────────────┐                        ┌─────────────┐      │
//! │  │   Status   │                        │ CSV Export  │      │
//! │  │  Reports   │                        │             │      │
//! │  └────────────┘                        └─────────────┘      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The correlator is pure: it operates on already-fetched in-memory lists
//! of instants and durations. Network, storage, and video tooling are
//! injected capabilities behind narrow traits.
//!
//! # Example
//!
//! ```no_run
//! use chrono::{Duration, Utc};
//! use sensorclip::api::{BlockingDataApiClient, StreamQuery};
//!
//! let client = BlockingDataApiClient::new("my-api-key", "https://data-api.boulderai.com/")
//!     .expect("Failed to create client");
//! let end = Utc::now();
//! let query = StreamQuery::for_device(
//!     "BAI_0000754",
//!     vec!["COLLISION_1".to_string()],
//!     end - Duration::days(3),
//!     end,
//! );
//! let events = client.query_stream_flat(&query).expect("query failed");
//! println!("{} events", events.len());
//! ```

pub mod aggregate;
pub mod api;
pub mod clips;
pub mod config;
pub mod correlate;
pub mod export;
pub mod status;
pub mod timeutil;

// Re-export key types at crate root for convenience
pub use api::{ApiError, BlockingDataApiClient, DataApiClient, MediaItem, MediaQuery, SensorEvent, StreamQuery};
pub use clips::{ClipExtractor, ClipTrimmer, FfmpegTrimmer, GsutilStore, RemoteLayout, SegmentStore, VideoSegment};
pub use config::{Config, ConfigError};
pub use correlate::{
    closest_event, compute_trim_window, locate_segment, Closest, TrimWindow,
    SECONDS_AFTER_EVENT, SECONDS_BEFORE_EVENT, SEGMENT_LENGTH_MINUTES,
};
pub use timeutil::{TimeRange, TimeRangeSpec};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
