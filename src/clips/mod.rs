//! Raw video segment discovery, download, and event clip extraction.

pub mod extract;
pub mod segment;
pub mod store;
pub mod trim;

pub use extract::{ClipExtractor, ExtractError};
pub use segment::VideoSegment;
pub use store::{GsutilStore, RemoteLayout, SegmentStore, StoreError};
pub use trim::{ClipTrimmer, FfmpegTrimmer, TrimError};
