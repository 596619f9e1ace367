//! # evermedia-probe
//!
//! The media probing capability consumed by the evermedia pipeline.
//!
//! Media servers expose probing as an async service that takes a
//! [`MediaInfoRequest`] and answers with a [`MediaInfoResult`] holding zero or
//! more [`MediaSourceInfo`] entries. [`MediaEncoder`] is that seam; the
//! pipeline never depends on anything below it. [`FfprobeEncoder`] is a
//! standalone implementation that shells out to `ffprobe`.
//!
//! ## Example
//!
//! ```no_run
//! use evermedia_probe::{FfprobeEncoder, MediaEncoder, MediaInfoRequest};
//!
//! # async fn run() -> evermedia_probe::Result<()> {
//! let encoder = FfprobeEncoder::new();
//! let result = encoder
//!     .get_media_info(&MediaInfoRequest::video("/mnt/movies/Movie.mkv"))
//!     .await?;
//! for source in result.sources() {
//!     println!("{:?} {:?}", source.container, source.run_time_ticks);
//! }
//! # Ok(())
//! # }
//! ```

mod error;
pub mod ffprobe;
pub mod tools;
pub mod types;

pub use error::{Error, Result};
pub use ffprobe::FfprobeEncoder;
pub use tools::{check_tool, ToolInfo};
pub use types::{ChapterInfo, MediaInfoRequest, MediaInfoResult, MediaSourceInfo, MediaStreamInfo};

use async_trait::async_trait;

/// A service that probes media files.
///
/// Implementations must be safe to share across tasks (`Send + Sync`).
#[async_trait]
pub trait MediaEncoder: Send + Sync {
    /// Human-readable name identifying this implementation.
    fn name(&self) -> &'static str;

    /// Probe the file named in `request`.
    async fn get_media_info(&self, request: &MediaInfoRequest) -> Result<MediaInfoResult>;
}
