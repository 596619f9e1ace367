//! Host-shaped media information types.
//!
//! These mirror the structures a media server hands back from its probing
//! service. Every field is optional because host versions disagree on what
//! they fill in; fields nobody models here are kept in `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Parameters for a single probe call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaInfoRequest {
    /// File to probe.
    pub path: PathBuf,
    /// Also extract chapter markers.
    pub extract_chapters: bool,
    /// Expected media type (e.g. "Video", "Audio").
    pub media_type: String,
}

impl MediaInfoRequest {
    /// A video probe request without chapter extraction.
    pub fn video(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            extract_chapters: false,
            media_type: "Video".to_string(),
        }
    }

    /// Builder: toggle chapter extraction.
    pub fn with_chapters(mut self, extract: bool) -> Self {
        self.extract_chapters = extract;
        self
    }
}

/// Result of a probe call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaInfoResult {
    /// Media sources found in the file. Hosts may omit the list entirely.
    #[serde(default)]
    pub media_sources: Option<Vec<MediaSourceInfo>>,
    /// Chapters, when requested and present.
    #[serde(default)]
    pub chapters: Vec<ChapterInfo>,
}

/// A media source as the host describes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaSourceInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u64>,
    /// Duration in 100ns ticks. Signed because some hosts send -1 for unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_time_ticks: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_streams: Option<Vec<MediaStreamInfo>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single stream as the host describes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaStreamInfo {
    #[serde(rename = "Type")]
    pub stream_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_frame_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_forced: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A chapter marker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChapterInfo {
    pub start_position_ticks: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl MediaInfoResult {
    /// Media sources, treating an absent list as empty.
    pub fn sources(&self) -> &[MediaSourceInfo] {
        self.media_sources.as_deref().unwrap_or_default()
    }
}
