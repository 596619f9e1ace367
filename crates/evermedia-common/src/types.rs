//! Normalized media-source types.
//!
//! [`MediaSourceRecord`] is the single internal representation of a probe
//! result. Every stage downstream of the prober adapter works on this type
//! and never on the host's own media-source shape. Field names serialize in
//! PascalCase so a sidecar reads the same as the host's catalog entries, and
//! unknown fields are kept in `extra` so newer producers round-trip through
//! older readers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// Number of 100ns ticks in one second.
pub const TICKS_PER_SECOND: u64 = 10_000_000;

/// Convert a duration in (fractional) seconds into 100ns ticks.
///
/// Negative, NaN, and infinite inputs yield `None`.
pub fn ticks_from_secs(secs: f64) -> Option<u64> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some((secs * TICKS_PER_SECOND as f64).round() as u64)
}

/// Kind of elementary stream inside a media source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StreamType {
    Video,
    Audio,
    Subtitle,
    EmbeddedImage,
    Data,
    Attachment,
    /// Any stream type not known to this version; the original spelling is kept.
    Other(String),
}

impl StreamType {
    /// Canonical spelling used on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Video => "Video",
            Self::Audio => "Audio",
            Self::Subtitle => "Subtitle",
            Self::EmbeddedImage => "EmbeddedImage",
            Self::Data => "Data",
            Self::Attachment => "Attachment",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for StreamType {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "video" => Self::Video,
            "audio" => Self::Audio,
            "subtitle" => Self::Subtitle,
            "embeddedimage" => Self::EmbeddedImage,
            "data" => Self::Data,
            "attachment" => Self::Attachment,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for StreamType {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<StreamType> for String {
    fn from(t: StreamType) -> Self {
        match t {
            StreamType::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport used to reach a media source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MediaProtocol {
    #[default]
    File,
    Http,
    Rtmp,
    Rtsp,
    Udp,
    Ftp,
    Other(String),
}

impl MediaProtocol {
    /// Canonical spelling used on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Self::File => "File",
            Self::Http => "Http",
            Self::Rtmp => "Rtmp",
            Self::Rtsp => "Rtsp",
            Self::Udp => "Udp",
            Self::Ftp => "Ftp",
            Self::Other(s) => s,
        }
    }

    /// Infer the protocol from a path or URL.
    ///
    /// ```
    /// use evermedia_common::MediaProtocol;
    ///
    /// assert_eq!(MediaProtocol::for_path("/mnt/a.mkv"), MediaProtocol::File);
    /// assert_eq!(MediaProtocol::for_path("HTTPS://host/a.mkv"), MediaProtocol::Http);
    /// assert_eq!(MediaProtocol::for_path("rtsp://cam/1"), MediaProtocol::Rtsp);
    /// ```
    pub fn for_path(path: &str) -> Self {
        let lower = path.trim().to_ascii_lowercase();
        match lower.split_once("://").map(|(scheme, _)| scheme) {
            Some("http" | "https") => Self::Http,
            Some("rtmp" | "rtmps") => Self::Rtmp,
            Some("rtsp") => Self::Rtsp,
            Some("udp" | "rtp") => Self::Udp,
            Some("ftp") => Self::Ftp,
            Some("file") | None => Self::File,
            Some(scheme) => Self::Other(scheme.to_string()),
        }
    }
}

impl From<String> for MediaProtocol {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "file" => Self::File,
            "http" => Self::Http,
            "rtmp" => Self::Rtmp,
            "rtsp" => Self::Rtsp,
            "udp" => Self::Udp,
            "ftp" => Self::Ftp,
            _ => Self::Other(s),
        }
    }
}

impl From<MediaProtocol> for String {
    fn from(p: MediaProtocol) -> Self {
        match p {
            MediaProtocol::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for MediaProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One elementary stream of a media source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaStream {
    /// Stream kind.
    #[serde(rename = "Type")]
    pub stream_type: StreamType,
    /// Codec name as reported by the prober (e.g. "hevc", "aac").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    /// Prober-assigned stream index. Authoritative, unlike list position.
    pub index: u32,
    /// Fields this version does not model (language, width, channels, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MediaStream {
    /// Create a stream with no extra fields.
    pub fn new(stream_type: StreamType, codec: Option<String>, index: u32) -> Self {
        Self {
            stream_type,
            codec,
            index,
            extra: Map::new(),
        }
    }
}

/// Normalized result of probing one link-file target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaSourceRecord {
    /// The target path that was probed, not the link file.
    #[serde(rename = "Path")]
    pub source_path: String,
    /// Container format (e.g. "matroska,webm", "mov,mp4,m4a,3gp,3g2,mj2").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    /// Duration in 100ns ticks.
    #[serde(rename = "RunTimeTicks", default, skip_serializing_if = "Option::is_none")]
    pub runtime_ticks: Option<u64>,
    /// Streams in prober output order.
    #[serde(rename = "MediaStreams", default, skip_serializing_if = "Vec::is_empty")]
    pub streams: Vec<MediaStream>,
    #[serde(default)]
    pub protocol: MediaProtocol,
    /// Host fields not modelled here, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MediaSourceRecord {
    /// Duration as a [`Duration`], if known.
    pub fn duration(&self) -> Option<Duration> {
        self.runtime_ticks
            .map(|ticks| Duration::from_nanos(ticks.saturating_mul(100)))
    }

    /// Look up a stream by its prober index.
    pub fn stream(&self, index: u32) -> Option<&MediaStream> {
        self.streams.iter().find(|s| s.index == index)
    }

    /// Iterate over streams of one kind, in prober order.
    pub fn streams_of<'a>(
        &'a self,
        stream_type: &'a StreamType,
    ) -> impl Iterator<Item = &'a MediaStream> + 'a {
        self.streams
            .iter()
            .filter(move |s| &s.stream_type == stream_type)
    }

    /// Whether the source carries at least one subtitle stream.
    pub fn has_subtitles(&self) -> bool {
        self.streams_of(&StreamType::Subtitle).next().is_some()
    }
}

/// A chapter marker extracted alongside a media source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChapterRecord {
    pub start_position_ticks: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
