//! Adapter between the host's probing capability and [`MediaSourceRecord`].
//!
//! Whatever shape the [`MediaEncoder`] returns, the rest of the pipeline sees
//! exactly one normalized record. When the encoder reports several sources
//! for one target, the first one wins.

use std::path::Path;
use std::sync::Arc;

use evermedia_common::{
    ChapterRecord, MediaProtocol, MediaSourceRecord, MediaStream, ProbeFailure, StreamType,
};
use evermedia_probe::{ChapterInfo, MediaEncoder, MediaInfoRequest, MediaSourceInfo};
use serde_json::{Map, Value};

/// Host-shape keys that map onto named [`MediaSourceRecord`] fields.
const SOURCE_KEYS: &[&str] = &["Path", "Container", "RunTimeTicks", "MediaStreams", "Protocol"];

/// Host-shape keys that map onto named [`MediaStream`] fields.
const STREAM_KEYS: &[&str] = &["Type", "Codec", "Index"];

/// Everything one probe produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutput {
    pub record: MediaSourceRecord,
    pub chapters: Vec<ChapterRecord>,
}

/// Wraps a [`MediaEncoder`] behind a stable probe interface.
#[derive(Clone)]
pub struct ProberAdapter {
    encoder: Arc<dyn MediaEncoder>,
    extract_chapters: bool,
    media_type: String,
}

impl ProberAdapter {
    pub fn new(encoder: Arc<dyn MediaEncoder>) -> Self {
        Self {
            encoder,
            extract_chapters: true,
            media_type: "Video".to_string(),
        }
    }

    /// Builder: whether to ask the encoder for chapters.
    pub fn with_chapters(mut self, extract: bool) -> Self {
        self.extract_chapters = extract;
        self
    }

    /// Builder: media type hint passed to the encoder.
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = media_type.into();
        self
    }

    /// Probe a resolved local target.
    pub async fn probe(&self, target: &Path) -> Result<ProbeOutput, ProbeFailure> {
        let target_str = target.to_string_lossy().into_owned();

        if !tokio::fs::try_exists(target).await.unwrap_or(false) {
            return Err(ProbeFailure::TargetVanished { target: target_str });
        }

        let request = MediaInfoRequest {
            path: target.to_path_buf(),
            extract_chapters: self.extract_chapters,
            media_type: self.media_type.clone(),
        };

        let result = match self.encoder.get_media_info(&request).await {
            Ok(result) => result,
            Err(e) if e.is_not_found() => {
                return Err(ProbeFailure::TargetVanished { target: target_str });
            }
            Err(e) => return Err(ProbeFailure::probe_error(target_str, e)),
        };

        let sources = result.sources();
        let Some(first) = sources.first() else {
            return Err(ProbeFailure::NoMediaSources { target: target_str });
        };
        if sources.len() > 1 {
            tracing::debug!(
                target = %target_str,
                count = sources.len(),
                "encoder returned several media sources, keeping the first"
            );
        }

        Ok(ProbeOutput {
            record: normalize_source(&target_str, first),
            chapters: normalize_chapters(&result.chapters),
        })
    }
}

/// Convert a host media source into a record whose `source_path` is `target`.
pub(crate) fn normalize_source(target: &str, info: &MediaSourceInfo) -> MediaSourceRecord {
    let streams = info
        .media_streams
        .as_deref()
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(position, stream)| MediaStream {
            stream_type: StreamType::from(stream.stream_type.clone()),
            codec: stream.codec.clone(),
            index: stream
                .index
                .and_then(|i| u32::try_from(i).ok())
                .unwrap_or(position as u32),
            extra: leftover_fields(stream, STREAM_KEYS),
        })
        .collect();

    MediaSourceRecord {
        source_path: target.to_string(),
        container: info.container.clone(),
        runtime_ticks: info.run_time_ticks.and_then(|t| u64::try_from(t).ok()),
        streams,
        protocol: info
            .protocol
            .clone()
            .map(MediaProtocol::from)
            .unwrap_or_else(|| MediaProtocol::for_path(target)),
        extra: leftover_fields(info, SOURCE_KEYS),
    }
}

fn normalize_chapters(chapters: &[ChapterInfo]) -> Vec<ChapterRecord> {
    chapters
        .iter()
        .filter_map(|c| {
            Some(ChapterRecord {
                start_position_ticks: u64::try_from(c.start_position_ticks).ok()?,
                name: c.name.clone(),
            })
        })
        .collect()
}

/// Serialize a host struct and keep every field not in `known`.
fn leftover_fields<T: serde::Serialize>(value: &T, known: &[&str]) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(mut map)) => {
            for key in known {
                map.remove(*key);
            }
            map
        }
        _ => Map::new(),
    }
}
