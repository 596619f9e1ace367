//! FFprobe-based media probing.

use crate::types::*;
use crate::{Error, MediaEncoder, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::process::Command;

const TICKS_PER_SECOND: f64 = 10_000_000.0;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    chapters: Vec<FfprobeChapter>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: String,
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: i32,
    codec_type: Option<String>,
    codec_name: Option<String>,
    profile: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    channels: Option<u32>,
    sample_rate: Option<String>,
    bit_rate: Option<String>,
    #[serde(default)]
    disposition: FfprobeDisposition,
    #[serde(default)]
    tags: FfprobeTags,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    default: u8,
    #[serde(default)]
    forced: u8,
    #[serde(default)]
    attached_pic: u8,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    language: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeChapter {
    start_time: Option<String>,
    #[serde(default)]
    tags: FfprobeTags,
}

/// [`MediaEncoder`] backed by the `ffprobe` command-line tool.
#[derive(Debug, Clone)]
pub struct FfprobeEncoder {
    program: PathBuf,
}

impl FfprobeEncoder {
    /// Use `ffprobe` from `PATH`.
    pub fn new() -> Self {
        Self::with_program("ffprobe")
    }

    /// Use a specific ffprobe executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// The executable this encoder runs.
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for FfprobeEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaEncoder for FfprobeEncoder {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn get_media_info(&self, request: &MediaInfoRequest) -> Result<MediaInfoResult> {
        if !request.path.exists() {
            return Err(Error::file_not_found(&request.path));
        }

        let mut command = Command::new(&self.program);
        command.args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ]);
        if request.extract_chapters {
            command.arg("-show_chapters");
        }
        command.arg(&request.path).kill_on_drop(true);

        tracing::debug!(path = %request.path.display(), "running ffprobe");

        let output = command.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool_not_found(self.program.display().to_string())
            } else {
                Error::Io(e)
            }
        })?;

        if !output.status.success() {
            return Err(Error::tool_failed("ffprobe", failure_message(output.status, &output.stderr)));
        }

        let json_str = String::from_utf8(output.stdout)
            .map_err(|e| Error::parse_error("ffprobe", format!("Invalid UTF-8: {}", e)))?;

        parse_ffprobe_json(&request.path, &json_str)
    }
}

/// Exit status plus whatever ffprobe reported on stderr.
fn failure_message(status: std::process::ExitStatus, stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {stderr}")
    }
}

/// Parse raw `ffprobe -print_format json` output into a host-shaped result.
pub fn parse_ffprobe_json(path: &Path, json: &str) -> Result<MediaInfoResult> {
    let output: FfprobeOutput = serde_json::from_str(json)?;
    Ok(parse_ffprobe_output(path, output))
}

fn parse_ffprobe_output(path: &Path, output: FfprobeOutput) -> MediaInfoResult {
    let run_time_ticks = output
        .format
        .duration
        .as_deref()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| (secs * TICKS_PER_SECOND).round() as i64);

    let media_streams = output.streams.into_iter().map(convert_stream).collect();

    let source = MediaSourceInfo {
        id: None,
        path: Some(path.to_string_lossy().into_owned()),
        protocol: Some("File".to_string()),
        container: Some(normalize_container(&output.format.format_name, path)),
        size: output.format.size.and_then(|s| s.parse().ok()),
        bitrate: output.format.bit_rate.and_then(|s| s.parse().ok()),
        run_time_ticks,
        media_streams: Some(media_streams),
        extra: Map::new(),
    };

    let chapters = output
        .chapters
        .into_iter()
        .filter_map(|c| {
            let secs: f64 = c.start_time?.parse().ok()?;
            Some(ChapterInfo {
                start_position_ticks: (secs * TICKS_PER_SECOND).round() as i64,
                name: c.tags.title,
            })
        })
        .collect();

    MediaInfoResult {
        media_sources: Some(vec![source]),
        chapters,
    }
}

fn convert_stream(stream: FfprobeStream) -> MediaStreamInfo {
    let stream_type = match stream.codec_type.as_deref() {
        Some("video") if stream.disposition.attached_pic == 1 => "EmbeddedImage",
        Some("video") => "Video",
        Some("audio") => "Audio",
        Some("subtitle") => "Subtitle",
        Some("attachment") => "Attachment",
        _ => "Data",
    };

    let mut extra = Map::new();
    if let Some(profile) = stream.profile {
        extra.insert("Profile".into(), Value::String(profile));
    }
    if let Some(bit_rate) = stream.bit_rate.and_then(|s| s.parse::<u64>().ok()) {
        extra.insert("BitRate".into(), Value::from(bit_rate));
    }

    MediaStreamInfo {
        stream_type: stream_type.to_string(),
        codec: stream.codec_name,
        index: Some(stream.index),
        language: stream.tags.language,
        title: stream.tags.title,
        width: stream.width,
        height: stream.height,
        channels: stream.channels,
        sample_rate: stream.sample_rate.and_then(|s| s.parse().ok()),
        real_frame_rate: stream.r_frame_rate.and_then(|s| parse_frame_rate(&s)),
        is_default: Some(stream.disposition.default == 1),
        is_forced: Some(stream.disposition.forced == 1),
        extra,
    }
}

/// Map ffprobe's demuxer list to the short container name media servers use.
fn normalize_container(format_name: &str, path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    if format_name.contains("matroska") {
        return match ext.as_deref() {
            Some("webm") => "webm".to_string(),
            _ => "mkv".to_string(),
        };
    }
    if format_name.starts_with("mov,mp4") {
        return match ext.as_deref() {
            Some(e @ ("mov" | "m4v" | "m4a" | "3gp")) => e.to_string(),
            _ => "mp4".to_string(),
        };
    }
    if format_name == "mpegts" {
        return "ts".to_string();
    }

    format_name
        .split(',')
        .next()
        .unwrap_or(format_name)
        .to_string()
}

fn parse_frame_rate(rate_str: &str) -> Option<f64> {
    let parts: Vec<&str> = rate_str.split('/').collect();
    if parts.len() == 2 {
        let num: f64 = parts[0].parse().ok()?;
        let den: f64 = parts[1].parse().ok()?;
        if den != 0.0 {
            return Some(num / den);
        }
        return None;
    }
    rate_str.parse().ok()
}
