use evermedia_common::paths::{DEFAULT_LINK_EXTENSION, DEFAULT_SIDECAR_SUFFIX};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub library: LibraryConfig,

    #[serde(default)]
    pub probe: ProbeConfig,

    #[serde(default)]
    pub persist: PersistConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    /// Extension identifying link files (without the dot)
    #[serde(default = "default_link_extension")]
    pub link_extension: String,

    /// Suffix appended to a link file's name to form its sidecar
    #[serde(default = "default_sidecar_suffix")]
    pub sidecar_suffix: String,

    /// JSON catalog used by the standalone host library
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,
}

fn default_link_extension() -> String {
    DEFAULT_LINK_EXTENSION.to_string()
}

fn default_sidecar_suffix() -> String {
    DEFAULT_SIDECAR_SUFFIX.to_string()
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("evermedia-library.json")
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            link_extension: default_link_extension(),
            sidecar_suffix: default_sidecar_suffix(),
            catalog_path: default_catalog_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeConfig {
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    #[serde(default = "default_extract_chapters")]
    pub extract_chapters: bool,

    #[serde(default = "default_media_type")]
    pub media_type: String,
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_extract_chapters() -> bool {
    true
}

fn default_media_type() -> String {
    "Video".to_string()
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ffprobe_path: default_ffprobe_path(),
            extract_chapters: default_extract_chapters(),
            media_type: default_media_type(),
        }
    }
}

/// How probed metadata reaches the host's metadata store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistStrategy {
    /// Direct write when the host offers it, refresh otherwise
    #[default]
    Auto,
    /// Always write media sources and commit directly
    Direct,
    /// Always ask the host to refresh the item and read the result back
    Refresh,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PersistConfig {
    #[serde(default)]
    pub strategy: PersistStrategy,

    /// Upper bound on waiting for a triggered refresh to produce media sources
    #[serde(default = "default_refresh_timeout")]
    pub refresh_timeout_secs: u64,

    #[serde(default = "default_refresh_poll_interval")]
    pub refresh_poll_interval_ms: u64,
}

fn default_refresh_timeout() -> u64 {
    60
}

fn default_refresh_poll_interval() -> u64 {
    500
}

impl PersistConfig {
    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    pub fn refresh_poll_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_poll_interval_ms)
    }
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            strategy: PersistStrategy::default(),
            refresh_timeout_secs: default_refresh_timeout(),
            refresh_poll_interval_ms: default_refresh_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatchConfig {
    /// Pending triggers held before new ones are dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Pipeline runs allowed in parallel across different link files
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,
}

fn default_queue_capacity() -> usize {
    100
}

fn default_max_concurrent_runs() -> usize {
    4
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_concurrent_runs: default_max_concurrent_runs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub paths: Vec<PathBuf>,

    #[serde(default = "default_settle_time")]
    pub settle_time_secs: u64,
}

fn default_settle_time() -> u64 {
    5
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            paths: Vec::new(),
            settle_time_secs: default_settle_time(),
        }
    }
}
