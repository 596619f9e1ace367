//! Sidecar cache: the probed media source, stored next to its link file.
//!
//! The file is UTF-8 JSON of the form `{ "MediaSource": { ... } }`. Other
//! top-level keys are allowed; `Chapters` is written when chapters were
//! extracted, and keys this version does not know are kept on read so a
//! rewrite does not drop them. Writes go through a temp file in the same
//! directory and a rename, so readers never see a partial sidecar.

use std::io::Write;
use std::path::{Path, PathBuf};

use evermedia_common::paths::sidecar_path;
use evermedia_common::{CacheError, ChapterRecord, MediaSourceRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// On-disk sidecar document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SidecarRecord {
    pub media_source: MediaSourceRecord,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chapters: Vec<ChapterRecord>,
    /// Top-level keys written by newer versions.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SidecarRecord {
    pub fn new(media_source: MediaSourceRecord) -> Self {
        Self {
            media_source,
            chapters: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_chapters(mut self, chapters: Vec<ChapterRecord>) -> Self {
        self.chapters = chapters;
        self
    }
}

/// Reads and writes sidecars for link files.
#[derive(Debug, Clone)]
pub struct SidecarCache {
    suffix: String,
}

impl SidecarCache {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    /// Where the sidecar for `link_path` lives.
    pub fn path_for(&self, link_path: &Path) -> PathBuf {
        sidecar_path(link_path, &self.suffix)
    }

    /// Write (or replace) the sidecar for `link_path`.
    ///
    /// Returns the sidecar path. Any existing sidecar is replaced whole; its
    /// previous content is not merged.
    pub fn write(&self, link_path: &Path, record: &SidecarRecord) -> Result<PathBuf, CacheError> {
        let path = self.path_for(link_path);
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let write_err = |e: std::io::Error| CacheError::Write {
            path: path.clone(),
            message: e.to_string(),
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(".evermedia-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(write_err)?;
        tmp.write_all(&json).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;

        Ok(path)
    }

    /// Read the full sidecar document for `link_path`.
    pub fn read(&self, link_path: &Path) -> Result<SidecarRecord, CacheError> {
        let path = self.path_for(link_path);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CacheError::NotFound { path });
            }
            Err(e) => {
                return Err(CacheError::Read {
                    path,
                    message: e.to_string(),
                });
            }
        };

        serde_json::from_str(&content).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    /// Read only the cached media source for `link_path`.
    pub fn read_source(&self, link_path: &Path) -> Result<MediaSourceRecord, CacheError> {
        self.read(link_path).map(|sidecar| sidecar.media_source)
    }

    /// [`write`](Self::write) on the blocking pool.
    pub async fn write_async(
        &self,
        link_path: &Path,
        record: SidecarRecord,
    ) -> Result<PathBuf, CacheError> {
        let cache = self.clone();
        let link_path = link_path.to_path_buf();
        let path = self.path_for(&link_path);
        tokio::task::spawn_blocking(move || cache.write(&link_path, &record))
            .await
            .map_err(|e| CacheError::Write {
                path,
                message: format!("write task failed: {e}"),
            })?
    }
}
