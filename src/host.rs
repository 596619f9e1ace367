//! Capabilities the host media server exposes to the pipeline.
//!
//! The host owns library items and their authoritative media sources. Hosts
//! differ in what they allow: some let a plugin write media sources and commit
//! directly ([`ItemWriter`]), others only let it ask for a metadata refresh and
//! read the result back ([`MetadataRefresher`]). [`HostLibrary`] advertises
//! which of the two are available.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use evermedia_common::ItemId;
use evermedia_probe::MediaSourceInfo;
use serde::{Deserialize, Serialize};

/// Error reported by a host capability.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HostError(String);

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type HostResult<T> = std::result::Result<T, HostError>;

/// Kind of host library item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Video,
    Movie,
    Episode,
    MusicVideo,
    Trailer,
    Audio,
    Folder,
    Series,
    Season,
}

impl ItemKind {
    /// Whether items of this kind carry video media sources.
    pub fn supports_media_sources(self) -> bool {
        matches!(
            self,
            Self::Video | Self::Movie | Self::Episode | Self::MusicVideo | Self::Trailer
        )
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Association between a link file and the host item created for it.
///
/// This is what library events carry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemBinding {
    pub id: ItemId,
    /// Path of the link file, as the host indexes it.
    pub path: PathBuf,
    pub name: String,
    pub parent_id: Option<ItemId>,
}

/// A host library item as stored in the authoritative catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LibraryItem {
    pub id: ItemId,
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub parent_id: Option<ItemId>,
    pub kind: ItemKind,
    #[serde(default)]
    pub run_time_ticks: Option<i64>,
    #[serde(default)]
    pub media_sources: Vec<MediaSourceInfo>,
    pub date_modified: DateTime<Utc>,
}

impl LibraryItem {
    /// Replace the item's media sources.
    pub fn set_media_sources(&mut self, sources: Vec<MediaSourceInfo>) {
        self.media_sources = sources;
    }

    pub fn binding(&self) -> ItemBinding {
        ItemBinding {
            id: self.id,
            path: self.path.clone(),
            name: self.name.clone(),
            parent_id: self.parent_id,
        }
    }
}

/// Reason passed along with a commit so host observers know what changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemUpdateType {
    MetadataImport,
    MetadataEdit,
    ImageUpdate,
}

/// Options for a host-side metadata refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOptions {
    /// Re-probe media even if the host thinks it is current.
    pub full_refresh: bool,
    pub replace_all_metadata: bool,
}

impl RefreshOptions {
    /// A full refresh that forces the host to probe and save media info.
    pub fn full() -> Self {
        Self {
            full_refresh: true,
            replace_all_metadata: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RefreshPriority {
    Low,
    Normal,
    High,
}

/// Read access to host items plus whichever write capabilities exist.
#[async_trait]
pub trait HostLibrary: Send + Sync {
    /// Look up an item by ID.
    async fn get_item(&self, id: ItemId) -> HostResult<Option<LibraryItem>>;

    /// Direct write + commit, if the host exposes it.
    fn item_writer(&self) -> Option<&dyn ItemWriter> {
        None
    }

    /// Refresh trigger + read-back, if the host exposes it.
    fn refresher(&self) -> Option<&dyn MetadataRefresher> {
        None
    }
}

/// Persist a modified item through the host's "metadata updated" transition.
#[async_trait]
pub trait ItemWriter: Send + Sync {
    async fn commit(&self, item: &LibraryItem, update: ItemUpdateType) -> HostResult<()>;
}

/// Ask the host to refresh an item on its own and read back what it stored.
#[async_trait]
pub trait MetadataRefresher: Send + Sync {
    /// Queue a refresh. Returns once the request is queued, not when it finishes.
    fn queue_refresh(
        &self,
        id: ItemId,
        options: RefreshOptions,
        priority: RefreshPriority,
    ) -> HostResult<()>;

    /// The media sources the host currently holds for an item.
    async fn get_media_sources(&self, item: &LibraryItem) -> HostResult<Vec<MediaSourceInfo>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_kind_support() {
        assert!(ItemKind::Movie.supports_media_sources());
        assert!(ItemKind::Video.supports_media_sources());
        assert!(!ItemKind::Folder.supports_media_sources());
        assert!(!ItemKind::Audio.supports_media_sources());
    }

    #[test]
    fn test_binding_from_item() {
        let item = LibraryItem {
            id: ItemId::new(),
            name: "Show".into(),
            path: PathBuf::from("/media/Show.strm"),
            parent_id: None,
            kind: ItemKind::Video,
            run_time_ticks: None,
            media_sources: Vec::new(),
            date_modified: Utc::now(),
        };
        let binding = item.binding();
        assert_eq!(binding.id, item.id);
        assert_eq!(binding.path, item.path);
    }
}
