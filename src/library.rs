//! JSON-file host library.
//!
//! A small stand-in for a media server's catalog: items keyed by [`ItemId`],
//! saved to a single JSON document `{ "Items": [...] }`. It exposes item lookup
//! and direct write + commit, so the pipeline reconciles into it with the
//! direct strategy. The CLI uses it to bind link files to items.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use evermedia_common::ItemId;
use evermedia_probe::MediaSourceInfo;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::host::{
    HostError, HostLibrary, HostResult, ItemBinding, ItemKind, ItemUpdateType, ItemWriter,
    LibraryItem,
};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Catalog {
    #[serde(default)]
    items: Vec<LibraryItem>,
}

struct Inner {
    catalog_path: Option<PathBuf>,
    items: RwLock<HashMap<ItemId, LibraryItem>>,
    /// Serializes catalog saves so an older snapshot never lands last.
    save_lock: Mutex<()>,
}

/// Host library backed by a JSON catalog file.
#[derive(Clone)]
pub struct JsonLibrary {
    inner: Arc<Inner>,
}

impl JsonLibrary {
    /// Open the catalog at `path`, starting empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let items = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read library catalog: {:?}", path))?;
            let catalog: Catalog = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse library catalog: {:?}", path))?;
            catalog.items
        } else {
            Vec::new()
        };

        tracing::debug!("Loaded {} library items from {:?}", items.len(), path);
        Ok(Self::with_items(Some(path), items))
    }

    /// A library that is never saved to disk.
    pub fn in_memory() -> Self {
        Self::with_items(None, Vec::new())
    }

    fn with_items(catalog_path: Option<PathBuf>, items: Vec<LibraryItem>) -> Self {
        Self {
            inner: Arc::new(Inner {
                catalog_path,
                items: RwLock::new(items.into_iter().map(|item| (item.id, item)).collect()),
                save_lock: Mutex::new(()),
            }),
        }
    }

    pub fn catalog_path(&self) -> Option<&Path> {
        self.inner.catalog_path.as_deref()
    }

    /// Binding for the item at `path`, registering a new video item if the
    /// path is unknown. The flag is true when the item was created.
    pub fn get_or_insert(&self, path: &Path) -> HostResult<(ItemBinding, bool)> {
        if let Some(item) = self.find_by_path(path) {
            return Ok((item.binding(), false));
        }

        let binding = {
            let mut items = self.inner.items.write();
            // Re-check under the write lock.
            if let Some(item) = items.values().find(|item| item.path == path) {
                return Ok((item.binding(), false));
            }
            let item = new_video_item(path);
            let binding = item.binding();
            items.insert(item.id, item);
            binding
        };

        tracing::info!(item = %binding.id, path = %path.display(), "registered library item");
        self.inner.save()?;
        Ok((binding, true))
    }

    pub fn find_by_path(&self, path: &Path) -> Option<LibraryItem> {
        self.inner
            .items
            .read()
            .values()
            .find(|item| item.path == path)
            .cloned()
    }

    /// The media sources currently stored for an item.
    pub fn media_sources(&self, id: ItemId) -> Vec<MediaSourceInfo> {
        self.inner
            .items
            .read()
            .get(&id)
            .map(|item| item.media_sources.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Inner {
    fn save(&self) -> HostResult<()> {
        let Some(path) = &self.catalog_path else {
            return Ok(());
        };

        let _guard = self.save_lock.lock();
        let catalog = Catalog {
            items: {
                let mut items: Vec<_> = self.items.read().values().cloned().collect();
                items.sort_by(|a, b| a.path.cmp(&b.path));
                items
            },
        };

        write_atomic(path, &catalog)
            .map_err(|e| HostError::new(format!("failed to save catalog {:?}: {e}", path)))
    }
}

fn write_atomic(path: &Path, catalog: &Catalog) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let json = serde_json::to_vec_pretty(catalog)?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".evermedia-catalog-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(&json)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn new_video_item(path: &Path) -> LibraryItem {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    LibraryItem {
        id: ItemId::new(),
        name,
        path: path.to_path_buf(),
        parent_id: None,
        kind: ItemKind::Video,
        run_time_ticks: None,
        media_sources: Vec::new(),
        date_modified: Utc::now(),
    }
}

#[async_trait]
impl HostLibrary for JsonLibrary {
    async fn get_item(&self, id: ItemId) -> HostResult<Option<LibraryItem>> {
        Ok(self.inner.items.read().get(&id).cloned())
    }

    fn item_writer(&self) -> Option<&dyn ItemWriter> {
        Some(self)
    }
}

#[async_trait]
impl ItemWriter for JsonLibrary {
    async fn commit(&self, item: &LibraryItem, update: ItemUpdateType) -> HostResult<()> {
        {
            let mut items = self.inner.items.write();
            if !items.contains_key(&item.id) {
                return Err(HostError::new(format!("item {} is not in the library", item.id)));
            }
            let mut updated = item.clone();
            updated.date_modified = Utc::now();
            items.insert(item.id, updated);
        }

        tracing::debug!(item = %item.id, ?update, "committed library item");

        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.save())
            .await
            .map_err(|e| HostError::new(format!("catalog save task failed: {e}")))?
    }
}
