//! Link-file discovery.
//!
//! Walks a directory tree for link files, binds each to a library item and
//! dispatches the matching event. Used by the `scan` command and, one file at
//! a time, by the watcher.

use std::path::{Path, PathBuf};

use anyhow::Result;
use evermedia_common::paths::is_link_file;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::dispatch::{EventDispatcher, ItemEvent};
use crate::host::{HostError, HostResult};
use crate::library::JsonLibrary;

/// Counts from one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Link files found.
    pub found: usize,
    /// Items registered in the library by this scan.
    pub added: usize,
    /// Triggers the dispatcher accepted.
    pub dispatched: usize,
}

/// All link files under `root`, sorted.
pub fn find_link_files(root: &Path, link_extension: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_link_file(p, link_extension))
        .collect();
    files.sort();
    files
}

/// Bind a link file to its library item: `Added` when the item is new,
/// `Updated` when it already existed.
///
/// Registering may save the catalog, so it runs on the blocking pool.
pub async fn bind_link(library: &JsonLibrary, path: &Path) -> HostResult<ItemEvent> {
    let library = library.clone();
    let path = path.to_path_buf();
    let (binding, created) = tokio::task::spawn_blocking(move || library.get_or_insert(&path))
        .await
        .map_err(|e| HostError::new(format!("catalog task failed: {e}")))??;
    Ok(if created {
        ItemEvent::Added(binding)
    } else {
        ItemEvent::Updated(binding)
    })
}

/// Scan `root` and dispatch an event for every link file found.
pub async fn scan_directory(
    root: &Path,
    library: &JsonLibrary,
    dispatcher: &EventDispatcher,
) -> Result<ScanSummary> {
    if !root.is_dir() {
        anyhow::bail!("Scan path is not a directory: {:?}", root);
    }

    info!("Scanning directory: {:?}", root);
    let mut summary = ScanSummary::default();

    for path in find_link_files(root, dispatcher.pipeline().link_extension()) {
        summary.found += 1;

        let event = match bind_link(library, &path).await {
            Ok(event) => event,
            Err(e) => {
                warn!("Failed to register {:?}: {}", path, e);
                continue;
            }
        };
        if matches!(event, ItemEvent::Added(_)) {
            summary.added += 1;
        }

        if dispatcher.submit(event).await {
            summary.dispatched += 1;
        } else {
            debug!("Trigger not accepted for {:?}", path);
        }
    }

    info!(
        "Scan complete: {} link files, {} new, {} dispatched",
        summary.found, summary.added, summary.dispatched
    );
    Ok(summary)
}
