pub mod settle;

pub use settle::FileSettleTracker;

use crate::config::WatchConfig;
use crate::dispatch::EventDispatcher;
use crate::library::JsonLibrary;
use crate::scanner::bind_link;
use anyhow::{Context, Result};
use evermedia_common::paths::is_link_file;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A filesystem change to a link file.
#[derive(Debug)]
enum LinkChange {
    Touched(PathBuf),
    Removed(PathBuf),
}

/// Watches library directories and dispatches events for link files once
/// they stop changing.
pub struct FileWatcher {
    config: WatchConfig,
    library: JsonLibrary,
    dispatcher: Arc<EventDispatcher>,
    watcher: Option<RecommendedWatcher>,
    task: Option<JoinHandle<()>>,
}

impl FileWatcher {
    pub fn new(config: WatchConfig, library: JsonLibrary, dispatcher: Arc<EventDispatcher>) -> Self {
        Self {
            config,
            library,
            dispatcher,
            watcher: None,
            task: None,
        }
    }

    /// Start watching configured directories
    pub async fn start(&mut self) -> Result<()> {
        if !self.config.enabled {
            tracing::info!("File watcher is disabled");
            return Ok(());
        }

        if self.config.paths.is_empty() {
            tracing::warn!("No watch paths configured");
            return Ok(());
        }

        let (change_tx, mut change_rx) = mpsc::channel::<LinkChange>(100);
        let (settled_tx, mut settled_rx) = mpsc::channel::<PathBuf>(100);

        let mut settle_tracker = FileSettleTracker::new(self.config.settle_time_secs, settled_tx);

        let extension = self.dispatcher.pipeline().link_extension().to_string();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                let Ok(event) = res else {
                    return;
                };
                for path in event.paths {
                    if !is_link_file(&path, &extension) {
                        continue;
                    }
                    let change = match event.kind {
                        EventKind::Create(_) | EventKind::Modify(_) => LinkChange::Touched(path),
                        EventKind::Remove(_) => LinkChange::Removed(path),
                        _ => continue,
                    };
                    let _ = change_tx.blocking_send(change);
                }
            },
            Config::default(),
        )
        .context("Failed to create file watcher")?;

        for path in &self.config.paths {
            if path.exists() {
                watcher
                    .watch(path, RecursiveMode::Recursive)
                    .with_context(|| format!("Failed to watch path: {:?}", path))?;
                tracing::info!("Watching directory: {:?}", path);
            } else {
                tracing::warn!("Watch path does not exist: {:?}", path);
            }
        }

        self.watcher = Some(watcher);

        let library = self.library.clone();
        let dispatcher = Arc::clone(&self.dispatcher);
        let check_every = Duration::from_secs(self.config.settle_time_secs.clamp(1, 5));

        self.task = Some(tokio::spawn(async move {
            let mut check_interval = tokio::time::interval(check_every);

            loop {
                tokio::select! {
                    Some(change) = change_rx.recv() => match change {
                        LinkChange::Touched(path) => {
                            tracing::debug!("Link file event: {:?}", path);
                            settle_tracker.file_changed(path);
                        }
                        LinkChange::Removed(path) => settle_tracker.remove(&path),
                    },

                    Some(path) = settled_rx.recv() => {
                        if !path.is_file() {
                            continue;
                        }
                        match bind_link(&library, &path).await {
                            Ok(event) => {
                                dispatcher.dispatch(event);
                            }
                            Err(e) => {
                                tracing::warn!("Failed to register {:?}: {}", path, e);
                            }
                        }
                    }

                    _ = check_interval.tick() => {
                        settle_tracker.check_settled().await;
                    }
                }
            }
        }));

        Ok(())
    }

    /// Stop watching
    pub fn stop(&mut self) {
        self.watcher = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        tracing::info!("File watcher stopped");
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
