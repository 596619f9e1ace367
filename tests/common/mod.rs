//! Shared test harness for integration tests.
//!
//! Provides a scripted [`FakeEncoder`], a [`FakeHost`] that can expose
//! direct-write, refresh, or both, and a [`Fixture`] that lays out link files
//! and target media in a temp directory.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use evermedia::config::{Config, PersistStrategy};
use evermedia::host::{
    HostError, HostLibrary, HostResult, ItemBinding, ItemKind, ItemUpdateType, ItemWriter,
    LibraryItem, MetadataRefresher, RefreshOptions, RefreshPriority,
};
use evermedia::pipeline::Pipeline;
use evermedia_common::ItemId;
use evermedia_probe::{
    MediaEncoder, MediaInfoRequest, MediaInfoResult, MediaSourceInfo, MediaStreamInfo,
};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// What the fake encoder answers.
#[derive(Debug, Clone)]
pub enum Answer {
    Result(MediaInfoResult),
    Fail(String),
}

/// Scripted media encoder that records calls and detects overlapping probes
/// of the same path.
pub struct FakeEncoder {
    answer: Mutex<Answer>,
    delay: Duration,
    calls: AtomicUsize,
    seen: Mutex<Vec<PathBuf>>,
    active: Mutex<HashMap<PathBuf, usize>>,
    overlapped: AtomicBool,
}

impl FakeEncoder {
    pub fn new(answer: Answer) -> Arc<Self> {
        Self::with_delay(answer, Duration::ZERO)
    }

    pub fn with_delay(answer: Answer, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            answer: Mutex::new(answer),
            delay,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            active: Mutex::new(HashMap::new()),
            overlapped: AtomicBool::new(false),
        })
    }

    /// Answers with a two-stream video probe of `runtime_ticks`.
    pub fn video(runtime_ticks: i64) -> Arc<Self> {
        Self::new(Answer::Result(video_result(runtime_ticks)))
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Self::new(Answer::Fail(message.to_string()))
    }

    pub fn set_answer(&self, answer: Answer) {
        *self.answer.lock().unwrap() = answer;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<PathBuf> {
        self.seen.lock().unwrap().clone()
    }

    /// Whether two probes of the same path ever ran at once.
    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaEncoder for FakeEncoder {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn get_media_info(
        &self,
        request: &MediaInfoRequest,
    ) -> evermedia_probe::Result<MediaInfoResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.path.clone());

        {
            let mut active = self.active.lock().unwrap();
            let count = active.entry(request.path.clone()).or_insert(0);
            if *count > 0 {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            *count += 1;
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(count) = self.active.lock().unwrap().get_mut(&request.path) {
            *count -= 1;
        }

        match self.answer.lock().unwrap().clone() {
            Answer::Result(result) => Ok(result),
            Answer::Fail(message) => Err(evermedia_probe::Error::tool_failed("fake", message)),
        }
    }
}

/// A probe result with one mkv source: h264 video at index 0, aac audio at 1.
pub fn video_result(runtime_ticks: i64) -> MediaInfoResult {
    MediaInfoResult {
        media_sources: Some(vec![MediaSourceInfo {
            protocol: Some("File".into()),
            container: Some("mkv".into()),
            run_time_ticks: Some(runtime_ticks),
            bitrate: Some(8_000_000),
            media_streams: Some(vec![
                MediaStreamInfo {
                    stream_type: "Video".into(),
                    codec: Some("h264".into()),
                    index: Some(0),
                    width: Some(1920),
                    height: Some(1080),
                    ..Default::default()
                },
                MediaStreamInfo {
                    stream_type: "Audio".into(),
                    codec: Some("aac".into()),
                    index: Some(1),
                    channels: Some(2),
                    language: Some("eng".into()),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        }]),
        chapters: Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// In-memory host with switchable capabilities.
pub struct FakeHost {
    items: Mutex<HashMap<ItemId, LibraryItem>>,
    direct: bool,
    refresh: bool,
    /// What a queued refresh stores on the item. `None` means the refresh
    /// never produces media sources.
    refresh_sources: Mutex<Option<Vec<MediaSourceInfo>>>,
    /// How long a queued refresh takes to land. Zero lands it immediately.
    refresh_delay: Mutex<Duration>,
    pending_refresh: Mutex<Option<(ItemId, Instant)>>,
    commit_error: Mutex<Option<String>>,
    commits: Mutex<Vec<(LibraryItem, ItemUpdateType)>>,
    refreshes: Mutex<Vec<(ItemId, RefreshOptions, RefreshPriority)>>,
}

impl FakeHost {
    fn build(direct: bool, refresh: bool) -> Arc<Self> {
        Arc::new(Self {
            items: Mutex::new(HashMap::new()),
            direct,
            refresh,
            refresh_sources: Mutex::new(None),
            refresh_delay: Mutex::new(Duration::ZERO),
            pending_refresh: Mutex::new(None),
            commit_error: Mutex::new(None),
            commits: Mutex::new(Vec::new()),
            refreshes: Mutex::new(Vec::new()),
        })
    }

    /// A host exposing only direct write + commit.
    pub fn direct() -> Arc<Self> {
        Self::build(true, false)
    }

    /// A host exposing only refresh + read-back.
    pub fn refresh_only() -> Arc<Self> {
        Self::build(false, true)
    }

    pub fn both() -> Arc<Self> {
        Self::build(true, true)
    }

    pub fn none() -> Arc<Self> {
        Self::build(false, false)
    }

    pub fn add_item(&self, path: &Path, kind: ItemKind) -> ItemBinding {
        let item = LibraryItem {
            id: ItemId::new(),
            name: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: path.to_path_buf(),
            parent_id: None,
            kind,
            run_time_ticks: None,
            media_sources: Vec::new(),
            date_modified: Utc::now(),
        };
        let binding = item.binding();
        self.items.lock().unwrap().insert(item.id, item);
        binding
    }

    pub fn add_video(&self, path: &Path) -> ItemBinding {
        self.add_item(path, ItemKind::Video)
    }

    pub fn remove_item(&self, id: ItemId) {
        self.items.lock().unwrap().remove(&id);
    }

    pub fn set_refresh_sources(&self, sources: Vec<MediaSourceInfo>) {
        *self.refresh_sources.lock().unwrap() = Some(sources);
    }

    /// Make queued refreshes land only after `delay`, like a host worker queue.
    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock().unwrap() = delay;
    }

    /// Seed the media sources an item already has.
    pub fn set_media_sources(&self, id: ItemId, sources: Vec<MediaSourceInfo>) {
        if let Some(item) = self.items.lock().unwrap().get_mut(&id) {
            item.media_sources = sources;
        }
    }

    /// Store the refresh result on the item, as the host does when its
    /// refresh completes.
    fn land_refresh(&self, id: ItemId) {
        if let Some(sources) = self.refresh_sources.lock().unwrap().clone() {
            if let Some(item) = self.items.lock().unwrap().get_mut(&id) {
                item.media_sources = sources;
                item.date_modified = Utc::now();
            }
        }
    }

    fn land_due_refresh(&self) {
        let due = {
            let mut pending = self.pending_refresh.lock().unwrap();
            match *pending {
                Some((id, at)) if Instant::now() >= at => {
                    *pending = None;
                    Some(id)
                }
                _ => None,
            }
        };
        if let Some(id) = due {
            self.land_refresh(id);
        }
    }

    pub fn reject_commits(&self, message: &str) {
        *self.commit_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn item(&self, id: ItemId) -> Option<LibraryItem> {
        self.items.lock().unwrap().get(&id).cloned()
    }

    pub fn commits(&self) -> Vec<(LibraryItem, ItemUpdateType)> {
        self.commits.lock().unwrap().clone()
    }

    pub fn refreshes(&self) -> Vec<(ItemId, RefreshOptions, RefreshPriority)> {
        self.refreshes.lock().unwrap().clone()
    }

    /// Commits plus refresh requests.
    pub fn persistence_calls(&self) -> usize {
        self.commits.lock().unwrap().len() + self.refreshes.lock().unwrap().len()
    }
}

#[async_trait]
impl HostLibrary for FakeHost {
    async fn get_item(&self, id: ItemId) -> HostResult<Option<LibraryItem>> {
        self.land_due_refresh();
        Ok(self.item(id))
    }

    fn item_writer(&self) -> Option<&dyn ItemWriter> {
        if self.direct {
            Some(self)
        } else {
            None
        }
    }

    fn refresher(&self) -> Option<&dyn MetadataRefresher> {
        if self.refresh {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl ItemWriter for FakeHost {
    async fn commit(&self, item: &LibraryItem, update: ItemUpdateType) -> HostResult<()> {
        if let Some(message) = self.commit_error.lock().unwrap().clone() {
            return Err(HostError::new(message));
        }
        self.commits.lock().unwrap().push((item.clone(), update));
        self.items.lock().unwrap().insert(item.id, item.clone());
        Ok(())
    }
}

#[async_trait]
impl MetadataRefresher for FakeHost {
    fn queue_refresh(
        &self,
        id: ItemId,
        options: RefreshOptions,
        priority: RefreshPriority,
    ) -> HostResult<()> {
        self.refreshes.lock().unwrap().push((id, options, priority));
        let delay = *self.refresh_delay.lock().unwrap();
        if delay.is_zero() {
            self.land_refresh(id);
        } else {
            *self.pending_refresh.lock().unwrap() = Some((id, Instant::now() + delay));
        }
        Ok(())
    }

    async fn get_media_sources(&self, item: &LibraryItem) -> HostResult<Vec<MediaSourceInfo>> {
        self.land_due_refresh();
        Ok(self
            .item(item.id)
            .map(|item| item.media_sources)
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Filesystem fixture
// ---------------------------------------------------------------------------

/// Temp directory holding link files and their targets.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Create a (fake) media file and return its path.
    pub fn media(&self, name: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, b"not really media").unwrap();
        path
    }

    /// Create a link file with `content` and return its path.
    pub fn link(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    /// A link file pointing at a freshly created media file.
    pub fn linked_media(&self, link_name: &str, media_name: &str) -> (PathBuf, PathBuf) {
        let media = self.media(media_name);
        let link = self.link(link_name, &format!("{}\n", media.display()));
        (link, media)
    }

    pub fn sidecar_for(&self, link: &Path) -> PathBuf {
        let mut name = link.as_os_str().to_owned();
        name.push(".medinfo");
        PathBuf::from(name)
    }

    /// Every file under the fixture directory.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(self.dir.path())
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();
        files.sort();
        files
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Config with short refresh waits suitable for tests.
pub fn test_config(strategy: PersistStrategy) -> Config {
    let mut config = Config::default();
    config.persist.strategy = strategy;
    config.persist.refresh_timeout_secs = 1;
    config.persist.refresh_poll_interval_ms = 20;
    config
}

pub fn pipeline(encoder: Arc<FakeEncoder>, host: Arc<FakeHost>) -> Pipeline {
    pipeline_with(encoder, host, PersistStrategy::Auto)
}

pub fn pipeline_with(
    encoder: Arc<FakeEncoder>,
    host: Arc<FakeHost>,
    strategy: PersistStrategy,
) -> Pipeline {
    Pipeline::from_config(&test_config(strategy), encoder, host)
}
