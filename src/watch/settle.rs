use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Holds link-file changes back until the file has been quiet for the
/// settle duration, so a burst of writes yields one trigger.
pub struct FileSettleTracker {
    /// Last change seen per path
    pending: HashMap<PathBuf, Instant>,
    settle_duration: Duration,
    settled_tx: mpsc::Sender<PathBuf>,
}

impl FileSettleTracker {
    pub fn new(settle_secs: u64, settled_tx: mpsc::Sender<PathBuf>) -> Self {
        Self::with_duration(Duration::from_secs(settle_secs), settled_tx)
    }

    pub fn with_duration(settle_duration: Duration, settled_tx: mpsc::Sender<PathBuf>) -> Self {
        Self {
            pending: HashMap::new(),
            settle_duration,
            settled_tx,
        }
    }

    /// Record that a file was modified
    pub fn file_changed(&mut self, path: PathBuf) {
        self.pending.insert(path, Instant::now());
    }

    /// Send every file that has been quiet long enough
    pub async fn check_settled(&mut self) {
        let now = Instant::now();
        let settled: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, last_change)| now.duration_since(**last_change) >= self.settle_duration)
            .map(|(path, _)| path.clone())
            .collect();

        for path in settled {
            self.pending.remove(&path);
            if let Err(e) = self.settled_tx.send(path.clone()).await {
                tracing::error!("Failed to send settled file: {}", e);
            } else {
                tracing::debug!("Link file settled: {:?}", path);
            }
        }
    }

    /// Stop tracking a file, e.g. after it was deleted
    pub fn remove(&mut self, path: &Path) {
        self.pending.remove(path);
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
