//! Pipeline orchestration for a single link-file trigger.
//!
//! A run walks `Received -> Resolved -> {Skipped | Probed -> cache -> persist -> Done}`
//! and ends in exactly one [`Outcome`]. Stage failures are logged and turned
//! into an outcome; nothing propagates back to whoever triggered the run.

pub mod gate;

pub use gate::{GatePermit, PathGate};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use evermedia_common::paths::is_link_file;
use evermedia_common::{CacheError, MediaSourceRecord, PersistError, ProbeFailure, ResolutionError};
use evermedia_probe::MediaEncoder;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::host::{HostLibrary, ItemBinding};
use crate::prober::{ProbeOutput, ProberAdapter};
use crate::reconcile::{PersistOutcome, Reconciler};
use crate::resolver::{self, MediaTarget, TargetKind};
use crate::sidecar::{SidecarCache, SidecarRecord};

/// Pipeline stage, used to label failures and cancellations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Probe,
    Cache,
    Persist,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Resolve => "resolve",
            Stage::Probe => "probe",
            Stage::Cache => "cache",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// Why a run stopped without probing. Not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The link points at a network URL.
    Remote(String),
    /// The link is unreadable, empty, or points at a missing file.
    Invalid(ResolutionError),
}

/// The error that terminated a run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Probe(#[from] ProbeFailure),

    #[error(transparent)]
    Persist(#[from] PersistError),

    /// A blocking task backing a stage panicked or was aborted.
    #[error("stage task failed: {0}")]
    Task(String),
}

/// What the persist stage did for a completed run.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistStatus {
    /// Media sources were written to the item and committed.
    Committed,
    /// The host refreshed the item; the sidecar holds what it stored.
    Refreshed(MediaSourceRecord),
    /// Persistence was skipped for this item (unsupported item type).
    Skipped(PersistError),
}

/// Details of a run that got past probing.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub link_path: PathBuf,
    /// Local path that was probed.
    pub target: String,
    /// The probed record.
    pub record: MediaSourceRecord,
    /// Where the sidecar was written, or why it was not.
    pub sidecar: Result<PathBuf, CacheError>,
    pub persist: PersistStatus,
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The path is not a link file. The state machine never started.
    Rejected,
    Skipped(SkipReason),
    Done(Box<RunReport>),
    Failed { stage: Stage, error: StageError },
    Cancelled { stage: Stage },
}

impl Outcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped(_))
    }

    /// Short label for logs and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Rejected => "rejected",
            Outcome::Skipped(_) => "skipped",
            Outcome::Done(_) => "done",
            Outcome::Failed { .. } => "failed",
            Outcome::Cancelled { .. } => "cancelled",
        }
    }
}

/// Resolve, probe, cache and persist for one link file at a time.
pub struct Pipeline {
    link_extension: String,
    sidecar: SidecarCache,
    prober: ProberAdapter,
    reconciler: Reconciler,
}

impl Pipeline {
    pub fn new(
        link_extension: impl Into<String>,
        sidecar: SidecarCache,
        prober: ProberAdapter,
        reconciler: Reconciler,
    ) -> Self {
        Self {
            link_extension: link_extension.into(),
            sidecar,
            prober,
            reconciler,
        }
    }

    /// Wire a pipeline from configuration.
    pub fn from_config(
        config: &Config,
        encoder: Arc<dyn MediaEncoder>,
        library: Arc<dyn HostLibrary>,
    ) -> Self {
        let prober = ProberAdapter::new(encoder)
            .with_chapters(config.probe.extract_chapters)
            .with_media_type(config.probe.media_type.clone());

        Self::new(
            config.library.link_extension.clone(),
            SidecarCache::new(config.library.sidecar_suffix.clone()),
            prober,
            Reconciler::new(library, &config.persist),
        )
    }

    /// Entry filter: only link files are processed.
    pub fn accepts(&self, path: &Path) -> bool {
        is_link_file(path, &self.link_extension)
    }

    pub fn link_extension(&self) -> &str {
        &self.link_extension
    }

    pub fn sidecar(&self) -> &SidecarCache {
        &self.sidecar
    }

    /// Run the pipeline for the item bound to a link file.
    pub async fn run(&self, binding: &ItemBinding, cancel: &CancellationToken) -> Outcome {
        let link = binding.path.as_path();

        if !self.accepts(link) {
            tracing::debug!(link = %link.display(), "not a link file, ignoring");
            return Outcome::Rejected;
        }

        let target = match resolve_blocking(link).await {
            Ok(target) => target,
            Err(error) => return fail(link, Stage::Resolve, error),
        };

        let target_path = match target.kind {
            TargetKind::Local => PathBuf::from(&target.path),
            TargetKind::Remote => {
                tracing::info!(link = %link.display(), target = %target.path, "remote target, skipping");
                return Outcome::Skipped(SkipReason::Remote(target.path));
            }
            TargetKind::Invalid(reason) => {
                tracing::info!(link = %link.display(), %reason, "no usable target, skipping");
                return Outcome::Skipped(SkipReason::Invalid(reason));
            }
        };

        if cancel.is_cancelled() {
            return cancelled(link, Stage::Probe);
        }

        let probed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return cancelled(link, Stage::Probe),
            result = self.prober.probe(&target_path) => result,
        };

        let ProbeOutput { record, chapters } = match probed {
            Ok(output) => output,
            Err(failure @ ProbeFailure::NoMediaSources { .. }) => {
                tracing::warn!(link = %link.display(), "{}", failure);
                return Outcome::Failed {
                    stage: Stage::Probe,
                    error: failure.into(),
                };
            }
            Err(failure) => return fail(link, Stage::Probe, failure.into()),
        };

        if cancel.is_cancelled() {
            return cancelled(link, Stage::Cache);
        }

        let sidecar_record = SidecarRecord::new(record.clone()).with_chapters(chapters);
        let mut sidecar = self.sidecar.write_async(link, sidecar_record.clone()).await;
        if let Err(e) = &sidecar {
            tracing::warn!(link = %link.display(), error = %e, "sidecar write failed, continuing to persist");
        }

        if cancel.is_cancelled() {
            return cancelled(link, Stage::Persist);
        }

        let persist = match self.reconciler.persist(binding, &record, cancel).await {
            Ok(PersistOutcome::Committed) => PersistStatus::Committed,
            Ok(PersistOutcome::Refreshed(stored)) => {
                // Cache what the host actually stored.
                let refreshed = SidecarRecord {
                    media_source: stored.clone(),
                    ..sidecar_record
                };
                sidecar = self.sidecar.write_async(link, refreshed).await;
                if let Err(e) = &sidecar {
                    tracing::warn!(link = %link.display(), error = %e, "sidecar rewrite after refresh failed");
                }
                PersistStatus::Refreshed(stored)
            }
            Err(PersistError::Cancelled { .. }) => return cancelled(link, Stage::Persist),
            Err(e) if e.is_skip() => {
                tracing::warn!(link = %link.display(), error = %e, "persistence skipped");
                PersistStatus::Skipped(e)
            }
            Err(e @ PersistError::RefreshTimeout { .. }) => {
                tracing::warn!(link = %link.display(), error = %e, "host has no media sources yet");
                return Outcome::Failed {
                    stage: Stage::Persist,
                    error: e.into(),
                };
            }
            Err(e) => return fail(link, Stage::Persist, e.into()),
        };

        tracing::info!(
            link = %link.display(),
            target = %target_path.display(),
            runtime_ticks = ?record.runtime_ticks,
            streams = record.streams.len(),
            "media info stored"
        );

        Outcome::Done(Box::new(RunReport {
            link_path: link.to_path_buf(),
            target: target.path,
            record,
            sidecar,
            persist,
        }))
    }
}

async fn resolve_blocking(link: &Path) -> Result<MediaTarget, StageError> {
    let link = link.to_path_buf();
    tokio::task::spawn_blocking(move || resolver::resolve(&link))
        .await
        .map_err(|e| StageError::Task(e.to_string()))
}

fn fail(link: &Path, stage: Stage, error: StageError) -> Outcome {
    tracing::error!(link = %link.display(), %stage, %error, "pipeline failed");
    Outcome::Failed { stage, error }
}

fn cancelled(link: &Path, stage: Stage) -> Outcome {
    tracing::info!(link = %link.display(), %stage, "pipeline cancelled");
    Outcome::Cancelled { stage }
}
