//! Error taxonomy for the link-file pipeline.
//!
//! Each pipeline stage has its own error type. Causes are carried as strings
//! so stage outcomes stay `Clone` and can be broadcast to observers after a
//! run finishes.

use std::path::PathBuf;

/// Why a link file could not be resolved to a usable local target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    /// The link file itself could not be read.
    #[error("link file unreadable: {}: {message}", path.display())]
    Unreadable { path: PathBuf, message: String },

    /// The link file is empty or only whitespace.
    #[error("link file is empty: {}", path.display())]
    Empty { path: PathBuf },

    /// The local path named by the link file does not exist.
    #[error("link target does not exist: {target}")]
    TargetMissing { target: String },
}

/// Why probing a resolved target did not yield a media source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeFailure {
    /// The prober answered but returned no media sources.
    #[error("prober returned no media sources for {target}")]
    NoMediaSources { target: String },

    /// The prober reported an error.
    #[error("probe failed for {target}: {cause}")]
    ProbeError { target: String, cause: String },

    /// The target disappeared between resolution and probing.
    #[error("target vanished before probing: {target}")]
    TargetVanished { target: String },
}

impl ProbeFailure {
    /// Create a prober error.
    pub fn probe_error(target: impl Into<String>, cause: impl ToString) -> Self {
        Self::ProbeError {
            target: target.into(),
            cause: cause.to_string(),
        }
    }
}

/// Failures writing or reading a sidecar file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// No sidecar exists for the link file.
    #[error("no sidecar at {}", path.display())]
    NotFound { path: PathBuf },

    /// The sidecar could not be written or renamed into place.
    #[error("failed to write sidecar {}: {message}", path.display())]
    Write { path: PathBuf, message: String },

    /// The sidecar could not be read.
    #[error("failed to read sidecar {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    /// The record could not be encoded or the sidecar could not be decoded.
    #[error("sidecar serialization failed: {0}")]
    Serialization(String),
}

/// Failures reconciling a record into the host's metadata store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistError {
    /// The host no longer knows the item bound to the link file.
    #[error("library item not found: {item}")]
    ItemNotFound { item: String },

    /// The item is not of a kind that carries media sources.
    #[error("item {item} of type {kind} does not support media sources")]
    UnsupportedItemType { item: String, kind: String },

    /// The host rejected the commit or refresh request.
    #[error("host rejected update for {item}: {cause}")]
    CommitFailed { item: String, cause: String },

    /// A triggered refresh produced no media sources within the wait window.
    #[error("no media sources for {item} after waiting {waited_ms}ms")]
    RefreshTimeout { item: String, waited_ms: u64 },

    /// The host exposes neither a direct-write nor a refresh capability.
    #[error("host exposes no persistence capability")]
    NoCapability,

    /// The run was cancelled while waiting on the host.
    #[error("persist cancelled for {item}")]
    Cancelled { item: String },
}

impl PersistError {
    /// Whether this error means "skip persistence" rather than a failure.
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::UnsupportedItemType { .. })
    }
}
