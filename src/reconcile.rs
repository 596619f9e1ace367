//! Reconciliation of probed records into the host's authoritative store.
//!
//! Two strategies exist because hosts differ in what they expose:
//!
//! - **Direct**: replace the item's media sources with a single entry built
//!   from the record, copy its runtime onto the item, and commit through the
//!   host's `MetadataEdit` transition.
//! - **Refresh**: queue a full host-side refresh, then poll the item until the
//!   refresh has landed or the timeout expires. Sources present before the
//!   refresh do not count unless the item's modification stamp moved. The
//!   read-back source is returned so the caller can cache what the host
//!   actually stored.
//!
//! In both cases the media-source path written to the host is the link file's
//! own path. The host indexes items by that path, so writing the target path
//! would detach the source from its item.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use evermedia_common::{MediaSourceRecord, PersistError};
use evermedia_probe::MediaSourceInfo;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::{PersistConfig, PersistStrategy};
use crate::host::{
    HostError, HostLibrary, HostResult, ItemBinding, ItemUpdateType, ItemWriter, LibraryItem, MetadataRefresher,
    RefreshOptions, RefreshPriority,
};
use crate::prober::normalize_source;

/// What a successful persist did.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome {
    /// Media sources and runtime were written and committed.
    Committed,
    /// The host refreshed the item itself; this is what it stored.
    Refreshed(MediaSourceRecord),
}

enum Capability<'a> {
    Direct(&'a dyn ItemWriter),
    Refresh(&'a dyn MetadataRefresher),
}

/// Writes probed records into a [`HostLibrary`].
pub struct Reconciler {
    library: Arc<dyn HostLibrary>,
    strategy: PersistStrategy,
    refresh_timeout: Duration,
    poll_interval: Duration,
}

impl Reconciler {
    pub fn new(library: Arc<dyn HostLibrary>, config: &PersistConfig) -> Self {
        Self {
            library,
            strategy: config.strategy,
            refresh_timeout: config.refresh_timeout(),
            poll_interval: config.refresh_poll_interval(),
        }
    }

    /// Persist `record` for the item bound to a link file.
    ///
    /// `cancel` interrupts the wait for a host refresh. A direct commit is
    /// never interrupted once started.
    pub async fn persist(
        &self,
        binding: &ItemBinding,
        record: &MediaSourceRecord,
        cancel: &CancellationToken,
    ) -> Result<PersistOutcome, PersistError> {
        let item_key = binding.id.to_string();

        let item = self
            .library
            .get_item(binding.id)
            .await
            .map_err(|e| PersistError::CommitFailed {
                item: item_key.clone(),
                cause: format!("item lookup failed: {e}"),
            })?
            .ok_or_else(|| PersistError::ItemNotFound {
                item: item_key.clone(),
            })?;

        if item.path != binding.path {
            tracing::debug!(
                item = %item_key,
                bound = %binding.path.display(),
                current = %item.path.display(),
                "item binding is stale"
            );
            return Err(PersistError::ItemNotFound { item: item_key });
        }

        if !item.kind.supports_media_sources() {
            return Err(PersistError::UnsupportedItemType {
                item: item_key,
                kind: item.kind.to_string(),
            });
        }

        match self.capability()? {
            Capability::Direct(writer) => self.write_direct(writer, item, record).await,
            Capability::Refresh(refresher) => self.refresh(refresher, item, record, cancel).await,
        }
    }

    fn capability(&self) -> Result<Capability<'_>, PersistError> {
        let writer = self.library.item_writer();
        let refresher = self.library.refresher();

        match (self.strategy, writer, refresher) {
            (PersistStrategy::Auto | PersistStrategy::Direct, Some(w), _) => Ok(Capability::Direct(w)),
            (PersistStrategy::Auto | PersistStrategy::Refresh, _, Some(r)) => Ok(Capability::Refresh(r)),
            _ => Err(PersistError::NoCapability),
        }
    }

    async fn write_direct(
        &self,
        writer: &dyn ItemWriter,
        mut item: LibraryItem,
        record: &MediaSourceRecord,
    ) -> Result<PersistOutcome, PersistError> {
        let source = to_host_source(record, &item.path).map_err(|cause| {
            PersistError::CommitFailed {
                item: item.id.to_string(),
                cause,
            }
        })?;

        item.set_media_sources(vec![source]);
        item.run_time_ticks = record
            .runtime_ticks
            .map(|t| i64::try_from(t).unwrap_or(i64::MAX));

        writer
            .commit(&item, ItemUpdateType::MetadataEdit)
            .await
            .map_err(|e| PersistError::CommitFailed {
                item: item.id.to_string(),
                cause: e.to_string(),
            })?;

        Ok(PersistOutcome::Committed)
    }

    async fn refresh(
        &self,
        refresher: &dyn MetadataRefresher,
        item: LibraryItem,
        record: &MediaSourceRecord,
        cancel: &CancellationToken,
    ) -> Result<PersistOutcome, PersistError> {
        let item_key = item.id.to_string();
        let host_failed = |e: HostError| PersistError::CommitFailed {
            item: item_key.clone(),
            cause: e.to_string(),
        };

        let baseline = refresher.get_media_sources(&item).await.map_err(host_failed)?;

        refresher
            .queue_refresh(item.id, RefreshOptions::full(), RefreshPriority::High)
            .map_err(host_failed)?;

        let started = Instant::now();
        let wait = async {
            loop {
                if let Some(source) = self
                    .refreshed_source(refresher, &item, &baseline, item.date_modified)
                    .await?
                {
                    return Ok::<_, HostError>(source);
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };

        let waited = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(PersistError::Cancelled { item: item_key.clone() });
            }
            waited = tokio::time::timeout(self.refresh_timeout, wait) => waited,
        };

        match waited {
            Ok(Ok(source)) => Ok(PersistOutcome::Refreshed(normalize_source(
                &record.source_path,
                &source,
            ))),
            Ok(Err(e)) => Err(host_failed(e)),
            Err(_) => Err(PersistError::RefreshTimeout {
                item: item_key.clone(),
                waited_ms: started.elapsed().as_millis() as u64,
            }),
        }
    }

    /// The first media source once the refresh has landed.
    ///
    /// Landed means the sources differ from `baseline`, or the item was
    /// modified after `since` (a refresh that found identical media).
    async fn refreshed_source(
        &self,
        refresher: &dyn MetadataRefresher,
        item: &LibraryItem,
        baseline: &[MediaSourceInfo],
        since: DateTime<Utc>,
    ) -> HostResult<Option<MediaSourceInfo>> {
        let sources = refresher.get_media_sources(item).await?;
        if sources.is_empty() {
            return Ok(None);
        }

        let landed = sources != baseline
            || self
                .library
                .get_item(item.id)
                .await?
                .is_some_and(|current| current.date_modified > since);

        Ok(if landed { sources.into_iter().next() } else { None })
    }
}

/// Build the host-shaped media source for a record, pinned to `link_path`.
pub(crate) fn to_host_source(
    record: &MediaSourceRecord,
    link_path: &Path,
) -> Result<MediaSourceInfo, String> {
    let mut value = serde_json::to_value(record).map_err(|e| e.to_string())?;
    if let Value::Object(map) = &mut value {
        map.insert(
            "Path".to_string(),
            Value::String(link_path.to_string_lossy().into_owned()),
        );
    }
    serde_json::from_value(value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use evermedia_common::{MediaProtocol, MediaStream, StreamType};
    use serde_json::Map;

    #[test]
    fn test_host_source_path_is_link_path() {
        let mut extra = Map::new();
        extra.insert("Bitrate".into(), Value::from(4_000_000u64));
        let record = MediaSourceRecord {
            source_path: "/mnt/real/Show.mkv".into(),
            container: Some("mkv".into()),
            runtime_ticks: Some(72_000_000_000),
            streams: vec![MediaStream::new(StreamType::Subtitle, Some("ass".into()), 2)],
            protocol: MediaProtocol::File,
            extra,
        };

        let source = to_host_source(&record, Path::new("/media/Show.strm")).unwrap();
        assert_eq!(source.path.as_deref(), Some("/media/Show.strm"));
        assert_eq!(source.run_time_ticks, Some(72_000_000_000));
        assert_eq!(source.bitrate, Some(4_000_000));
        assert_eq!(source.protocol.as_deref(), Some("File"));
        let streams = source.media_streams.unwrap();
        assert_eq!(streams[0].stream_type, "Subtitle");
        assert_eq!(streams[0].index, Some(2));
    }
}
