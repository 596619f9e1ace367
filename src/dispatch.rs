//! Fire-and-forget dispatch of library events into pipeline runs.
//!
//! [`EventDispatcher::dispatch`] is synchronous and never waits: it applies
//! the entry filter, pushes the trigger onto a bounded queue and returns. A
//! worker task drains the queue, claims each path through the [`PathGate`]
//! and spawns the run. Results are logged and broadcast as
//! [`PipelineEvent`]s; nothing is reported back to the caller of `dispatch`.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::DispatchConfig;
use crate::host::ItemBinding;
use crate::pipeline::{GatePermit, Outcome, PathGate, Pipeline};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Library event that triggers a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemEvent {
    Added(ItemBinding),
    Updated(ItemBinding),
}

impl ItemEvent {
    pub fn binding(&self) -> &ItemBinding {
        match self {
            ItemEvent::Added(b) | ItemEvent::Updated(b) => b,
        }
    }

    pub fn into_binding(self) -> ItemBinding {
        match self {
            ItemEvent::Added(b) | ItemEvent::Updated(b) => b,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ItemEvent::Added(_) => "added",
            ItemEvent::Updated(_) => "updated",
        }
    }
}

/// Observable progress of dispatched work.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A run reached a terminal state.
    Finished { link_path: PathBuf, outcome: Outcome },
    /// A trigger was folded into the follow-up of an active run.
    Coalesced { link_path: PathBuf },
    /// The queue was full and the trigger was discarded.
    Dropped { link_path: PathBuf },
}

/// Accepts item events and runs the pipeline for them in the background.
pub struct EventDispatcher {
    pipeline: Arc<Pipeline>,
    queue: mpsc::Sender<ItemBinding>,
    events: broadcast::Sender<PipelineEvent>,
    gate: PathGate,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl EventDispatcher {
    /// Create a dispatcher and start its worker. Must be called within a
    /// tokio runtime.
    pub fn new(pipeline: Arc<Pipeline>, config: &DispatchConfig) -> Self {
        let (queue, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let gate = PathGate::new();
        let tracker = TaskTracker::new();
        let cancel = CancellationToken::new();

        let worker = Worker {
            pipeline: Arc::clone(&pipeline),
            gate: gate.clone(),
            slots: Arc::new(Semaphore::new(config.max_concurrent_runs.max(1))),
            tracker: tracker.clone(),
            cancel: cancel.clone(),
            events: events.clone(),
        };
        tracker.spawn(worker.run(rx));

        Self {
            pipeline,
            queue,
            events,
            gate,
            tracker,
            cancel,
        }
    }

    /// Queue a run for `event`. Returns whether the trigger was accepted.
    ///
    /// Never blocks. Non-link items are rejected and a full queue drops the
    /// trigger with a warning.
    pub fn dispatch(&self, event: ItemEvent) -> bool {
        let kind = event.kind();
        let binding = event.into_binding();

        if !self.pipeline.accepts(&binding.path) {
            tracing::debug!(link = %binding.path.display(), event = kind, "not a link file, rejected");
            return false;
        }

        match self.queue.try_send(binding) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(binding)) => {
                tracing::warn!(link = %binding.path.display(), event = kind, "dispatch queue full, dropping trigger");
                let _ = self.events.send(PipelineEvent::Dropped {
                    link_path: binding.path,
                });
                false
            }
            Err(mpsc::error::TrySendError::Closed(binding)) => {
                tracing::warn!(link = %binding.path.display(), event = kind, "dispatcher stopped, dropping trigger");
                false
            }
        }
    }

    /// Queue a run for `event`, waiting for queue capacity instead of
    /// dropping. For bulk producers such as a directory scan.
    pub async fn submit(&self, event: ItemEvent) -> bool {
        let kind = event.kind();
        let binding = event.into_binding();

        if !self.pipeline.accepts(&binding.path) {
            tracing::debug!(link = %binding.path.display(), event = kind, "not a link file, rejected");
            return false;
        }

        if let Err(mpsc::error::SendError(binding)) = self.queue.send(binding).await {
            tracing::warn!(link = %binding.path.display(), event = kind, "dispatcher stopped, dropping trigger");
            return false;
        }
        true
    }

    /// Receive [`PipelineEvent`]s from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Number of link files with a run in flight.
    pub fn active_runs(&self) -> usize {
        self.gate.active()
    }

    /// Signal every run to stop at its next checkpoint and stop taking work.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel all work and wait for running tasks to stop. Queued triggers
    /// are discarded.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Stop accepting triggers and wait for queued and running work to finish.
    pub async fn close(self) {
        let Self { queue, tracker, .. } = self;
        drop(queue);
        tracker.close();
        tracker.wait().await;
    }
}

struct Worker {
    pipeline: Arc<Pipeline>,
    gate: PathGate,
    slots: Arc<Semaphore>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    events: broadcast::Sender<PipelineEvent>,
}

impl Worker {
    async fn run(self, mut rx: mpsc::Receiver<ItemBinding>) {
        loop {
            let binding = tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = rx.recv() => match next {
                    Some(binding) => binding,
                    None => break,
                },
            };

            let Some(permit) = self.gate.try_enter(&binding) else {
                tracing::debug!(link = %binding.path.display(), "run in flight, coalescing trigger");
                let _ = self.events.send(PipelineEvent::Coalesced {
                    link_path: binding.path,
                });
                continue;
            };

            self.tracker.spawn(run_gated(
                Arc::clone(&self.pipeline),
                permit,
                binding,
                Arc::clone(&self.slots),
                self.cancel.clone(),
                self.events.clone(),
            ));
        }
        tracing::debug!("dispatch worker stopped");
    }
}

/// Run the pipeline for `binding`, then for each coalesced follow-up, while
/// holding the path's permit.
async fn run_gated(
    pipeline: Arc<Pipeline>,
    mut permit: GatePermit,
    mut binding: ItemBinding,
    slots: Arc<Semaphore>,
    cancel: CancellationToken,
    events: broadcast::Sender<PipelineEvent>,
) {
    loop {
        let outcome = {
            let Ok(_slot) = slots.acquire().await else {
                return;
            };
            pipeline.run(&binding, &cancel).await
        };

        let _ = events.send(PipelineEvent::Finished {
            link_path: binding.path.clone(),
            outcome,
        });

        match permit.complete() {
            Some(next) => {
                tracing::debug!(link = %permit.path().display(), "running coalesced follow-up");
                binding = next;
            }
            None => break,
        }
    }
}
