//! Watch Loop: observes a profile's source paths and re-runs its chain on
//! change.
//!
//! The loop is an explicit state machine (`Watching → ReRunning →
//! Watching`, terminal `Closed`) driven by events from a [`WatchBackend`],
//! so it is decoupled from any specific notification mechanism. Closing is
//! the caller's responsibility; the system never auto-terminates a
//! watcher, and a transform failure never stops one.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use notify::Watcher as _;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use stak_shared::{BundleRecord, Result, StakError};

use crate::context::RunContext;
use crate::fanout;
use crate::registry::BundlerRegistry;

/// Event emitted by a watch backend.
#[derive(Debug)]
pub enum WatchEvent {
    /// The backend finished its initial scan and is observing.
    Ready,
    /// An observed path changed.
    Changed(PathBuf),
    /// A backend error; always non-fatal for the loop.
    Error(String),
}

/// A live event stream plus whatever keeps the underlying watcher alive.
pub struct WatchSubscription {
    pub events: mpsc::UnboundedReceiver<WatchEvent>,
    _guard: Box<dyn std::any::Any + Send>,
}

impl WatchSubscription {
    /// Wrap an event receiver, keeping `guard` alive for the subscription
    /// lifetime (tests pass `()` and drive the channel by hand).
    pub fn new(
        events: mpsc::UnboundedReceiver<WatchEvent>,
        guard: impl std::any::Any + Send,
    ) -> Self {
        Self {
            events,
            _guard: Box::new(guard),
        }
    }
}

/// A source of change events for a set of paths.
pub trait WatchBackend: Send + Sync {
    fn subscribe(&self, paths: &[PathBuf]) -> Result<WatchSubscription>;
}

/// Default backend over the `notify` crate's recommended watcher.
#[derive(Debug, Default)]
pub struct NotifyBackend;

impl WatchBackend for NotifyBackend {
    fn subscribe(&self, paths: &[PathBuf]) -> Result<WatchSubscription> {
        let (tx, rx) = mpsc::unbounded_channel();

        let event_tx = tx.clone();
        let mut watcher = notify::recommended_watcher(
            move |result: notify::Result<notify::Event>| match result {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    for path in event.paths {
                        let _ = event_tx.send(WatchEvent::Changed(path));
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    let _ = event_tx.send(WatchEvent::Error(e.to_string()));
                }
            },
        )
        .map_err(|e| StakError::Watch(e.to_string()))?;

        for path in paths {
            watcher
                .watch(path, notify::RecursiveMode::Recursive)
                .map_err(|e| StakError::Watch(format!("{}: {e}", path.display())))?;
        }

        // notify has no separate ready signal; all paths registered is it.
        let _ = tx.send(WatchEvent::Ready);
        Ok(WatchSubscription::new(rx, watcher))
    }
}

/// Watch-loop states. `Closed` is terminal and reached only by an
/// explicit [`WatcherHandle::close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchState {
    Watching,
    ReRunning,
    Closed,
}

/// Caller-owned handle to a running watch loop.
///
/// Dropping the handle also stops the loop (the shutdown channel closes),
/// but `close` makes the intent explicit and is idempotent.
#[derive(Debug)]
pub struct WatcherHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl WatcherHandle {
    /// Stop future trigger cycles. An in-flight re-run is not aborted.
    pub fn close(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }

    /// Close and wait for the loop task to finish.
    pub async fn closed(mut self) {
        self.close();
        let _ = (&mut self.task).await;
    }
}

/// Attach a watcher to a normalized profile record.
///
/// Observes the union of the resolved `source` paths and any explicit
/// `watch_paths`. On every change the profile's content is cleared and
/// its full fan-out chain re-runs.
pub fn spawn(
    record: BundleRecord,
    registry: Arc<BundlerRegistry>,
    backend: &dyn WatchBackend,
) -> Result<WatcherHandle> {
    let paths: Vec<PathBuf> = record
        .source
        .iter()
        .chain(record.watch_paths.iter())
        .map(|path| {
            if path.is_absolute() {
                path.clone()
            } else {
                record.cwd.join(path)
            }
        })
        .collect();

    let subscription = backend.subscribe(&paths)?;
    Ok(spawn_with(record, registry, subscription))
}

/// Run the watch loop over an already-established subscription.
pub fn spawn_with(
    mut record: BundleRecord,
    registry: Arc<BundlerRegistry>,
    mut subscription: WatchSubscription,
) -> WatcherHandle {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        let mut state = WatchState::Watching;
        debug!(profile = %record.id, ?state, "watch loop started");
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    state = WatchState::Closed;
                    debug!(profile = %record.id, ?state, "watcher closed");
                    break;
                }
                event = subscription.events.recv() => match event {
                    None => {
                        debug!(profile = %record.id, "watch backend went away");
                        break;
                    }
                    Some(WatchEvent::Ready) => {
                        // hasWatcher flips false→true exactly once per
                        // profile lifetime; later ready events stay quiet.
                        if !record.has_watcher {
                            record.has_watcher = true;
                            info!(profile = %record.id, paths = record.source.len(), "watching for changes");
                        }
                    }
                    Some(WatchEvent::Error(message)) => {
                        warn!(profile = %record.id, %message, "watch error (non-fatal)");
                    }
                    Some(WatchEvent::Changed(path)) => {
                        state = WatchState::ReRunning;
                        debug!(profile = %record.id, ?state, changed = %path.display(), "re-running");

                        let started = Instant::now();
                        // A change event proves a watcher is attached even
                        // if its ready event was missed; the flag also lets
                        // a content-seeded record pass validation below.
                        record.has_watcher = true;
                        // Force bundlers to recompute instead of re-appending.
                        record.content.clear();

                        let ctx = RunContext::new(registry.clone());
                        match fanout::run_profile(record.clone(), &ctx).await {
                            Ok(_) => info!(
                                profile = %record.id,
                                changed = %path.display(),
                                elapsed_ms = started.elapsed().as_millis(),
                                "re-stak complete"
                            ),
                            Err(e) => error!(
                                profile = %record.id,
                                error = %e,
                                "re-stak failed; still watching"
                            ),
                        }
                        state = WatchState::Watching;
                        debug!(profile = %record.id, ?state, "back to watching");
                    }
                },
            }
        }
    });

    WatcherHandle {
        shutdown: Some(shutdown_tx),
        task,
    }
}
