//! Recursive workspace watch feeding a single reactor task.
//!
//! notify callback thread ──(bounded mpsc)──▶ consumer task ──▶ ChangeReactor
//!
//! The consumer handles one event at a time in arrival order. When it falls
//! behind, the bounded queue fills and the callback thread blocks; whatever
//! the OS backend does under that pressure is what happens.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use gobzl_core::{ChangeEvent, ChangeKind, GobzlError, GobzlResult, Invalidator};
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::exec::BuildRunner;
use crate::reactor::ChangeReactor;

/// A running watch. Dropping it stops delivery and the consumer task.
pub struct WatchHandle {
    root: PathBuf,
    _watcher: RecommendedWatcher,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop watching. Build commands already running are left to finish.
    pub fn stop(self) {
        info!(root = %self.root.display(), "stopping workspace watch");
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Map a notify event kind to the kinds this crate reacts to.
///
/// A rename arrives as `From` and `To` halves followed by a `Both` event
/// repeating the same paths; only the halves are kept.
pub fn classify(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Create),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => None,
        EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Rename),
        _ => None,
    }
}

/// Start watching `root` recursively and feed events to `reactor`.
///
/// Must be called from within a tokio runtime. Fails with
/// [`GobzlError::Watch`] if the OS watch cannot be established.
pub fn spawn<I, R>(
    root: &Path,
    capacity: usize,
    reactor: Arc<ChangeReactor<I, R>>,
) -> GobzlResult<WatchHandle>
where
    I: Invalidator + 'static,
    R: BuildRunner + 'static,
{
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| GobzlError::Watch(format!("no tokio runtime: {e}")))?;

    let (tx, mut rx) = mpsc::channel::<ChangeEvent>(capacity.max(1));
    let callback_root = root.to_path_buf();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    warn!("watch error: {e}");
                    return;
                }
            };
            let Some(kind) = classify(&event.kind) else {
                return;
            };
            for path in &event.paths {
                if let Some(change) = ChangeEvent::under_root(&callback_root, path, kind) {
                    // Closed channel means the consumer is gone; drop silently.
                    let _ = tx.blocking_send(change);
                }
            }
        },
        Config::default(),
    )
    .map_err(|e| GobzlError::Watch(format!("creating watcher: {e}")))?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|e| GobzlError::Watch(format!("watching {}: {e}", root.display())))?;

    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();
    let task = runtime.spawn(async move {
        loop {
            tokio::select! {
                _ = task_cancel.cancelled() => break,
                next = rx.recv() => {
                    let Some(event) = next else { break };
                    let reactor = reactor.clone();
                    // Build tools block; keep them off the async workers but
                    // still one event at a time.
                    if let Err(e) = tokio::task::spawn_blocking(move || reactor.handle(&event)).await {
                        warn!("reactor panicked: {e}");
                    }
                }
            }
        }
        debug!("watch consumer stopped");
    });

    info!(root = %root.display(), capacity, "watching workspace");

    Ok(WatchHandle {
        root: root.to_path_buf(),
        _watcher: watcher,
        cancel,
        task,
    })
}
