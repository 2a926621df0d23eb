//! Mount lifecycle → workspace watch lifecycle.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use gobzl_core::{GobzlResult, Invalidator};
use gobzl_fuse::MountHooks;
use gobzl_watch::{BuildRunner, ChangeReactor, WatchHandle};
use tracing::debug;

/// Starts the watch when the kernel finishes mounting, stops it on unmount.
pub struct WatchHooks<I: Invalidator, R: BuildRunner> {
    root: PathBuf,
    capacity: usize,
    reactor: Arc<ChangeReactor<I, R>>,
    handle: Mutex<Option<WatchHandle>>,
}

impl<I: Invalidator + 'static, R: BuildRunner + 'static> WatchHooks<I, R> {
    pub fn new(root: PathBuf, capacity: usize, reactor: Arc<ChangeReactor<I, R>>) -> Self {
        WatchHooks {
            root,
            capacity,
            reactor,
            handle: Mutex::new(None),
        }
    }

    pub fn is_watching(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

impl<I: Invalidator + 'static, R: BuildRunner + 'static> MountHooks for WatchHooks<I, R> {
    fn on_mount(&self) -> GobzlResult<()> {
        let mut slot = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            debug!("watch already running");
            return Ok(());
        }
        *slot = Some(gobzl_watch::spawn(&self.root, self.capacity, self.reactor.clone())?);
        Ok(())
    }

    fn on_unmount(&self) {
        let handle = self.handle.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            handle.stop();
        }
    }
}
