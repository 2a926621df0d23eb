//! Pending invalidations — virtual paths whose kernel-cached state is stale.
//!
//! The change reactor marks a path; the next `getattr`/`lookup`/`readdirplus`
//! reply for that path (and for its parent directory, whose listing changed)
//! is sent with a zero TTL so the kernel asks again instead of trusting its
//! cache.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use gobzl_core::Invalidator;
use tracing::trace;

/// Thread-safe set of stale virtual paths, expiring after `window`.
pub struct InvalidationSet {
    entries: Mutex<HashMap<String, Instant>>,
    window: Duration,
}

impl InvalidationSet {
    /// Entries older than `window` are dropped: by then the kernel TTL has
    /// lapsed anyway.
    pub fn new(window: Duration) -> Self {
        InvalidationSet {
            entries: Mutex::new(HashMap::new()),
            window,
        }
    }

    /// Mark `vpath` and its parent directory stale.
    pub fn mark(&self, vpath: &str) {
        let vpath = vpath.trim_matches('/');
        let now = Instant::now();
        let mut map = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(vpath.to_string(), now);
        let parent = vpath.rsplit_once('/').map(|(p, _)| p).unwrap_or("");
        map.insert(parent.to_string(), now);
    }

    /// Consume a pending mark: true once per `mark`, within the window.
    pub fn take(&self, vpath: &str) -> bool {
        let mut map = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match map.remove(vpath) {
            Some(marked_at) => marked_at.elapsed() < self.window,
            None => false,
        }
    }

    /// TTL for the next reply about `vpath`: zero if a mark was pending,
    /// otherwise `ttl`. Consumes the mark.
    pub fn ttl_for(&self, vpath: &str, ttl: Duration) -> Duration {
        if self.take(vpath) {
            Duration::ZERO
        } else {
            ttl
        }
    }

    pub fn is_pending(&self, vpath: &str) -> bool {
        let map = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        map.get(vpath)
            .is_some_and(|marked_at| marked_at.elapsed() < self.window)
    }

    /// Drop expired marks.
    pub fn evict_expired(&self) {
        let mut map = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        map.retain(|_, marked_at| marked_at.elapsed() < self.window);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Invalidator for InvalidationSet {
    fn invalidate(&self, vpath: &str) {
        trace!(vpath, "invalidate");
        self.evict_expired();
        self.mark(vpath);
    }
}
