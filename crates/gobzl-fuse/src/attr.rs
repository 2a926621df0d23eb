//! Real-path attribute lookup.

use std::os::unix::fs::MetadataExt;
use std::path::Path;

use gobzl_core::types::{AttrRecord, Timespec};
use tracing::trace;

/// Stat `path` (following symlinks) and normalize the result.
///
/// Every OS error collapses to `None`: missing files, permission denial and
/// dangling symlinks all look the same to the caller.
pub fn stat(path: &Path) -> Option<AttrRecord> {
    match std::fs::metadata(path) {
        Ok(meta) => Some(AttrRecord {
            ino: meta.ino(),
            size: meta.size(),
            blocks: meta.blocks(),
            mode: meta.mode(),
            atime: Timespec::new(meta.atime(), meta.atime_nsec()),
            mtime: Timespec::new(meta.mtime(), meta.mtime_nsec()),
            ctime: Timespec::new(meta.ctime(), meta.ctime_nsec()),
        }),
        Err(e) => {
            trace!(path = %path.display(), "stat miss: {e}");
            None
        }
    }
}
