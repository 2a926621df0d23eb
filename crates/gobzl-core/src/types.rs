use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::GobzlConfig;

/// File type mask and directory bit of `st_mode`.
pub const S_IFMT: u32 = 0o170_000;
pub const S_IFDIR: u32 = 0o040_000;
pub const S_IFREG: u32 = 0o100_000;
pub const S_IFLNK: u32 = 0o120_000;

/// Mode reported for the synthesized mount root and package-prefix directories.
pub const SYNTHETIC_DIR_MODE: u32 = S_IFDIR | 0o755;

/// Immutable description of the workspace the overlay presents.
///
/// Shared read-only between the lookup path and the change reactor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    /// Absolute workspace root
    pub root: PathBuf,
    /// Virtual package prefix (no leading or trailing slash)
    pub prefix: String,
    /// Vendor directories relative to `root`, in priority order
    pub vendors: Vec<String>,
    /// Generated-output directory relative to `root`
    pub genfiles_dir: String,
}

impl WorkspaceLayout {
    pub fn new(
        root: impl Into<PathBuf>,
        prefix: impl Into<String>,
        vendors: Vec<String>,
        genfiles_dir: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
            vendors,
            genfiles_dir: genfiles_dir.into(),
        }
    }

    pub fn from_config(root: impl Into<PathBuf>, config: &GobzlConfig) -> Self {
        Self::new(
            root,
            config.go_pkg_prefix.clone(),
            config.vendors.clone(),
            config.build.genfiles_dir.clone(),
        )
    }

    /// Absolute path of the generated-output tree.
    pub fn genfiles_root(&self) -> PathBuf {
        self.root.join(&self.genfiles_dir)
    }

    /// Split a workspace-relative path into its vendor and vendor-relative rest.
    ///
    /// `third_party/go/x/y.go` → `("third_party/go", "x/y.go")`; the vendor
    /// directory itself yields an empty rest. First configured vendor wins.
    pub fn split_vendor<'a>(&'a self, rel: &'a str) -> Option<(&'a str, &'a str)> {
        self.vendors.iter().find_map(|vendor| {
            if rel == vendor {
                Some((vendor.as_str(), ""))
            } else {
                rel.strip_prefix(vendor.as_str())
                    .and_then(|rest| rest.strip_prefix('/'))
                    .map(|rest| (vendor.as_str(), rest))
            }
        })
    }

    /// Virtual path of a first-party workspace-relative path: `{prefix}/{rel}`.
    pub fn prefixed(&self, rel: &str) -> String {
        match (self.prefix.is_empty(), rel.is_empty()) {
            (true, _) => rel.to_string(),
            (false, true) => self.prefix.clone(),
            (false, false) => format!("{}/{}", self.prefix, rel),
        }
    }
}

/// Seconds + nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timespec {
    pub sec: i64,
    pub nsec: u32,
}

impl Timespec {
    pub fn new(sec: i64, nsec: i64) -> Self {
        Self {
            sec,
            nsec: nsec.clamp(0, 999_999_999) as u32,
        }
    }

    pub fn to_system_time(self) -> SystemTime {
        let nanos = Duration::from_nanos(u64::from(self.nsec));
        if self.sec >= 0 {
            UNIX_EPOCH + Duration::from_secs(self.sec as u64) + nanos
        } else {
            UNIX_EPOCH - Duration::from_secs(self.sec.unsigned_abs()) + nanos
        }
    }
}

/// Normalized stat result for one lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttrRecord {
    pub ino: u64,
    pub size: u64,
    pub blocks: u64,
    pub mode: u32,
    pub atime: Timespec,
    pub mtime: Timespec,
    pub ctime: Timespec,
}

impl AttrRecord {
    /// Attributes of a directory with no backing real path.
    pub fn synthetic_dir() -> Self {
        Self {
            mode: SYNTHETIC_DIR_MODE,
            ..Self::default()
        }
    }

    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    /// Permission bits only.
    pub fn perm(&self) -> u16 {
        (self.mode & 0o7777) as u16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Rename,
}

/// One filesystem change under the workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    /// Path relative to the workspace root, `/`-separated
    pub rel_path: String,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    /// Build an event for `path`, or `None` when it lies outside `root`.
    pub fn under_root(root: &Path, path: &Path, kind: ChangeKind) -> Option<Self> {
        let rel = path.strip_prefix(root).ok()?;
        let rel_path = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if rel_path.is_empty() {
            return None;
        }
        Some(Self {
            path: path.to_path_buf(),
            rel_path,
            kind,
        })
    }
}

/// Receives "cached state for this virtual path is stale" notifications.
///
/// Fire-and-forget: implementations must not block for long and report nothing.
pub trait Invalidator: Send + Sync {
    fn invalidate(&self, vpath: &str);
}

impl<T: Invalidator + ?Sized> Invalidator for Arc<T> {
    fn invalidate(&self, vpath: &str) {
        (**self).invalidate(vpath)
    }
}
