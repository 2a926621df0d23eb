//! The overlay filesystem: attribute lookup over the mapped candidates.
//!
//! Stateless per lookup. Every call re-maps and re-stats; caching belongs to
//! the kernel (attribute TTL) and to the adapter's invalidation set.

use std::collections::HashSet;
use std::path::Path;

use gobzl_core::types::AttrRecord;
use gobzl_core::GobzlResult;
use tracing::{debug, trace};

use crate::attr;
use crate::mapper::{Candidates, PathMapper};

/// Mount lifecycle callbacks (start/stop the change watcher).
pub trait MountHooks: Send + Sync {
    /// Called once when the kernel completes the mount handshake.
    /// An error aborts the mount.
    fn on_mount(&self) -> GobzlResult<()>;

    fn on_unmount(&self);
}

/// Hooks that do nothing.
pub struct NoHooks;

impl MountHooks for NoHooks {
    fn on_mount(&self) -> GobzlResult<()> {
        Ok(())
    }

    fn on_unmount(&self) {}
}

/// One entry of a virtual directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// The operations a mounting adapter needs from a virtual filesystem.
///
/// Everything but [`get_attr`](Self::get_attr) has a default, so a host
/// adapter can expose a much larger surface without this crate caring.
pub trait VirtualFs: Send + Sync {
    /// Attributes of a normalized virtual path, `None` for not-found.
    fn get_attr(&self, vpath: &str) -> Option<AttrRecord>;

    fn list_dir(&self, _vpath: &str) -> Option<Vec<DirEntry>> {
        None
    }

    fn access(&self, _vpath: &str, _mask: u32) -> bool {
        true
    }

    fn on_mount(&self) -> GobzlResult<()> {
        Ok(())
    }

    fn on_unmount(&self) {}
}

/// Strip leading/trailing slashes from a kernel path: `/a/b/` → `a/b`.
pub fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

/// Virtual path of `name` inside the normalized directory `parent`.
pub fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

pub struct OverlayFs<H: MountHooks = NoHooks> {
    mapper: PathMapper,
    hooks: H,
}

impl OverlayFs<NoHooks> {
    pub fn new(mapper: PathMapper) -> Self {
        OverlayFs {
            mapper,
            hooks: NoHooks,
        }
    }
}

impl<H: MountHooks> OverlayFs<H> {
    pub fn with_hooks(mapper: PathMapper, hooks: H) -> Self {
        OverlayFs { mapper, hooks }
    }

    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }
}

impl<H: MountHooks> VirtualFs for OverlayFs<H> {
    fn get_attr(&self, vpath: &str) -> Option<AttrRecord> {
        match self.mapper.candidates(vpath) {
            Candidates::MountRoot | Candidates::PrefixRoot => Some(AttrRecord::synthetic_dir()),
            Candidates::Probe(paths) => {
                let found = paths.iter().find_map(|p| {
                    let attr = attr::stat(p)?;
                    trace!(vpath, real = %p.display(), "resolved");
                    Some(attr)
                });
                // Intermediate prefix segments exist even when no vendor carries them.
                found.or_else(|| {
                    self.mapper
                        .is_prefix_ancestor(vpath)
                        .then(AttrRecord::synthetic_dir)
                })
            }
        }
    }

    fn list_dir(&self, vpath: &str) -> Option<Vec<DirEntry>> {
        if !self.get_attr(vpath)?.is_dir() {
            return None;
        }

        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        if let Some(segment) = self.mapper.next_prefix_segment(vpath) {
            seen.insert(segment.to_string());
            entries.push(DirEntry {
                name: segment.to_string(),
                is_dir: true,
            });
        }

        for dir in self.mapper.listing_dirs(vpath) {
            merge_real_dir(&dir, &mut seen, &mut entries);
        }

        debug!(vpath, count = entries.len(), "listed");
        Some(entries)
    }

    fn on_mount(&self) -> GobzlResult<()> {
        self.hooks.on_mount()
    }

    fn on_unmount(&self) {
        self.hooks.on_unmount()
    }
}

fn merge_real_dir(dir: &Path, seen: &mut HashSet<String>, out: &mut Vec<DirEntry>) {
    let Ok(read) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in read.flatten() {
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if seen.contains(&name) {
            continue;
        }
        // Dangling symlinks would fail getattr; leave them out of the listing.
        let Some(attr) = attr::stat(&entry.path()) else {
            continue;
        };
        seen.insert(name.clone());
        out.push(DirEntry {
            name,
            is_dir: attr.is_dir(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gobzl_core::WorkspaceLayout;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn overlay(root: &Path) -> OverlayFs {
        OverlayFs::new(PathMapper::new(Arc::new(WorkspaceLayout::new(
            root,
            "github.com/acme/proj",
            vec!["vendor".into()],
            "bazel-genfiles",
        ))))
    }

    #[test]
    fn normalize_strips_slashes() {
        assert_eq!(normalize("/"), "");
        assert_eq!(normalize("/a/b/"), "a/b");
        assert_eq!(normalize("a"), "a");
    }

    #[test]
    fn child_path_of_root_has_no_slash() {
        assert_eq!(child_path("", "golang.org"), "golang.org");
        assert_eq!(child_path("github.com/acme", "proj"), "github.com/acme/proj");
    }

    #[test]
    fn root_and_prefix_exist_on_empty_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let fs = overlay(&dir.path().join("does-not-exist"));
        assert!(fs.get_attr("").unwrap().is_dir());
        assert!(fs.get_attr("github.com/acme/proj").unwrap().is_dir());
        assert_eq!(fs.get_attr("github.com/acme/proj").unwrap().perm(), 0o755);
    }

    #[test]
    fn prefix_ancestors_fall_back_to_synthetic() {
        let dir = tempfile::tempdir().unwrap();
        let fs = overlay(dir.path());
        assert!(fs.get_attr("github.com").unwrap().is_dir());
        assert!(fs.get_attr("github.com/acme").unwrap().is_dir());
        assert!(fs.get_attr("github.com/other").is_none());
    }

    #[test]
    fn prefix_ancestor_prefers_real_vendor_dir() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("vendor/github.com");
        std::fs::create_dir_all(&real).unwrap();
        let fs = overlay(dir.path());
        let attr = fs.get_attr("github.com").unwrap();
        assert_eq!(attr.ino, attr::stat(&real).unwrap().ino);
    }

    #[test]
    fn missing_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(overlay(dir.path()).get_attr("golang.org/x/net").is_none());
    }

    #[test]
    fn list_root_merges_prefix_segment_and_vendor_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("vendor/golang.org/x")).unwrap();
        std::fs::create_dir_all(dir.path().join("vendor/github.com/dep")).unwrap();
        std::fs::create_dir_all(dir.path().join("bazel-genfiles/vendor/gen.io")).unwrap();

        let mut names: Vec<_> = overlay(dir.path())
            .list_dir("")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["gen.io", "github.com", "golang.org"]);
    }

    #[test]
    fn list_prefix_root_shows_workspace_and_genfiles() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("pkg")).unwrap();
        std::fs::write(dir.path().join("pkg/a.go"), b"package pkg\n").unwrap();
        std::fs::create_dir_all(dir.path().join("bazel-genfiles/pkg")).unwrap();
        std::fs::write(dir.path().join("bazel-genfiles/pkg/a.pb.go"), b"package pkg\n").unwrap();

        let fs = overlay(dir.path());
        let mut names: Vec<_> = fs
            .list_dir("github.com/acme/proj/pkg")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.go", "a.pb.go"]);

        let top = fs.list_dir("github.com/acme/proj").unwrap();
        assert!(top.iter().any(|e| e.name == "pkg" && e.is_dir));
    }

    #[test]
    fn list_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("vendor/x")).unwrap();
        std::fs::write(dir.path().join("vendor/x/a.go"), b"").unwrap();
        assert!(overlay(dir.path()).list_dir("x/a.go").is_none());
    }

    struct CountingHooks(AtomicUsize);

    impl MountHooks for CountingHooks {
        fn on_mount(&self) -> GobzlResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn on_unmount(&self) {
            self.0.fetch_add(10, Ordering::SeqCst);
        }
    }

    #[test]
    fn hooks_are_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let mapper = overlay(dir.path()).mapper().clone();
        let fs = OverlayFs::with_hooks(mapper, CountingHooks(AtomicUsize::new(0)));
        fs.on_mount().unwrap();
        fs.on_unmount();
        assert_eq!(fs.hooks.0.load(Ordering::SeqCst), 11);
        assert!(fs.access("anything", 0));
    }
}
