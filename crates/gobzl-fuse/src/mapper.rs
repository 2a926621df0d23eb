//! Virtual path → ordered real candidates.
//!
//! ```text
//! layout: root=/ws prefix=github.com/acme/proj vendors=[vendor, third_party/go]
//!
//! ""                          → mount root (synthetic)
//! github.com/acme/proj        → prefix root (synthetic)
//! github.com/acme/proj/pkg/a  → /ws/pkg/a
//!                               /ws/bazel-genfiles/pkg/a
//!                               /ws/vendor/github.com/acme/proj/pkg/a
//!                               /ws/bazel-genfiles/vendor/github.com/acme/proj/pkg/a
//!                               ...third_party/go...
//! golang.org/x/net            → /ws/vendor/golang.org/x/net
//!                               /ws/bazel-genfiles/vendor/golang.org/x/net
//!                               /ws/third_party/go/golang.org/x/net
//!                               /ws/bazel-genfiles/third_party/go/golang.org/x/net
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use gobzl_core::WorkspaceLayout;

/// Outcome of mapping one virtual path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidates {
    /// The mount root; never probed.
    MountRoot,
    /// The package-prefix root; never probed.
    PrefixRoot,
    /// Real paths to stat in order, first hit wins.
    Probe(Vec<PathBuf>),
}

#[derive(Debug, Clone)]
pub struct PathMapper {
    layout: Arc<WorkspaceLayout>,
}

impl PathMapper {
    pub fn new(layout: Arc<WorkspaceLayout>) -> Self {
        PathMapper { layout }
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    /// Map a normalized virtual path (no leading or trailing `/`).
    pub fn candidates(&self, vpath: &str) -> Candidates {
        if vpath.is_empty() {
            return Candidates::MountRoot;
        }
        let prefix = self.layout.prefix.as_str();
        if !prefix.is_empty() && vpath == prefix {
            return Candidates::PrefixRoot;
        }
        // Kernel paths never carry these; refuse to escape the workspace.
        if vpath.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
            return Candidates::Probe(Vec::new());
        }

        let mut out = Vec::with_capacity(2 + 2 * self.layout.vendors.len());

        if let Some(rest) = self.strip_prefix(vpath) {
            out.push(self.layout.root.join(rest));
            out.push(self.layout.genfiles_root().join(rest));
        }
        out.extend(self.vendor_candidates(vpath));
        Candidates::Probe(out)
    }

    /// Real directories whose entries make up the listing of `vpath`.
    ///
    /// Same order as [`candidates`](Self::candidates); the mount root lists
    /// the vendor roots.
    pub fn listing_dirs(&self, vpath: &str) -> Vec<PathBuf> {
        match self.candidates(vpath) {
            Candidates::MountRoot => {
                let genfiles = self.layout.genfiles_root();
                self.layout
                    .vendors
                    .iter()
                    .flat_map(|v| [self.layout.root.join(v), genfiles.join(v)])
                    .collect()
            }
            Candidates::PrefixRoot => {
                let mut dirs = vec![self.layout.root.clone(), self.layout.genfiles_root()];
                dirs.extend(self.vendor_candidates(vpath));
                dirs
            }
            Candidates::Probe(dirs) => dirs,
        }
    }

    /// True for strict ancestors of the prefix root (`github.com`, `github.com/acme`).
    pub fn is_prefix_ancestor(&self, vpath: &str) -> bool {
        self.next_prefix_segment(vpath).is_some() && !vpath.is_empty()
    }

    /// Name of the prefix segment directly below `vpath`, if `vpath` is the
    /// mount root or a strict ancestor of the prefix root.
    pub fn next_prefix_segment(&self, vpath: &str) -> Option<&str> {
        let prefix = self.layout.prefix.as_str();
        if prefix.is_empty() {
            return None;
        }
        let rest = if vpath.is_empty() {
            prefix
        } else {
            prefix.strip_prefix(vpath)?.strip_prefix('/')?
        };
        rest.split('/').next()
    }

    fn strip_prefix<'a>(&self, vpath: &'a str) -> Option<&'a str> {
        let prefix = self.layout.prefix.as_str();
        if prefix.is_empty() {
            return None;
        }
        vpath.strip_prefix(prefix)?.strip_prefix('/')
    }

    /// Real then generated variant of each vendor, in vendor order.
    fn vendor_candidates(&self, vpath: &str) -> Vec<PathBuf> {
        let genfiles = self.layout.genfiles_root();
        self.layout
            .vendors
            .iter()
            .flat_map(|v| {
                [
                    self.layout.root.join(v).join(vpath),
                    genfiles.join(v).join(vpath),
                ]
            })
            .collect()
    }
}
