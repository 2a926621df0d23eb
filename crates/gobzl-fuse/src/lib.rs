//! gobzl-fuse: GOPATH-shaped overlay over a Bazel workspace
//!
//! Virtual paths resolve against the workspace, its generated-output tree and
//! the configured vendor directories (see [`mapper`] for the order).
//! The fuse3 adapter is compiled with the `fuse` feature.

pub mod attr;
pub mod driver;
pub mod invalidate;
pub mod mapper;
pub mod overlay;

// Re-export the mount API when the fuse feature is enabled
#[cfg(feature = "fuse")]
pub use driver::{mount, GobzlFs, MountConfig};

pub use invalidate::InvalidationSet;
pub use mapper::{Candidates, PathMapper};
pub use overlay::{child_path, normalize, DirEntry, MountHooks, NoHooks, OverlayFs, VirtualFs};
