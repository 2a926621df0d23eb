//! gobzl-watch: react to workspace changes
//!
//! Create/rename events under the workspace root are filtered by
//! [`IgnoreRules`], turned into virtual-path invalidations and, for Go and
//! proto files, into `bazel build` / `go install` runs.

pub mod exec;
pub mod ignore;
pub mod reactor;
pub mod watcher;

pub use exec::{BuildRunner, CommandRunner};
pub use ignore::IgnoreRules;
pub use reactor::{ChangeReactor, Reaction};
pub use watcher::{spawn, WatchHandle};
