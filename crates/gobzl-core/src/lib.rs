pub mod config;
pub mod error;
pub mod types;

pub use error::{GobzlError, GobzlResult};
pub use types::{AttrRecord, ChangeEvent, ChangeKind, Invalidator, Timespec, WorkspaceLayout};
