//! Workspace layout, completion marker, and locking for freeroot.
//!
//! This crate owns everything freeroot keeps on disk: the `WorkspaceLayout`
//! naming scheme, the atomically written `CompletionMarker` that decides
//! between reuse and rebuild, `Workspace` preparation and purging, and the
//! advisory `WorkspaceLock` that keeps two runs off the same directory.

pub mod layout;
pub mod lock;
pub mod marker;
pub mod workspace;

pub use layout::{WorkspaceLayout, WORKSPACE_FORMAT_VERSION};
pub use lock::WorkspaceLock;
pub use marker::{read_marker, write_marker, CompletionMarker};
pub use workspace::{
    force_remove, restore_owner_access, BuildTarget, Prepared, Workspace, WorkspaceStatus,
};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fsync a directory to ensure that a preceding `rename()` is durable.
///
/// POSIX does not guarantee a rename survives a crash until the parent
/// directory itself has been synced.
pub fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("workspace I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("workspace {} is in use by another freeroot process", .0.display())]
    Busy(PathBuf),
    #[error("refusing to use {} as a workspace: it would delete the filesystem root or home directory", .0.display())]
    UnsafeWorkspace(PathBuf),
    #[error("lock acquisition failed: {0}")]
    LockFailed(String),
}
