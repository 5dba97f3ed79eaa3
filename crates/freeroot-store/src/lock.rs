use crate::layout::WorkspaceLayout;
use crate::StoreError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Advisory lock guarding one workspace path.
///
/// Exclusive while the workspace is being prepared, shared while a shell
/// session runs out of it. Acquisition never blocks: a held lock is
/// reported as [`StoreError::Busy`].
pub struct WorkspaceLock {
    lock_file: File,
    path: PathBuf,
}

impl WorkspaceLock {
    pub fn exclusive(layout: &WorkspaceLayout) -> Result<Self, StoreError> {
        let (file, path) = open_lock_file(layout)?;
        file.try_lock_exclusive()
            .map_err(|_| StoreError::Busy(layout.root().to_path_buf()))?;
        debug!("exclusive lock on {}", path.display());
        Ok(Self {
            lock_file: file,
            path,
        })
    }

    pub fn shared(layout: &WorkspaceLayout) -> Result<Self, StoreError> {
        let (file, path) = open_lock_file(layout)?;
        file.try_lock_shared()
            .map_err(|_| StoreError::Busy(layout.root().to_path_buf()))?;
        debug!("shared lock on {}", path.display());
        Ok(Self {
            lock_file: file,
            path,
        })
    }

    /// Convert an exclusive lock into a shared one once preparation is done.
    pub fn downgrade(&self) -> Result<(), StoreError> {
        self.lock_file
            .try_lock_shared()
            .map_err(|e| StoreError::LockFailed(e.to_string()))?;
        debug!("downgraded lock on {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}

fn open_lock_file(layout: &WorkspaceLayout) -> Result<(File, PathBuf), StoreError> {
    let path = layout.lock_file();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&path)?;
    Ok((file, path))
}
