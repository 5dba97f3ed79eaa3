use crate::layout::WorkspaceLayout;
use crate::marker::{read_marker, write_marker, CompletionMarker};
use crate::StoreError;
use freeroot_schema::Architecture;
use serde::Serialize;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of [`Workspace::prepare`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prepared {
    /// Complete workspace for the expected architecture; skip fetch and install.
    Reuse(CompletionMarker),
    /// Empty workspace ready for a full bootstrap.
    Fresh,
}

/// What `status` reports without touching anything.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum WorkspaceStatus {
    Missing,
    Incomplete,
    Complete { marker: CompletionMarker },
}

/// What a reusable workspace must have been built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildTarget<'a> {
    pub arch: Architecture,
    pub engine_url: &'a str,
    pub rootfs_url: &'a str,
}

/// A bootstrap workspace. Passed explicitly to every stage that touches disk.
#[derive(Debug, Clone)]
pub struct Workspace {
    layout: WorkspaceLayout,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: WorkspaceLayout::new(root),
        }
    }

    #[inline]
    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    #[inline]
    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// Decide between reusing a complete workspace and starting over.
    ///
    /// Anything short of a valid marker for `target` with both artifacts on
    /// disk is purged, so partial state from an interrupted run never
    /// survives into the next one.
    pub fn prepare(&self, target: &BuildTarget<'_>, force: bool) -> Result<Prepared, StoreError> {
        let root = self.root();

        if !force {
            if let Some(marker) = self.reusable_marker(target)? {
                info!("reusing complete workspace at {}", root.display());
                return Ok(Prepared::Reuse(marker));
            }
        }

        match fs::symlink_metadata(root) {
            Ok(meta) if meta.is_dir() => {
                info!("purging workspace at {}", root.display());
                self.purge()?;
            }
            Ok(_) => {
                warn!("{} is not a directory; replacing it", root.display());
                self.check_removable()?;
                force_remove(root)?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.layout.initialize()?;
        Ok(Prepared::Fresh)
    }

    fn reusable_marker(
        &self,
        target: &BuildTarget<'_>,
    ) -> Result<Option<CompletionMarker>, StoreError> {
        if !self.root().is_dir() {
            return Ok(None);
        }
        let Some(marker) = read_marker(&self.layout)? else {
            return Ok(None);
        };
        if marker.arch != target.arch {
            warn!(
                "workspace was built for {}, host needs {}; rebuilding",
                marker.arch, target.arch
            );
            return Ok(None);
        }
        if marker.engine_url != target.engine_url || marker.rootfs_url != target.rootfs_url {
            warn!(
                "workspace was built from {} and {}; artifact sources changed, rebuilding",
                marker.engine_url, marker.rootfs_url
            );
            return Ok(None);
        }
        if !self.layout.engine_binary().is_file() {
            warn!("marker present but engine binary is missing; rebuilding");
            return Ok(None);
        }
        if !self.layout.rootfs_dir().is_dir() {
            warn!("marker present but rootfs is missing; rebuilding");
            return Ok(None);
        }
        Ok(Some(marker))
    }

    pub fn status(&self) -> Result<WorkspaceStatus, StoreError> {
        if !self.root().exists() {
            return Ok(WorkspaceStatus::Missing);
        }
        if !self.root().is_dir() {
            return Ok(WorkspaceStatus::Incomplete);
        }
        match read_marker(&self.layout)? {
            Some(marker)
                if self.layout.engine_binary().is_file() && self.layout.rootfs_dir().is_dir() =>
            {
                Ok(WorkspaceStatus::Complete { marker })
            }
            _ => Ok(WorkspaceStatus::Incomplete),
        }
    }

    pub fn mark_complete(&self, marker: &CompletionMarker) -> Result<(), StoreError> {
        write_marker(&self.layout, marker)?;
        debug!("wrote completion marker {}", self.layout.marker_file().display());
        Ok(())
    }

    /// Remove the workspace contents, leaving an empty directory.
    pub fn purge(&self) -> Result<(), StoreError> {
        self.check_removable()?;
        let root = self.root();
        if !root.exists() {
            return Ok(());
        }
        for entry in fs::read_dir(root)? {
            force_remove(&entry?.path())?;
        }
        Ok(())
    }

    /// Remove the workspace directory itself.
    pub fn remove(&self) -> Result<(), StoreError> {
        self.check_removable()?;
        force_remove(self.root())
    }

    /// Drop transient downloads once the rootfs is installed.
    pub fn clear_downloads(&self) -> Result<(), StoreError> {
        let downloads = self.layout.downloads_dir();
        if downloads.exists() {
            force_remove(&downloads)?;
            fs::create_dir_all(&downloads)?;
        }
        Ok(())
    }

    fn check_removable(&self) -> Result<(), StoreError> {
        let root = self.root();
        let resolved = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        if resolved.parent().is_none() {
            return Err(StoreError::UnsafeWorkspace(root.to_path_buf()));
        }
        if let Some(home) = std::env::var_os("HOME") {
            let home = PathBuf::from(home);
            let home = fs::canonicalize(&home).unwrap_or(home);
            if resolved == home {
                return Err(StoreError::UnsafeWorkspace(root.to_path_buf()));
            }
        }
        Ok(())
    }
}

/// Give the owner read/write/search access on everything under `path`.
///
/// Rootfs images ship read-only directories (`/usr/lib/...` at 0o555);
/// without this neither staging renames nor removal would work unprivileged.
/// Symlinks are not followed.
pub fn restore_owner_access(path: &Path) -> Result<(), StoreError> {
    let meta = fs::symlink_metadata(path)?;
    if meta.file_type().is_symlink() {
        return Ok(());
    }
    let mode = meta.permissions().mode();
    let wanted = if meta.is_dir() {
        mode | 0o700
    } else {
        mode | 0o600
    };
    if wanted != mode {
        fs::set_permissions(path, fs::Permissions::from_mode(wanted))?;
    }
    if meta.is_dir() {
        for entry in fs::read_dir(path)? {
            restore_owner_access(&entry?.path())?;
        }
    }
    Ok(())
}

/// Remove a file or tree regardless of the permission bits inside it.
pub fn force_remove(path: &Path) -> Result<(), StoreError> {
    let meta = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if meta.is_dir() {
        restore_owner_access(path)?;
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(())
}
