use crate::StoreError;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Current marker format version. Incremented on incompatible layout changes.
pub const WORKSPACE_FORMAT_VERSION: u32 = 1;

const ENGINE_FILE: &str = "engine-binary";
const ROOTFS_DIR: &str = "rootfs";
const MARKER_FILE: &str = ".bootstrap-complete";
const DOWNLOADS_DIR: &str = "downloads";

/// Directory layout of a bootstrap workspace.
///
/// ```text
/// <root>/engine-binary
/// <root>/rootfs/
/// <root>/.bootstrap-complete
/// <root>/downloads/
/// <parent>/.<root-name>.lock
/// ```
#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn engine_binary(&self) -> PathBuf {
        self.root.join(ENGINE_FILE)
    }

    #[inline]
    pub fn rootfs_dir(&self) -> PathBuf {
        self.root.join(ROOTFS_DIR)
    }

    #[inline]
    pub fn marker_file(&self) -> PathBuf {
        self.root.join(MARKER_FILE)
    }

    /// Transient artifacts (the rootfs tarball) live here until installed.
    #[inline]
    pub fn downloads_dir(&self) -> PathBuf {
        self.root.join(DOWNLOADS_DIR)
    }

    /// The lock sits next to the workspace, not inside it, so purging the
    /// workspace never deletes a lock another process holds.
    pub fn lock_file(&self) -> PathBuf {
        let name = self
            .root
            .file_name()
            .map_or_else(|| OsString::from("workspace"), ToOwned::to_owned);
        let mut lock_name = OsString::from(".");
        lock_name.push(name);
        lock_name.push(".lock");
        match self.root.parent() {
            Some(parent) => parent.join(lock_name),
            None => PathBuf::from("/").join(lock_name),
        }
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root)?;
        fs::create_dir_all(self.downloads_dir())?;
        Ok(())
    }
}
