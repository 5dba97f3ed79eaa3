use crate::layout::{WorkspaceLayout, WORKSPACE_FORMAT_VERSION};
use crate::{fsync_dir, StoreError};
use freeroot_schema::Architecture;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;
use tracing::warn;

/// Record of a fully successful bootstrap.
///
/// Written last, atomically. Its presence (and validity) is the only thing
/// that lets a later run skip fetching and installing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionMarker {
    pub format_version: u32,
    pub arch: Architecture,
    pub engine_url: String,
    pub rootfs_url: String,
    pub engine_blake3: String,
    pub rootfs_blake3: String,
    pub completed_at: String,
    /// blake3 over the marker content, excluding this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl CompletionMarker {
    pub fn new(
        arch: Architecture,
        engine_url: impl Into<String>,
        rootfs_url: impl Into<String>,
        engine_blake3: impl Into<String>,
        rootfs_blake3: impl Into<String>,
    ) -> Self {
        Self {
            format_version: WORKSPACE_FORMAT_VERSION,
            arch,
            engine_url: engine_url.into(),
            rootfs_url: rootfs_url.into(),
            engine_blake3: engine_blake3.into(),
            rootfs_blake3: rootfs_blake3.into(),
            completed_at: chrono::Utc::now().to_rfc3339(),
            checksum: None,
        }
    }

    fn compute_checksum(&self) -> Result<String, StoreError> {
        let mut copy = self.clone();
        copy.checksum = None;
        let json = serde_json::to_string_pretty(&copy)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

/// Atomically write the marker (temp file, fsync, rename, dir fsync).
pub fn write_marker(layout: &WorkspaceLayout, marker: &CompletionMarker) -> Result<(), StoreError> {
    let mut sealed = marker.clone();
    sealed.checksum = Some(sealed.compute_checksum()?);
    let content = serde_json::to_string_pretty(&sealed)?;

    let dir = layout.root();
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(layout.marker_file())
        .map_err(|e| StoreError::Io(e.error))?;
    fsync_dir(dir)?;
    Ok(())
}

/// Read the marker. Anything that is not a well-formed marker of the current
/// format with a matching checksum reads as `None`: the workspace is then
/// treated as incomplete.
pub fn read_marker(layout: &WorkspaceLayout) -> Result<Option<CompletionMarker>, StoreError> {
    let path = layout.marker_file();
    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let marker: CompletionMarker = match serde_json::from_str(&content) {
        Ok(m) => m,
        Err(e) => {
            warn!("ignoring unreadable marker {}: {e}", path.display());
            return Ok(None);
        }
    };

    if marker.format_version != WORKSPACE_FORMAT_VERSION {
        warn!(
            "ignoring marker with format version {} (expected {WORKSPACE_FORMAT_VERSION})",
            marker.format_version
        );
        return Ok(None);
    }

    let Some(ref expected) = marker.checksum else {
        warn!("ignoring unsealed marker {}", path.display());
        return Ok(None);
    };
    if marker.compute_checksum()? != *expected {
        warn!("ignoring marker with checksum mismatch at {}", path.display());
        return Ok(None);
    }

    Ok(Some(marker))
}
