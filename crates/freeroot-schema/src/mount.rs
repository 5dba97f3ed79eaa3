use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// How a host path is exposed inside the virtualized root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountKind {
    /// Plain bind of a file or directory.
    Bind,
    /// The host process table (`/proc`).
    Proc,
    /// Device nodes (`/dev`).
    Dev,
}

impl fmt::Display for MountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bind => "bind",
            Self::Proc => "proc",
            Self::Dev => "dev",
        })
    }
}

/// One host → guest binding.
///
/// `guest` is always absolute and lexically normalized, so joining it onto
/// the rootfs can never leave the rootfs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    pub host: PathBuf,
    pub guest: PathBuf,
    pub kind: MountKind,
}

impl Mount {
    pub fn new(
        host: impl Into<PathBuf>,
        guest: &str,
        kind: MountKind,
    ) -> Result<Self, SchemaError> {
        let host = host.into();
        let guest = normalize_guest(guest).ok_or_else(|| SchemaError::InvalidMount {
            spec: format!("{}:{guest}", host.display()),
            reason: "guest path must be absolute".to_owned(),
        })?;
        Ok(Self { host, guest, kind })
    }

    /// Same path on both sides.
    pub fn same(path: &str, kind: MountKind) -> Result<Self, SchemaError> {
        Self::new(path, path, kind)
    }

    /// Where the guest path lands on the host, below `rootfs`.
    pub fn target_in(&self, rootfs: &Path) -> PathBuf {
        rootfs.join(self.guest.strip_prefix("/").unwrap_or(&self.guest))
    }

    /// `host:guest` form used on engine command lines.
    pub fn as_binding(&self) -> String {
        format!("{}:{}", self.host.display(), self.guest.display())
    }
}

/// Parse a `host[:guest]` binding. A missing guest mirrors the host path.
pub fn parse_bind_spec(spec: &str) -> Result<Mount, SchemaError> {
    let spec = spec.trim();
    let (host_raw, guest_raw) = match spec.split_once(':') {
        Some((host, guest)) => (host.trim(), guest.trim()),
        None => (spec, spec),
    };

    if host_raw.is_empty() || guest_raw.is_empty() {
        return Err(SchemaError::InvalidMount {
            spec: spec.to_owned(),
            reason: "expected '<host>[:<guest>]'".to_owned(),
        });
    }
    if !host_raw.starts_with('/') {
        return Err(SchemaError::InvalidMount {
            spec: spec.to_owned(),
            reason: "host path must be absolute".to_owned(),
        });
    }

    let guest = normalize_guest(guest_raw).ok_or_else(|| SchemaError::InvalidMount {
        spec: spec.to_owned(),
        reason: "guest path must be absolute".to_owned(),
    })?;

    Ok(Mount {
        host: PathBuf::from(host_raw),
        guest,
        kind: MountKind::Bind,
    })
}

/// Resolve `.` and `..` in an absolute guest path without touching the
/// filesystem. `..` at the root stays at the root, as it does inside a chroot.
fn normalize_guest(path: &str) -> Option<PathBuf> {
    if !path.starts_with('/') {
        return None;
    }
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    Some(PathBuf::from(format!("/{}", parts.join("/"))))
}

/// Validate an environment variable name for the launch environment:
/// a shell identifier, `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_env_key(key: &str) -> bool {
    let mut bytes = key.bytes();
    bytes
        .next()
        .is_some_and(|b| b.is_ascii_alphabetic() || b == b'_')
        && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Parse `KEY=VALUE`.
pub fn parse_env_pair(pair: &str) -> Result<(String, String), SchemaError> {
    let Some((key, value)) = pair.split_once('=') else {
        return Err(SchemaError::InvalidEnv(pair.to_owned()));
    };
    if !is_valid_env_key(key) {
        return Err(SchemaError::InvalidEnv(pair.to_owned()));
    }
    Ok((key.to_owned(), value.to_owned()))
}
