use crate::RuntimeError;
use freeroot_schema::{Mount, MountKind};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Always set in the guest so scripts can tell they run under freeroot.
pub const MARKER_VAR: &str = "FREEROOT";
pub const DEFAULT_TERM: &str = "xterm-256color";
pub const GUEST_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";
pub const GUEST_HOME: &str = "/root";

#[derive(Debug, Clone, Default)]
pub struct ComposeOptions {
    pub extra_binds: Vec<Mount>,
    pub extra_env: BTreeMap<String, String>,
    /// The host's `TERM`; `None` falls back to [`DEFAULT_TERM`].
    pub host_term: Option<String>,
}

impl ComposeOptions {
    /// Options with `host_term` taken from the current process environment.
    pub fn from_host() -> Self {
        Self {
            host_term: std::env::var("TERM").ok().filter(|t| !t.is_empty()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composition {
    pub mounts: Vec<Mount>,
    pub env: BTreeMap<String, String>,
    /// Bindings dropped because the host path does not exist.
    pub skipped: Vec<Mount>,
}

/// Bindings every session gets, in order.
pub fn default_mounts() -> Vec<Mount> {
    let defaults = [
        ("/proc", MountKind::Proc),
        ("/sys", MountKind::Bind),
        ("/dev", MountKind::Dev),
        ("/etc/resolv.conf", MountKind::Bind),
        ("/etc/hosts", MountKind::Bind),
    ];
    defaults
        .into_iter()
        .filter_map(|(path, kind)| Mount::same(path, kind).ok())
        .collect()
}

/// Build the binding list and environment for one session.
///
/// A binding whose host path is missing is skipped with a warning; the
/// session still starts without it.
pub fn compose(rootfs: &Path, opts: &ComposeOptions) -> Result<Composition, RuntimeError> {
    let mut composition = Composition::default();

    for mount in default_mounts().into_iter().chain(opts.extra_binds.iter().cloned()) {
        let target = mount.target_in(rootfs);
        if !target.starts_with(rootfs) {
            return Err(RuntimeError::InvalidMount(mount.as_binding()));
        }
        if !mount.host.exists() {
            warn!(
                "host path {} does not exist; skipping {} binding",
                mount.host.display(),
                mount.kind
            );
            composition.skipped.push(mount);
            continue;
        }
        debug!("bind {} -> {}", mount.host.display(), target.display());
        composition.mounts.push(mount);
    }

    let env = &mut composition.env;
    env.insert(
        "TERM".to_owned(),
        opts.host_term
            .clone()
            .unwrap_or_else(|| DEFAULT_TERM.to_owned()),
    );
    env.insert("PATH".to_owned(), GUEST_PATH.to_owned());
    env.insert("HOME".to_owned(), GUEST_HOME.to_owned());
    env.insert("LANG".to_owned(), "C.UTF-8".to_owned());
    for (key, value) in &opts.extra_env {
        env.insert(key.clone(), value.clone());
    }
    env.insert(MARKER_VAR.to_owned(), "1".to_owned());

    Ok(composition)
}
