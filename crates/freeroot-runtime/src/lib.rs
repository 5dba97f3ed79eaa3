//! Rootfs installation, engine preparation, and session launch for freeroot.
//!
//! This crate implements the execution layer: the two-pass `archive` installer
//! that refuses path-escaping tarballs, `engine` normalization and probing,
//! `compose` for bindings and the guest environment, `launch` with per-dialect
//! engine command lines, process-wide `signal` forwarding, and the host
//! capability report behind `freeroot doctor`.

pub mod archive;
pub mod compose;
pub mod engine;
pub mod launch;
pub mod prereq;
pub mod signal;
pub mod terminal;

pub use archive::{detect_compression, install_rootfs, seed_rootfs, Compression, InstallReport};
pub use compose::{compose, default_mounts, ComposeOptions, Composition};
pub use engine::{prepare_engine, EngineInfo, DEFAULT_PROBE_TIMEOUT};
pub use launch::{default_shell, launch, LaunchOutcome, LaunchPlan};
pub use prereq::{format_missing, inspect_host, HostReport, MissingPrereq};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("engine execution failed: {0}")]
    EngineExec(String),
    #[error("binding escapes the root filesystem: {0}")]
    InvalidMount(String),
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsafe archive entry '{entry}': {reason}")]
    Security { entry: String, reason: String },
    #[error("archive contains no entries")]
    Empty,
    #[error("workspace error: {0}")]
    Store(#[from] freeroot_store::StoreError),
}
