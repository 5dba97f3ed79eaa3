//! Architecture resolution, bind-mount specifications, and layered configuration for freeroot.
//!
//! This crate defines the schema layer: mapping host machine identifiers to artifact
//! variants (`Architecture`), validated host → guest bindings (`Mount`), and the TOML
//! config file plus command-line overrides that produce a `BootstrapConfig`.

pub mod arch;
pub mod config;
pub mod mount;

pub use arch::{resolve_with_override, Architecture};
pub use config::{
    default_config_path, default_workspace, parse_config_file, parse_config_str, ArtifactSource,
    BootstrapConfig, ConfigFile, EngineDialect, Overrides, DEFAULT_ENGINE_URL, DEFAULT_ROOTFS_URL,
};
pub use mount::{parse_bind_spec, parse_env_pair, Mount, MountKind};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unsupported CPU architecture '{machine}' (supported: {supported})")]
    UnsupportedArchitecture { machine: String, supported: String },
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("invalid bind '{spec}': {reason}")]
    InvalidMount { spec: String, reason: String },
    #[error("invalid environment entry '{0}', expected KEY=VALUE with KEY a shell identifier ([A-Za-z_][A-Za-z0-9_]*)")]
    InvalidEnv(String),
    #[error("unknown engine dialect '{0}' (supported: proot, generic)")]
    InvalidDialect(String),
    #[error("invalid blake3 digest '{0}', expected 64 hex characters")]
    InvalidDigest(String),
    #[error("unsupported artifact URL '{0}' (expected http://, https:// or file://)")]
    InvalidUrl(String),
}
