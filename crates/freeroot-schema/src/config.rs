use crate::arch::Architecture;
use crate::mount::{is_valid_env_key, parse_bind_spec, parse_env_pair, Mount};
use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Statically linked PRoot builds, one per `uname -m` value.
pub const DEFAULT_ENGINE_URL: &str =
    "https://raw.githubusercontent.com/foxytouxxx/freeroot/main/proot-{machine}";

/// Ubuntu 20.04 base rootfs, one per Debian architecture name.
pub const DEFAULT_ROOTFS_URL: &str = "https://cdimage.ubuntu.com/ubuntu-base/releases/20.04/release/ubuntu-base-20.04.4-base-{arch}.tar.gz";

/// Command-line conventions of the virtualization engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineDialect {
    /// PRoot: `-b host:guest`, `--rootfs=dir`, never prompts.
    #[default]
    Proot,
    /// `--bind host:guest --rootfs dir --assume-yes -- cmd`.
    Generic,
}

impl FromStr for EngineDialect {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "proot" => Ok(Self::Proot),
            "generic" => Ok(Self::Generic),
            other => Err(SchemaError::InvalidDialect(other.to_owned())),
        }
    }
}

impl fmt::Display for EngineDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Proot => "proot",
            Self::Generic => "generic",
        })
    }
}

/// On-disk TOML configuration. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub workspace: Option<PathBuf>,
    #[serde(default)]
    pub arch: Option<String>,
    #[serde(default)]
    pub engine_dialect: Option<EngineDialect>,
    #[serde(default)]
    pub artifacts: ArtifactSection,
    #[serde(default)]
    pub launch: LaunchSection,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ArtifactSection {
    #[serde(default)]
    pub engine_url: Option<String>,
    #[serde(default)]
    pub rootfs_url: Option<String>,
    #[serde(default)]
    pub engine_blake3: Option<String>,
    #[serde(default)]
    pub rootfs_blake3: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LaunchSection {
    #[serde(default)]
    pub binds: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub shell: Vec<String>,
}

pub fn parse_config_str(input: &str) -> Result<ConfigFile, SchemaError> {
    Ok(toml::from_str(input)?)
}

pub fn parse_config_file(path: impl AsRef<Path>) -> Result<ConfigFile, SchemaError> {
    let content = fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// `~/.config/freeroot/config.toml`, if `HOME` is set.
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config/freeroot/config.toml"))
}

/// `~/.local/share/freeroot`, falling back to the system temp dir when
/// there is no home directory (common in notebook sandboxes).
pub fn default_workspace() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home).join(".local/share/freeroot"),
        _ => std::env::temp_dir().join("freeroot"),
    }
}

/// Values given on the command line or through `FREEROOT_*` variables.
/// These take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub workspace: Option<PathBuf>,
    pub arch: Option<String>,
    pub engine_url: Option<String>,
    pub rootfs_url: Option<String>,
    pub engine_dialect: Option<EngineDialect>,
    pub binds: Vec<String>,
    pub env: Vec<String>,
    pub shell: Vec<String>,
    pub force: bool,
}

/// A remote artifact: URL template plus optional pinned digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSource {
    pub url_template: String,
    pub blake3: Option<String>,
}

impl ArtifactSource {
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            blake3: None,
        }
    }

    /// Expand `{arch}` (Debian name) and `{machine}` (kernel name).
    pub fn url(&self, arch: Architecture) -> String {
        self.url_template
            .replace("{arch}", arch.debian_name())
            .replace("{machine}", arch.machine_name())
    }
}

/// Effective configuration for one bootstrap run.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub workspace: PathBuf,
    pub arch_override: Option<String>,
    pub engine: ArtifactSource,
    pub rootfs: ArtifactSource,
    pub dialect: EngineDialect,
    pub extra_binds: Vec<Mount>,
    pub extra_env: BTreeMap<String, String>,
    /// Empty means "pick the rootfs login shell".
    pub shell: Vec<String>,
    pub force: bool,
}

impl BootstrapConfig {
    /// Built-in defaults rooted at `workspace`.
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            arch_override: None,
            engine: ArtifactSource::new(DEFAULT_ENGINE_URL),
            rootfs: ArtifactSource::new(DEFAULT_ROOTFS_URL),
            dialect: EngineDialect::default(),
            extra_binds: Vec::new(),
            extra_env: BTreeMap::new(),
            shell: Vec::new(),
            force: false,
        }
    }

    /// Merge overrides over the config file over built-in defaults.
    pub fn resolve(file: &ConfigFile, overrides: Overrides) -> Result<Self, SchemaError> {
        let workspace = overrides
            .workspace
            .or_else(|| file.workspace.clone())
            .unwrap_or_else(default_workspace);
        let mut config = Self::new(workspace);

        config.arch_override = overrides.arch.or_else(|| file.arch.clone());
        config.dialect = overrides
            .engine_dialect
            .or(file.engine_dialect)
            .unwrap_or_default();

        if let Some(url) = overrides
            .engine_url
            .or_else(|| file.artifacts.engine_url.clone())
        {
            config.engine.url_template = url;
        }
        if let Some(url) = overrides
            .rootfs_url
            .or_else(|| file.artifacts.rootfs_url.clone())
        {
            config.rootfs.url_template = url;
        }
        config.engine.blake3 = validate_digest(file.artifacts.engine_blake3.as_deref())?;
        config.rootfs.blake3 = validate_digest(file.artifacts.rootfs_blake3.as_deref())?;

        for spec in file.launch.binds.iter().chain(overrides.binds.iter()) {
            config.extra_binds.push(parse_bind_spec(spec)?);
        }

        for (key, value) in &file.launch.env {
            if !is_valid_env_key(key) {
                return Err(SchemaError::InvalidEnv(format!("{key}={value}")));
            }
            config.extra_env.insert(key.clone(), value.clone());
        }
        for pair in &overrides.env {
            let (key, value) = parse_env_pair(pair)?;
            config.extra_env.insert(key, value);
        }

        config.shell = if overrides.shell.is_empty() {
            file.launch.shell.clone()
        } else {
            overrides.shell
        };
        config.force = overrides.force;

        for template in [&config.engine.url_template, &config.rootfs.url_template] {
            validate_url_template(template)?;
        }

        Ok(config)
    }
}

fn validate_digest(digest: Option<&str>) -> Result<Option<String>, SchemaError> {
    let Some(raw) = digest else {
        return Ok(None);
    };
    let digest = raw.trim().to_ascii_lowercase();
    if digest.len() != 64 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(SchemaError::InvalidDigest(raw.to_owned()));
    }
    Ok(Some(digest))
}

fn validate_url_template(template: &str) -> Result<(), SchemaError> {
    let supported = ["http://", "https://", "file://"];
    if supported.iter().any(|scheme| template.starts_with(scheme)) {
        Ok(())
    } else {
        Err(SchemaError::InvalidUrl(template.to_owned()))
    }
}
