use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Aliases accepted by [`Architecture::from_machine`], grouped by variant.
const AMD64_ALIASES: &[&str] = &["x86_64", "amd64", "x64"];
const ARM64_ALIASES: &[&str] = &["aarch64", "arm64", "armv8"];

/// CPU architecture family of the artifacts to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    Amd64,
    Arm64,
}

impl Architecture {
    /// Map a machine identifier (as reported by `uname -m`) to a variant.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// Unknown identifiers are an error; there is no fallback variant.
    pub fn from_machine(machine: &str) -> Result<Self, SchemaError> {
        let normalized = machine.trim().to_ascii_lowercase();
        if AMD64_ALIASES.contains(&normalized.as_str()) {
            Ok(Self::Amd64)
        } else if ARM64_ALIASES.contains(&normalized.as_str()) {
            Ok(Self::Arm64)
        } else {
            Err(SchemaError::UnsupportedArchitecture {
                machine: machine.trim().to_owned(),
                supported: supported_aliases(),
            })
        }
    }

    /// Debian-style name used by rootfs tarballs (`amd64`, `arm64`).
    pub fn debian_name(self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
        }
    }

    /// Kernel machine name used by engine builds (`x86_64`, `aarch64`).
    pub fn machine_name(self) -> &'static str {
        match self {
            Self::Amd64 => "x86_64",
            Self::Arm64 => "aarch64",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.debian_name())
    }
}

fn supported_aliases() -> String {
    AMD64_ALIASES
        .iter()
        .chain(ARM64_ALIASES)
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolve the architecture of the running host.
pub fn resolve() -> Result<Architecture, SchemaError> {
    let machine = host_machine()?;
    Architecture::from_machine(&machine)
}

/// Resolve from an explicit override when one is given, otherwise from the host.
pub fn resolve_with_override(arch_override: Option<&str>) -> Result<Architecture, SchemaError> {
    match arch_override {
        Some(machine) => Architecture::from_machine(machine),
        None => resolve(),
    }
}

/// Machine field of `uname(2)`.
#[allow(unsafe_code)]
pub fn host_machine() -> Result<String, SchemaError> {
    // SAFETY: utsname is a plain C struct of fixed-size char arrays; all-zero is valid.
    let mut uts: libc::utsname = unsafe { std::mem::zeroed() };
    // SAFETY: uname() only writes into the struct we own and pass by pointer.
    let rc = unsafe { libc::uname(&mut uts) };
    if rc != 0 {
        return Err(SchemaError::Io(std::io::Error::last_os_error()));
    }
    // SAFETY: the kernel NUL-terminates every utsname field.
    let machine = unsafe { std::ffi::CStr::from_ptr(uts.machine.as_ptr()) };
    Ok(machine.to_string_lossy().into_owned())
}
