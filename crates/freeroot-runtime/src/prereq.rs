use freeroot_schema::Architecture;
use serde::Serialize;
use std::fmt;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Host tools worth knowing about in a locked-down sandbox.
const HELPFUL_COMMANDS: &[&str] = &[
    "proot", "sudo", "docker", "kubectl", "curl", "wget", "tar", "pip",
];

/// A problem that prevents a bootstrap, with an actionable hint.
#[derive(Debug, Clone, Serialize)]
pub struct MissingPrereq {
    pub name: String,
    pub purpose: String,
    pub hint: String,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  - {}: {} ({})", self.name, self.purpose, self.hint)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Check {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

impl Check {
    fn new(name: impl Into<String>, ok: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ok,
            detail: detail.into(),
        }
    }
}

/// What `freeroot doctor` reports about the host.
#[derive(Debug, Clone, Serialize)]
pub struct HostReport {
    pub hostname: String,
    pub uid: u32,
    pub machine: String,
    pub architecture: Option<Architecture>,
    pub in_container: bool,
    pub workspace: PathBuf,
    pub writable: Vec<Check>,
    pub commands: Vec<Check>,
    pub network: Vec<Check>,
}

impl HostReport {
    /// Problems that would make a bootstrap fail.
    pub fn blocking_problems(&self) -> Vec<MissingPrereq> {
        let mut missing = Vec::new();
        if self.architecture.is_none() {
            missing.push(MissingPrereq {
                name: format!("architecture {}", self.machine),
                purpose: "no engine or rootfs build exists for it".to_owned(),
                hint: "only x86_64 and aarch64 hosts are supported".to_owned(),
            });
        }
        if let Some(check) = self.writable.iter().find(|c| c.name == "workspace") {
            if !check.ok {
                missing.push(MissingPrereq {
                    name: "writable workspace".to_owned(),
                    purpose: format!("{} cannot be created or written", self.workspace.display()),
                    hint: "pass --workspace with a writable directory, e.g. /tmp/freeroot".to_owned(),
                });
            }
        }
        for check in self.network.iter().filter(|c| !c.ok) {
            missing.push(MissingPrereq {
                name: check.name.clone(),
                purpose: "artifact host is unreachable".to_owned(),
                hint: "use --engine-url/--rootfs-url with a reachable mirror or file:// copy"
                    .to_owned(),
            });
        }
        missing
    }
}

/// Format blocking problems into a user-facing message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("bootstrap prerequisites not met:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg
}

/// Inspect the host: identity, writable locations, tools, and whether the
/// artifact URLs can be reached.
pub fn inspect_host(workspace: &Path, artifact_urls: &[String], timeout: Duration) -> HostReport {
    let machine = freeroot_schema::arch::host_machine().unwrap_or_else(|_| "unknown".to_owned());
    let architecture = Architecture::from_machine(&machine).ok();

    let mut writable = Vec::new();
    let workspace_probe = nearest_existing(workspace);
    writable.push(Check::new(
        "workspace",
        workspace_probe.as_deref().is_some_and(is_writable),
        workspace.display().to_string(),
    ));
    let mut candidates = vec![PathBuf::from("/tmp"), PathBuf::from("/var/tmp")];
    if let Some(home) = std::env::var_os("HOME") {
        candidates.push(PathBuf::from(home));
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd);
    }
    for path in candidates.into_iter().filter(|p| p.exists()) {
        let ok = is_writable(&path);
        let detail = if ok { "writable" } else { "read-only" };
        writable.push(Check::new(path.display().to_string(), ok, detail));
    }

    let commands = HELPFUL_COMMANDS
        .iter()
        .map(|name| match find_command(name) {
            Some(path) => Check::new(*name, true, path.display().to_string()),
            None => Check::new(*name, false, "not found"),
        })
        .collect();

    let network = artifact_urls
        .iter()
        .map(|url| probe_url(url, timeout))
        .collect();

    HostReport {
        hostname: hostname(),
        uid: current_uid(),
        machine,
        architecture,
        in_container: Path::new("/.dockerenv").exists()
            || Path::new("/run/.containerenv").exists(),
        workspace: workspace.to_path_buf(),
        writable,
        commands,
        network,
    }
}

/// Look a command up on `PATH`.
pub fn find_command(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

fn nearest_existing(path: &Path) -> Option<PathBuf> {
    path.ancestors().find(|p| p.exists()).map(Path::to_path_buf)
}

#[allow(unsafe_code)]
fn is_writable(path: &Path) -> bool {
    use std::os::unix::ffi::OsStrExt;
    let Ok(c_path) = std::ffi::CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: access() reads a NUL-terminated path we own; no other effects.
    unsafe { libc::access(c_path.as_ptr(), libc::W_OK) == 0 }
}

#[allow(unsafe_code)]
fn current_uid() -> u32 {
    // SAFETY: getuid() is always safe, has no failure mode.
    unsafe { libc::getuid() }
}

#[allow(unsafe_code)]
fn hostname() -> String {
    let mut buf = [0u8; 256];
    // SAFETY: the buffer is valid for `buf.len()` bytes; gethostname writes at most that.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if rc != 0 {
        return "unknown".to_owned();
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

/// Host and port a URL connects to. `None` for `file://` and unparsable URLs.
pub fn url_endpoint(url: &str) -> Option<(String, u16)> {
    let (rest, default_port) = if let Some(rest) = url.strip_prefix("https://") {
        (rest, 443)
    } else if let Some(rest) = url.strip_prefix("http://") {
        (rest, 80)
    } else {
        return None;
    };
    let authority = rest.split(['/', '?', '#']).next()?;
    let authority = authority.rsplit('@').next()?;
    if authority.is_empty() {
        return None;
    }
    if let Some(bracketed) = authority.strip_prefix('[') {
        let (host, after) = bracketed.split_once(']')?;
        let port = match after.strip_prefix(':') {
            Some(p) => p.parse().ok()?,
            None => default_port,
        };
        return Some((host.to_owned(), port));
    }
    match authority.rsplit_once(':') {
        Some((host, port)) => Some((host.to_owned(), port.parse().ok()?)),
        None => Some((authority.to_owned(), default_port)),
    }
}

/// TCP reachability of the host behind `url`; `file://` URLs check the path.
pub fn probe_url(url: &str, timeout: Duration) -> Check {
    if let Some(path) = url.strip_prefix("file://") {
        let exists = Path::new(path).exists();
        return Check::new(url, exists, if exists { "present" } else { "missing" });
    }
    let Some((host, port)) = url_endpoint(url) else {
        return Check::new(url, false, "unsupported URL");
    };
    let label = format!("{host}:{port}");
    let addrs = match (host.as_str(), port).to_socket_addrs() {
        Ok(a) => a.collect::<Vec<_>>(),
        Err(e) => return Check::new(label, false, format!("DNS lookup failed: {e}")),
    };
    for addr in &addrs {
        if TcpStream::connect_timeout(addr, timeout).is_ok() {
            return Check::new(label, true, "reachable");
        }
    }
    Check::new(label, false, "connection failed")
}
