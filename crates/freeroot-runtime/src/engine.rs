use crate::RuntimeError;
use std::fs;
use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// A freshly written binary can briefly report ETXTBSY while another thread
/// forks with the write descriptor still inherited.
const TEXT_BUSY_RETRIES: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInfo {
    pub path: PathBuf,
    /// First non-empty line the engine printed for `--version`.
    pub version: Option<String>,
}

/// Make the engine binary executable and prove that it runs on this host.
pub fn prepare_engine(path: &Path, timeout: Duration) -> Result<EngineInfo, RuntimeError> {
    let meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(RuntimeError::EngineExec(format!(
                "engine binary not found at {}",
                path.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };
    if !meta.is_file() {
        return Err(RuntimeError::EngineExec(format!(
            "{} is not a regular file",
            path.display()
        )));
    }
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    debug!("set 0755 on {}", path.display());

    let version = probe_version(path, timeout)?;
    if let Some(ref v) = version {
        info!("engine ready: {v}");
    }
    Ok(EngineInfo {
        path: path.to_path_buf(),
        version,
    })
}

fn spawn_probe(path: &Path) -> Result<std::process::Child, RuntimeError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let spawned = Command::new(path)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        match spawned {
            Ok(child) => return Ok(child),
            Err(e) if e.raw_os_error() == Some(libc::ETXTBSY) && attempt < TEXT_BUSY_RETRIES => {
                debug!("engine busy, retrying spawn");
                std::thread::sleep(POLL_INTERVAL * attempt);
            }
            Err(e) if e.raw_os_error() == Some(libc::ENOEXEC) => {
                return Err(RuntimeError::EngineExec(arch_mismatch_hint(path)));
            }
            Err(e) => {
                return Err(RuntimeError::EngineExec(format!(
                    "failed to execute {}: {e}",
                    path.display()
                )));
            }
        }
    }
}

fn arch_mismatch_hint(path: &Path) -> String {
    let machine = freeroot_schema::arch::host_machine().unwrap_or_else(|_| "unknown".to_owned());
    format!(
        "{} is not an executable for this host (machine {machine}); \
         was it downloaded for another architecture? try --force or --arch",
        path.display()
    )
}

fn probe_version(path: &Path, timeout: Duration) -> Result<Option<String>, RuntimeError> {
    let mut child = spawn_probe(path)?;
    let deadline = Instant::now() + timeout;

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(RuntimeError::EngineExec(format!(
                "{} --version did not finish within {}s",
                path.display(),
                timeout.as_secs()
            )));
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    let mut stdout = String::new();
    let mut stderr = String::new();
    if let Some(mut out) = child.stdout.take() {
        let _ = out.read_to_string(&mut stdout);
    }
    if let Some(mut err) = child.stderr.take() {
        let _ = err.read_to_string(&mut stderr);
    }

    // 126/127: the shell fallback of exec*p could not run the file either.
    if matches!(status.code(), Some(126 | 127)) {
        return Err(RuntimeError::EngineExec(arch_mismatch_hint(path)));
    }
    if !status.success() {
        warn!(
            "{} --version exited with {status}; continuing",
            path.display()
        );
    }

    Ok(first_line(&stdout).or_else(|| first_line(&stderr)))
}

fn first_line(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        path
    }

    #[test]
    fn makes_binary_executable_and_reads_version() {
        let dir = tempfile::tempdir().unwrap();
        let engine = script(dir.path(), "engine-binary", "echo\necho 'fake-engine 5.1.0'");

        let info = prepare_engine(&engine, DEFAULT_PROBE_TIMEOUT).unwrap();
        assert_eq!(info.version.as_deref(), Some("fake-engine 5.1.0"));
        let mode = fs::metadata(&engine).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn nonzero_version_exit_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let engine = script(dir.path(), "engine-binary", "echo 'usage: engine' >&2\nexit 1");
        let info = prepare_engine(&engine, DEFAULT_PROBE_TIMEOUT).unwrap();
        assert_eq!(info.version.as_deref(), Some("usage: engine"));
    }

    #[test]
    fn missing_binary_is_engine_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = prepare_engine(&dir.path().join("nope"), DEFAULT_PROBE_TIMEOUT).unwrap_err();
        assert!(matches!(err, RuntimeError::EngineExec(_)));
    }

    #[test]
    fn non_executable_format_is_engine_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = dir.path().join("engine-binary");
        // No ELF header and no shebang: execve fails with ENOEXEC, and the
        // shell fallback some exec paths take cannot run it either (127).
        fs::write(&engine, "freeroot-no-such-command-xyz\n").unwrap();

        let err = prepare_engine(&engine, DEFAULT_PROBE_TIMEOUT).unwrap_err();
        assert!(matches!(err, RuntimeError::EngineExec(_)), "{err:?}");
    }

    #[test]
    fn hanging_probe_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let engine = script(dir.path(), "engine-binary", "exec sleep 30");
        let started = Instant::now();
        let err = prepare_engine(&engine, Duration::from_millis(300)).unwrap_err();
        assert!(matches!(err, RuntimeError::EngineExec(ref m) if m.contains("did not finish")));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn first_line_skips_blank_lines() {
        assert_eq!(first_line("\n  \n v1 \nv2"), Some("v1".to_owned()));
        assert_eq!(first_line(""), None);
    }
}
