use crate::{signal, terminal, RuntimeError};
use freeroot_schema::{EngineDialect, Mount};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tracing::{debug, info};

/// Host variables that configure the engine itself and must reach it.
const ENGINE_ENV_PREFIX: &str = "PROOT_";

/// Everything needed to start one session.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub engine: PathBuf,
    pub rootfs: PathBuf,
    pub dialect: EngineDialect,
    pub mounts: Vec<Mount>,
    pub env: BTreeMap<String, String>,
    /// Program and arguments run inside the root.
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// The engine exited with this code (or 128+n for a fatal signal n).
    Exited(i32),
    /// The session was ended by SIGINT, SIGTERM or SIGHUP.
    Interrupted,
}

impl LaunchPlan {
    /// Engine command line for the configured dialect.
    ///
    /// Non-interactive confirmation lives here and only here: the generic
    /// dialect passes `--assume-yes`, PRoot never asks.
    pub fn engine_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        match self.dialect {
            EngineDialect::Proot => {
                let mut rootfs = OsString::from("--rootfs=");
                rootfs.push(&self.rootfs);
                args.push(rootfs);
                args.push("-0".into());
                args.push("-w".into());
                args.push("/root".into());
                for m in &self.mounts {
                    args.push("-b".into());
                    args.push(m.as_binding().into());
                }
                args.push("--kill-on-exit".into());
            }
            EngineDialect::Generic => {
                for m in &self.mounts {
                    args.push("--bind".into());
                    args.push(m.as_binding().into());
                }
                args.push("--rootfs".into());
                args.push(self.rootfs.clone().into_os_string());
                args.push("--assume-yes".into());
                args.push("--".into());
            }
        }
        args.extend(self.command.iter().map(OsString::from));
        args
    }

    /// The engine process, attached to the caller's terminal.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.engine);
        cmd.args(self.engine_args());
        cmd.env_clear();
        for (key, value) in std::env::vars_os() {
            if key.to_string_lossy().starts_with(ENGINE_ENV_PREFIX) {
                cmd.env(key, value);
            }
        }
        cmd.envs(&self.env);
        cmd.stdin(Stdio::inherit());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());
        cmd
    }
}

/// `/bin/bash --login` if the image has bash, otherwise `/bin/sh -l`.
pub fn default_shell(rootfs: &Path) -> Vec<String> {
    let has_bash = ["bin/bash", "usr/bin/bash"]
        .iter()
        .any(|p| rootfs.join(p).symlink_metadata().is_ok());
    if has_bash {
        vec!["/bin/bash".to_owned(), "--login".to_owned()]
    } else {
        vec!["/bin/sh".to_owned(), "-l".to_owned()]
    }
}

pub fn exit_outcome(status: ExitStatus) -> LaunchOutcome {
    if let Some(code) = status.code() {
        return LaunchOutcome::Exited(code);
    }
    match status.signal() {
        Some(libc::SIGINT | libc::SIGTERM | libc::SIGHUP) => LaunchOutcome::Interrupted,
        Some(sig) => LaunchOutcome::Exited(128 + sig),
        None => LaunchOutcome::Exited(1),
    }
}

/// Run the session and block until the engine exits. No timeout.
pub fn launch(plan: &LaunchPlan) -> Result<LaunchOutcome, RuntimeError> {
    signal::install_handlers();
    debug!(
        "exec {} {:?}",
        plan.engine.display(),
        plan.engine_args()
    );

    let mut child = plan.to_command().spawn().map_err(|e| {
        RuntimeError::EngineExec(format!("failed to start {}: {e}", plan.engine.display()))
    })?;
    signal::set_child(child.id());
    terminal::emit_session_push(&plan.rootfs);

    let status = child.wait();

    terminal::emit_session_pop();
    signal::clear_child();
    let outcome = exit_outcome(status?);
    info!("session ended: {outcome:?}");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use freeroot_schema::{parse_bind_spec, MountKind};
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn plan(dialect: EngineDialect) -> LaunchPlan {
        LaunchPlan {
            engine: PathBuf::from("/ws/engine-binary"),
            rootfs: PathBuf::from("/ws/rootfs"),
            dialect,
            mounts: vec![
                Mount::same("/proc", MountKind::Proc).unwrap(),
                parse_bind_spec("/data:/mnt/data").unwrap(),
            ],
            env: BTreeMap::new(),
            command: vec!["/bin/bash".to_owned(), "--login".to_owned()],
        }
    }

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn proot_dialect_args() {
        assert_eq!(
            strings(plan(EngineDialect::Proot).engine_args()),
            vec![
                "--rootfs=/ws/rootfs",
                "-0",
                "-w",
                "/root",
                "-b",
                "/proc:/proc",
                "-b",
                "/data:/mnt/data",
                "--kill-on-exit",
                "/bin/bash",
                "--login",
            ]
        );
    }

    #[test]
    fn generic_dialect_args() {
        assert_eq!(
            strings(plan(EngineDialect::Generic).engine_args()),
            vec![
                "--bind",
                "/proc:/proc",
                "--bind",
                "/data:/mnt/data",
                "--rootfs",
                "/ws/rootfs",
                "--assume-yes",
                "--",
                "/bin/bash",
                "--login",
            ]
        );
    }

    #[test]
    fn shell_selection() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(default_shell(dir.path()), vec!["/bin/sh", "-l"]);
        fs::create_dir_all(dir.path().join("bin")).unwrap();
        fs::write(dir.path().join("bin/bash"), b"").unwrap();
        assert_eq!(default_shell(dir.path()), vec!["/bin/bash", "--login"]);
    }

    #[test]
    fn exit_mapping() {
        assert_eq!(
            exit_outcome(ExitStatus::from_raw(0)),
            LaunchOutcome::Exited(0)
        );
        assert_eq!(
            exit_outcome(ExitStatus::from_raw(3 << 8)),
            LaunchOutcome::Exited(3)
        );
        assert_eq!(
            exit_outcome(ExitStatus::from_raw(libc::SIGINT)),
            LaunchOutcome::Interrupted
        );
        assert_eq!(
            exit_outcome(ExitStatus::from_raw(libc::SIGTERM)),
            LaunchOutcome::Interrupted
        );
        assert_eq!(
            exit_outcome(ExitStatus::from_raw(libc::SIGKILL)),
            LaunchOutcome::Exited(128 + libc::SIGKILL)
        );
    }

    fn fake_engine(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("engine-binary");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn launch_passes_exit_code_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("seen");
        let engine = fake_engine(
            dir.path(),
            &format!(
                "echo \"$FREEROOT $HOME $*\" > {}\nexit 7",
                out.display()
            ),
        );
        let mut env = BTreeMap::new();
        env.insert("FREEROOT".to_owned(), "1".to_owned());
        env.insert("HOME".to_owned(), "/root".to_owned());
        env.insert("PATH".to_owned(), "/usr/bin:/bin".to_owned());

        let plan = LaunchPlan {
            engine,
            rootfs: dir.path().join("rootfs"),
            dialect: EngineDialect::Generic,
            mounts: Vec::new(),
            env,
            command: vec!["/bin/sh".to_owned(), "-l".to_owned()],
        };
        let outcome = launch(&plan).unwrap();
        assert_eq!(outcome, LaunchOutcome::Exited(7));

        let seen = fs::read_to_string(&out).unwrap();
        assert!(seen.starts_with("1 /root --rootfs "), "{seen}");
        assert!(seen.contains("--assume-yes -- /bin/sh -l"), "{seen}");
    }

    #[test]
    fn launch_reports_killed_child_as_interrupted() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(dir.path(), "kill -TERM $$");
        let plan = LaunchPlan {
            engine,
            rootfs: dir.path().to_path_buf(),
            dialect: EngineDialect::Proot,
            mounts: Vec::new(),
            env: BTreeMap::new(),
            command: Vec::new(),
        };
        assert_eq!(launch(&plan).unwrap(), LaunchOutcome::Interrupted);
    }

    #[test]
    fn launch_missing_engine_is_error() {
        let plan = LaunchPlan {
            engine: PathBuf::from("/nonexistent/freeroot/engine"),
            rootfs: PathBuf::from("/nonexistent"),
            dialect: EngineDialect::Proot,
            mounts: Vec::new(),
            env: BTreeMap::new(),
            command: Vec::new(),
        };
        assert!(matches!(launch(&plan), Err(RuntimeError::EngineExec(_))));
    }
}
