//! CLI subprocess integration tests.
//!
//! These invoke the `freeroot` binary against `file://` artifacts and a
//! shell-script engine, and check exit codes, output and workspace state.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

struct Sandbox {
    dir: tempfile::TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("home")).unwrap();
        fs::create_dir_all(dir.path().join("mirror")).unwrap();
        let sandbox = Self { dir };
        sandbox.write_engine("exit 7");
        sandbox.write_rootfs();
        sandbox
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn workspace(&self) -> PathBuf {
        self.path().join("ws")
    }

    fn mirror(&self) -> PathBuf {
        self.path().join("mirror")
    }

    /// Engine stand-in for the `{machine}`-expanded URL.
    fn write_engine(&self, session: &str) {
        let script = format!(
            "#!/bin/sh\n\
             if [ \"$1\" = \"--version\" ]; then echo 'fake-engine 1.0'; exit 0; fi\n\
             printf '%s\\n' \"$@\" > {}\n\
             {session}\n",
            self.path().join("argv").display()
        );
        fs::write(self.mirror().join("proot-x86_64"), script).unwrap();
    }

    fn write_rootfs(&self) {
        let mut builder = tar::Builder::new(Vec::new());
        for dir in ["etc", "bin", "usr"] {
            let mut h = tar::Header::new_gnu();
            h.set_entry_type(tar::EntryType::Directory);
            h.set_mode(0o755);
            h.set_size(0);
            builder.append_data(&mut h, dir, &[][..]).unwrap();
        }
        let data = b"NAME=\"Ubuntu\"\n";
        let mut h = tar::Header::new_gnu();
        h.set_mode(0o644);
        h.set_size(data.len() as u64);
        builder.append_data(&mut h, "etc/os-release", &data[..]).unwrap();
        let tar = builder.into_inner().unwrap();

        let mut enc = GzEncoder::new(Vec::new(), Compression::fast());
        enc.write_all(&tar).unwrap();
        fs::write(
            self.mirror().join("ubuntu-base-amd64.tar.gz"),
            enc.finish().unwrap(),
        )
        .unwrap();
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_freeroot"));
        cmd.env_clear()
            .env("PATH", std::env::var_os("PATH").unwrap_or_default())
            .env("HOME", self.path().join("home"))
            .env("FREEROOT_WORKSPACE", self.workspace())
            .env("FREEROOT_ARCH", "x86_64")
            .env(
                "FREEROOT_ENGINE_URL",
                format!("file://{}/proot-{{machine}}", self.mirror().display()),
            )
            .env(
                "FREEROOT_ROOTFS_URL",
                format!("file://{}/ubuntu-base-{{arch}}.tar.gz", self.mirror().display()),
            );
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.cmd().args(args).output().unwrap()
    }

    fn status_json(&self) -> serde_json::Value {
        let out = self.run(&["status", "--json"]);
        assert!(out.status.success(), "{}", stderr(&out));
        serde_json::from_slice(&out.stdout).unwrap()
    }
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

#[test]
fn cli_version_exits_zero() {
    let output = Command::new(env!("CARGO_BIN_EXE_freeroot"))
        .arg("--version")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("freeroot"));
}

#[test]
fn cli_help_lists_subcommands_and_flags() {
    let output = Command::new(env!("CARGO_BIN_EXE_freeroot"))
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let text = stdout(&output);
    for needle in ["status", "clean", "doctor", "--engine-url", "--no-launch", "--force"] {
        assert!(text.contains(needle), "help must mention {needle}: {text}");
    }
}

#[test]
fn status_of_missing_workspace() {
    let sb = Sandbox::new();
    let json = sb.status_json();
    assert_eq!(json["state"], "missing");
    assert_eq!(json["workspace"], sb.workspace().display().to_string());
}

#[test]
fn no_launch_prepares_then_status_reports_complete() {
    let sb = Sandbox::new();
    let out = sb.run(&["--no-launch"]);
    assert_eq!(out.status.code(), Some(0), "{}", stderr(&out));
    assert!(stdout(&out).contains("workspace ready"));
    assert!(sb.workspace().join("rootfs/etc/os-release").is_file());
    assert!(sb.workspace().join(".bootstrap-complete").is_file());

    let json = sb.status_json();
    assert_eq!(json["state"], "complete");
    assert_eq!(json["marker"]["arch"], "amd64");
    assert!(json["marker"]["engine_url"]
        .as_str()
        .unwrap()
        .ends_with("/proot-x86_64"));
}

#[test]
fn session_exit_code_passes_through() {
    let sb = Sandbox::new();
    let out = sb.run(&["--engine-dialect", "generic", "--", "/bin/sh", "-c", "true"]);
    assert_eq!(out.status.code(), Some(7), "{}", stderr(&out));

    let argv = fs::read_to_string(sb.path().join("argv")).unwrap();
    let argv: Vec<&str> = argv.lines().collect();
    assert!(argv.contains(&"--assume-yes"), "{argv:?}");
    assert_eq!(argv[argv.len() - 3..], ["/bin/sh", "-c", "true"]);
}

#[test]
fn second_run_reuses_workspace() {
    let sb = Sandbox::new();
    assert_eq!(sb.run(&["--no-launch"]).status.code(), Some(0));

    // Take the artifacts away: a reusing run must not need them.
    fs::remove_dir_all(sb.mirror()).unwrap();
    let out = sb.run(&["--no-launch"]);
    assert_eq!(out.status.code(), Some(0), "{}", stderr(&out));

    let out = sb.run(&["--no-launch", "--force"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("fetching"), "{}", stderr(&out));
}

#[test]
fn unsupported_architecture_fails_with_exit_one() {
    let sb = Sandbox::new();
    let out = sb.run(&["--arch", "riscv64", "--no-launch"]);
    assert_eq!(out.status.code(), Some(1));
    let err = stderr(&out);
    assert!(err.contains("riscv64"), "{err}");
    assert!(err.contains("x86_64"), "supported list is shown: {err}");
    assert!(!sb.workspace().exists());
}

#[test]
fn invalid_env_pair_is_rejected() {
    let sb = Sandbox::new();
    let out = sb.run(&["--env", "1BAD=x", "--no-launch"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("1BAD=x"));
}

#[test]
fn clean_removes_workspace() {
    let sb = Sandbox::new();
    assert_eq!(sb.run(&["--no-launch"]).status.code(), Some(0));

    let out = sb.run(&["clean", "--json"]);
    assert!(out.status.success(), "{}", stderr(&out));
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["removed"], true);
    assert!(!sb.workspace().exists());

    let out = sb.run(&["clean", "--json"]);
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["removed"], false);
}

#[test]
fn config_file_supplies_workspace() {
    let sb = Sandbox::new();
    let config_ws = sb.path().join("from-config");
    let config = sb.path().join("freeroot.toml");
    fs::write(
        &config,
        format!("workspace = \"{}\"\n", config_ws.display()),
    )
    .unwrap();

    let out = sb
        .cmd()
        .env_remove("FREEROOT_WORKSPACE")
        .args(["--config", config.to_str().unwrap(), "--no-launch"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(0), "{}", stderr(&out));
    assert!(config_ws.join(".bootstrap-complete").is_file());
    assert!(!sb.workspace().exists());
}

#[test]
fn doctor_json_reports_host() {
    let sb = Sandbox::new();
    let out = sb.run(&["doctor", "--json"]);
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert!(json["host"]["machine"].as_str().is_some_and(|m| !m.is_empty()));
    assert!(json["healthy"].is_boolean());
    let network = json["host"]["network"].as_array().unwrap();
    assert_eq!(network.len(), 2);
    assert!(network.iter().all(|c| c["ok"] == true), "{network:?}");
}
