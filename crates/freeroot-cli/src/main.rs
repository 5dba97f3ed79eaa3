mod commands;

use clap::{Parser, Subcommand};
use commands::EXIT_FAILURE;
use freeroot_schema::{EngineDialect, Overrides};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "freeroot",
    version,
    about = "Bootstrap an unprivileged root filesystem and open a shell inside it"
)]
struct Cli {
    /// Target architecture (x86_64, amd64, aarch64, arm64, ...). Defaults to the host.
    #[arg(long, env = "FREEROOT_ARCH", global = true)]
    arch: Option<String>,

    /// Workspace directory holding the engine binary and the rootfs.
    #[arg(long, env = "FREEROOT_WORKSPACE", global = true)]
    workspace: Option<PathBuf>,

    /// Engine download URL; `{arch}` and `{machine}` are expanded.
    #[arg(long, env = "FREEROOT_ENGINE_URL", global = true)]
    engine_url: Option<String>,

    /// Rootfs tarball URL; `{arch}` and `{machine}` are expanded.
    #[arg(long, env = "FREEROOT_ROOTFS_URL", global = true)]
    rootfs_url: Option<String>,

    /// Config file (default: ~/.config/freeroot/config.toml when present).
    #[arg(long, env = "FREEROOT_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Discard an existing workspace and bootstrap from scratch.
    #[arg(long, default_value_t = false)]
    force: bool,

    /// Command-line flavour of the engine binary (proot or generic).
    #[arg(long)]
    engine_dialect: Option<EngineDialect>,

    /// Extra binding into the root, repeatable.
    #[arg(long = "bind", value_name = "HOST[:GUEST]")]
    binds: Vec<String>,

    /// Extra environment variable for the session, repeatable.
    #[arg(long = "env", value_name = "KEY=VALUE")]
    env: Vec<String>,

    /// Prepare the workspace but do not start a session.
    #[arg(long, default_value_t = false)]
    no_launch: bool,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Option<Commands>,

    /// Command to run inside the root instead of a login shell (after --).
    #[arg(last = true, value_name = "COMMAND")]
    shell: Vec<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show whether the workspace is complete and what it was built from.
    Status,
    /// Delete the workspace.
    Clean,
    /// Report what the host offers: architecture, writable locations,
    /// tools and reachability of the artifact hosts.
    Doctor,
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("FREEROOT_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let overrides = Overrides {
        workspace: cli.workspace,
        arch: cli.arch,
        engine_url: cli.engine_url,
        rootfs_url: cli.rootfs_url,
        engine_dialect: cli.engine_dialect,
        binds: cli.binds,
        env: cli.env,
        shell: cli.shell,
        force: cli.force,
    };
    let config = match commands::resolve_config(cli.config.as_deref(), overrides) {
        Ok(config) => config,
        Err(msg) => {
            eprintln!("error: {msg}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    tracing::debug!("effective config: {config:?}");

    let result = match cli.command {
        None => commands::run::run(config, cli.no_launch),
        Some(Commands::Status) => commands::status::run(&config.workspace, cli.json),
        Some(Commands::Clean) => commands::clean::run(&config.workspace, cli.json),
        Some(Commands::Doctor) => commands::doctor::run(&config, cli.json),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn trailing_command_and_repeated_flags() {
        let cli = Cli::try_parse_from([
            "freeroot",
            "--bind",
            "/data",
            "--bind",
            "/srv:/mnt/srv",
            "--env",
            "EDITOR=vi",
            "--engine-dialect",
            "generic",
            "--",
            "/bin/sh",
            "-c",
            "true",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.binds, vec!["/data", "/srv:/mnt/srv"]);
        assert_eq!(cli.env, vec!["EDITOR=vi"]);
        assert_eq!(cli.engine_dialect, Some(EngineDialect::Generic));
        assert_eq!(cli.shell, vec!["/bin/sh", "-c", "true"]);
    }

    #[test]
    fn subcommand_with_global_workspace() {
        let cli = Cli::try_parse_from(["freeroot", "status", "--workspace", "/tmp/ws", "--json"])
            .unwrap();
        assert!(matches!(cli.command, Some(Commands::Status)));
        assert_eq!(cli.workspace, Some(PathBuf::from("/tmp/ws")));
        assert!(cli.json);
    }

    #[test]
    fn unknown_dialect_is_rejected() {
        assert!(Cli::try_parse_from(["freeroot", "--engine-dialect", "chroot"]).is_err());
    }
}
