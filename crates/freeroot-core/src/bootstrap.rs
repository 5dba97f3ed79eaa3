use crate::lifecycle::{Lifecycle, Stage};
use crate::CoreError;
use freeroot_remote::{
    FetchError, FetchOutcome, FetchProgress, Fetcher, NoProgress, RetryPolicy, SchemeTransport,
    Transport,
};
use freeroot_runtime::{
    compose, default_shell, install_rootfs, launch, prepare_engine, seed_rootfs, signal, terminal,
    ComposeOptions, LaunchOutcome, LaunchPlan, DEFAULT_PROBE_TIMEOUT,
};
use freeroot_schema::{resolve_with_override, BootstrapConfig};
use freeroot_store::{
    BuildTarget, CompletionMarker, Prepared, Workspace, WorkspaceLayout, WorkspaceLock,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Name of the rootfs tarball while it sits in `downloads/`.
const ROOTFS_DOWNLOAD: &str = "rootfs-archive";

/// How one bootstrap run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunResult {
    /// Bootstrap finished; carries the session's exit code (0 without a session).
    Success(i32),
    Failed { stage: Stage, cause: String },
    Interrupted,
}

impl RunResult {
    /// Process exit code: the child's own code, 1 for a failed bootstrap,
    /// 130 after an interrupt.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunResult::Success(code) => u8::try_from(*code).unwrap_or(1),
            RunResult::Failed { .. } => 1,
            RunResult::Interrupted => 130,
        }
    }
}

/// Receives stage changes and hands out download progress observers.
pub trait BootstrapReporter: Send + Sync {
    fn stage(&self, _stage: Stage) {}

    fn download(&self, _label: &str) -> Box<dyn FetchProgress> {
        Box::new(NoProgress)
    }
}

/// Reports nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl BootstrapReporter for SilentReporter {}

#[derive(Debug, Clone, Copy)]
pub struct BootstrapOptions {
    /// Stop after composing the session instead of launching it.
    pub no_launch: bool,
    pub probe_timeout: Duration,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            no_launch: false,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// Drives one run from architecture detection to the end of the session.
pub struct Bootstrapper {
    config: BootstrapConfig,
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    reporter: Arc<dyn BootstrapReporter>,
    options: BootstrapOptions,
}

impl Bootstrapper {
    pub fn new(config: BootstrapConfig) -> Self {
        Self {
            config,
            transport: Arc::new(SchemeTransport::new()),
            retry: RetryPolicy::default(),
            reporter: Arc::new(SilentReporter),
            options: BootstrapOptions::default(),
        }
    }

    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn BootstrapReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: BootstrapOptions) -> Self {
        self.options = options;
        self
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// Run the whole sequence. Errors never escape: they end up in
    /// [`RunResult::Failed`] tagged with the stage they happened in.
    pub fn run(&self) -> RunResult {
        signal::install_handlers();
        let mut life = Lifecycle::new();
        match self.run_stages(&mut life) {
            Ok(result) => result,
            Err(e) if is_interrupt(&e) => {
                warn!("bootstrap interrupted during {}", life.current());
                life.fail();
                RunResult::Interrupted
            }
            Err(e) => {
                let stage = life.fail();
                self.reporter.stage(Stage::Failed);
                let cause = error_chain(&e);
                error!("bootstrap failed during {stage}: {cause}");
                RunResult::Failed { stage, cause }
            }
        }
    }

    fn advance(&self, life: &mut Lifecycle, to: Stage) -> Result<(), CoreError> {
        if signal::interrupted() {
            return Err(CoreError::Interrupted);
        }
        life.advance(to)?;
        self.reporter.stage(to);
        Ok(())
    }

    fn run_stages(&self, life: &mut Lifecycle) -> Result<RunResult, CoreError> {
        let cfg = &self.config;

        self.advance(life, Stage::ResolvingArch)?;
        let arch = resolve_with_override(cfg.arch_override.as_deref())?;
        info!("architecture: {arch} ({})", arch.machine_name());

        let workspace = Workspace::new(&cfg.workspace);
        let layout = workspace.layout();
        let lock = WorkspaceLock::exclusive(layout)?;

        let engine_url = cfg.engine.url(arch);
        let rootfs_url = cfg.rootfs.url(arch);
        let target = BuildTarget {
            arch,
            engine_url: &engine_url,
            rootfs_url: &rootfs_url,
        };
        let marker = match workspace.prepare(&target, cfg.force)? {
            Prepared::Reuse(marker) => {
                debug!("marker from {}", marker.completed_at);
                self.advance(life, Stage::Normalizing)?;
                None
            }
            Prepared::Fresh => {
                self.advance(life, Stage::Fetching)?;
                let marker = self.fetch_artifacts(layout, &target)?;

                self.advance(life, Stage::Installing)?;
                let archive = layout.downloads_dir().join(ROOTFS_DOWNLOAD);
                let report = install_rootfs(&archive, &layout.rootfs_dir())?;
                info!(
                    "installed rootfs: {} entries ({} skipped special files)",
                    report.entries, report.skipped_special
                );
                seed_rootfs(&layout.rootfs_dir())?;

                self.advance(life, Stage::Normalizing)?;
                Some(marker)
            }
        };

        let engine = prepare_engine(&layout.engine_binary(), self.options.probe_timeout)?;
        if let Some(marker) = marker {
            workspace.mark_complete(&marker)?;
            workspace.clear_downloads()?;
            info!("workspace {} is complete", layout.root().display());
        }

        self.advance(life, Stage::Composing)?;
        let rootfs = layout.rootfs_dir();
        let opts = ComposeOptions {
            extra_binds: cfg.extra_binds.clone(),
            extra_env: cfg.extra_env.clone(),
            ..ComposeOptions::from_host()
        };
        let composition = compose(&rootfs, &opts)?;
        for skipped in &composition.skipped {
            debug!("binding skipped: {}", skipped.as_binding());
        }

        if self.options.no_launch {
            self.advance(life, Stage::Success)?;
            return Ok(RunResult::Success(0));
        }

        self.advance(life, Stage::Launching)?;
        lock.downgrade()?;
        let command = if cfg.shell.is_empty() {
            default_shell(&rootfs)
        } else {
            cfg.shell.clone()
        };
        let plan = LaunchPlan {
            engine: engine.path,
            rootfs,
            dialect: cfg.dialect,
            mounts: composition.mounts,
            env: composition.env,
            command,
        };

        terminal::print_session_banner(arch.debian_name(), engine.version.as_deref());
        match launch(&plan)? {
            LaunchOutcome::Exited(code) => {
                terminal::print_session_exit(code);
                self.advance(life, Stage::Success)?;
                Ok(RunResult::Success(code))
            }
            LaunchOutcome::Interrupted => {
                life.fail();
                Ok(RunResult::Interrupted)
            }
        }
    }

    /// Fetch the engine and the rootfs tarball in parallel; both must land
    /// before anything is installed.
    fn fetch_artifacts(
        &self,
        layout: &WorkspaceLayout,
        target: &BuildTarget<'_>,
    ) -> Result<CompletionMarker, CoreError> {
        let cfg = &self.config;
        let engine_url = target.engine_url;
        let rootfs_url = target.rootfs_url;
        let engine_dest = layout.engine_binary();
        let rootfs_dest = layout.downloads_dir().join(ROOTFS_DOWNLOAD);

        let fetcher = Fetcher::new(Arc::clone(&self.transport))
            .with_retry(self.retry)
            .with_cancel_flag(signal::interrupt_flag());

        let (engine, rootfs) = std::thread::scope(|s| {
            let engine = s.spawn(|| {
                let expected = cfg.engine.blake3.as_deref();
                self.fetch_one(&fetcher, "engine", engine_url, &engine_dest, expected)
            });
            let rootfs = s.spawn(|| {
                let expected = cfg.rootfs.blake3.as_deref();
                self.fetch_one(&fetcher, "rootfs", rootfs_url, &rootfs_dest, expected)
            });
            (engine.join(), rootfs.join())
        });
        let engine = engine.map_err(|_| CoreError::WorkerPanicked("engine download"))??;
        let rootfs = rootfs.map_err(|_| CoreError::WorkerPanicked("rootfs download"))??;

        Ok(CompletionMarker::new(
            target.arch,
            engine_url,
            rootfs_url,
            engine.blake3,
            rootfs.blake3,
        ))
    }

    fn fetch_one(
        &self,
        fetcher: &Fetcher,
        label: &str,
        url: &str,
        dest: &Path,
        expected: Option<&str>,
    ) -> Result<FetchOutcome, FetchError> {
        let progress = self.reporter.download(label);
        fetcher.fetch(url, dest, expected, progress.as_ref())
    }
}

/// Take the workspace lock and delete the workspace. Returns whether
/// there was anything to delete.
pub fn clean_workspace(root: &Path) -> Result<bool, CoreError> {
    let workspace = Workspace::new(root);
    if !workspace.root().exists() {
        return Ok(false);
    }
    let _lock = WorkspaceLock::exclusive(workspace.layout())?;
    workspace.remove()?;
    info!("removed workspace {}", root.display());
    Ok(true)
}

fn is_interrupt(e: &CoreError) -> bool {
    matches!(
        e,
        CoreError::Interrupted | CoreError::Fetch(FetchError::Cancelled)
    ) || signal::interrupted()
}

/// Render an error with its sources, outermost first.
pub fn error_chain(e: &dyn std::error::Error) -> String {
    let mut out = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = inner.source();
    }
    out
}
