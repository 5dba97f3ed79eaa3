use crate::{FetchError, Transport};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

const CHUNK_SIZE: usize = 64 * 1024;
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1 << exp)
            .min(self.max_backoff)
    }
}

/// Observer for download progress.
pub trait FetchProgress: Send + Sync {
    fn started(&self, label: &str, total: Option<u64>);
    fn advanced(&self, bytes: u64);
    fn finished(&self);
}

/// Discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl FetchProgress for NoProgress {
    fn started(&self, _label: &str, _total: Option<u64>) {}
    fn advanced(&self, _bytes: u64) {}
    fn finished(&self) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub path: PathBuf,
    pub bytes: u64,
    pub blake3: String,
    pub attempts: u32,
}

/// Streams artifacts to disk.
///
/// The destination only ever appears complete: bytes go to a temp file in
/// the same directory which is renamed over `dest` after every check passed.
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    cancel: Option<&'static AtomicBool>,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
            cancel: None,
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Abort in-flight downloads when `flag` becomes true.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: &'static AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn fetch(
        &self,
        url: &str,
        dest: &Path,
        expected_blake3: Option<&str>,
        progress: &dyn FetchProgress,
    ) -> Result<FetchOutcome, FetchError> {
        let label = dest
            .file_name()
            .map_or_else(|| url.to_owned(), |n| n.to_string_lossy().into_owned());
        let max = self.retry.max_attempts.max(1);

        let mut attempt = 0;
        loop {
            attempt += 1;
            self.check_cancelled()?;
            match self.fetch_once(url, dest, &label, expected_blake3, progress) {
                Ok((bytes, blake3)) => {
                    info!("fetched {url} ({bytes} bytes, attempt {attempt})");
                    return Ok(FetchOutcome {
                        path: dest.to_path_buf(),
                        bytes,
                        blake3,
                        attempts: attempt,
                    });
                }
                Err(e) if e.is_retryable() && attempt < max => {
                    let delay = self.retry.backoff(attempt);
                    warn!("fetching {url} failed (attempt {attempt}/{max}): {e}; retrying in {delay:?}");
                    self.sleep(delay)?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn fetch_once(
        &self,
        url: &str,
        dest: &Path,
        label: &str,
        expected_blake3: Option<&str>,
        progress: &dyn FetchProgress,
    ) -> Result<(u64, String), FetchError> {
        let response = self.transport.get(url)?;
        let dir = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        let mut body = response.body;
        let mut hasher = blake3::Hasher::new();
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut received: u64 = 0;

        progress.started(label, response.content_length);
        loop {
            if let Err(e) = self.check_cancelled() {
                progress.finished();
                return Err(e);
            }
            let n = match body.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    progress.finished();
                    return Err(FetchError::Network {
                        url: url.to_owned(),
                        message: format!("stream interrupted after {received} bytes: {e}"),
                    });
                }
            };
            hasher.update(&buf[..n]);
            tmp.write_all(&buf[..n])?;
            received += n as u64;
            progress.advanced(n as u64);
        }
        progress.finished();

        if received == 0 {
            return Err(FetchError::Integrity {
                url: url.to_owned(),
                reason: "empty response body".to_owned(),
            });
        }
        if let Some(expected) = response.content_length {
            if expected != received {
                return Err(FetchError::Integrity {
                    url: url.to_owned(),
                    reason: format!("expected {expected} bytes, received {received}"),
                });
            }
        }
        let digest = hasher.finalize().to_hex().to_string();
        if let Some(expected) = expected_blake3 {
            if !expected.eq_ignore_ascii_case(&digest) {
                return Err(FetchError::Integrity {
                    url: url.to_owned(),
                    reason: format!("blake3 mismatch: expected {expected}, got {digest}"),
                });
            }
        }

        tmp.as_file().sync_all()?;
        tmp.persist(dest).map_err(|e| FetchError::Io(e.error))?;
        freeroot_store::fsync_dir(&dir)?;
        debug!("persisted {} ({received} bytes, blake3 {digest})", dest.display());
        Ok((received, digest))
    }

    fn check_cancelled(&self) -> Result<(), FetchError> {
        match self.cancel {
            Some(flag) if flag.load(Ordering::SeqCst) => Err(FetchError::Cancelled),
            _ => Ok(()),
        }
    }

    fn sleep(&self, delay: Duration) -> Result<(), FetchError> {
        let mut remaining = delay;
        while !remaining.is_zero() {
            self.check_cancelled()?;
            let step = remaining.min(CANCEL_POLL);
            std::thread::sleep(step);
            remaining -= step;
        }
        self.check_cancelled()
    }
}
