//! Artifact retrieval for freeroot.
//!
//! This crate fetches the engine binary and the rootfs tarball. A `Transport`
//! opens a byte stream for a URL (`HttpTransport` over ureq, `FileTransport`
//! for `file://` mirrors, `SchemeTransport` dispatching between them), and the
//! `Fetcher` streams it to disk atomically with blake3 verification, bounded
//! retries, and cooperative cancellation.

pub mod fetch;
pub mod http;
pub mod mock;
pub mod transport;

pub use fetch::{FetchOutcome, FetchProgress, Fetcher, NoProgress, RetryPolicy};
pub use http::HttpTransport;
pub use mock::{MockResponse, MockTransport};
pub use transport::{FileTransport, SchemeTransport};

use std::io::Read;
use thiserror::Error;

/// User-Agent sent with every HTTP request.
pub const USER_AGENT: &str = concat!("freeroot/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("download I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },
    #[error("HTTP {code} for {url}")]
    Status { url: String, code: u16 },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("integrity failure for {url}: {reason}")]
    Integrity { url: String, reason: String },
    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("download cancelled")]
    Cancelled,
}

impl FetchError {
    /// Transient failures worth another attempt. Integrity failures and
    /// client errors are final: the same request would fail the same way.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network { .. } => true,
            FetchError::Status { code, .. } => *code >= 500 || *code == 429,
            _ => false,
        }
    }
}

/// An open response body.
pub struct TransportResponse {
    /// Length advertised by the source, if any.
    pub content_length: Option<u64>,
    pub body: Box<dyn Read>,
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Opens a byte stream for a URL.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str) -> Result<TransportResponse, FetchError>;
}
