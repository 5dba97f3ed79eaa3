use crate::http::HttpTransport;
use crate::{FetchError, Transport, TransportResponse};
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Reads `file://` URLs from the local filesystem (offline mirrors, tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct FileTransport;

impl Transport for FileTransport {
    fn get(&self, url: &str) -> Result<TransportResponse, FetchError> {
        let path = url
            .strip_prefix("file://")
            .ok_or_else(|| FetchError::UnsupportedScheme(url.to_owned()))?;
        debug!("open {path}");
        let file = match File::open(Path::new(path)) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FetchError::NotFound(url.to_owned()));
            }
            Err(e) => return Err(e.into()),
        };
        let content_length = Some(file.metadata()?.len());
        Ok(TransportResponse {
            content_length,
            body: Box::new(file),
        })
    }
}

/// Default transport: picks HTTP or file access from the URL scheme.
pub struct SchemeTransport {
    http: HttpTransport,
    file: FileTransport,
}

impl SchemeTransport {
    pub fn new() -> Self {
        Self {
            http: HttpTransport::new(),
            file: FileTransport,
        }
    }
}

impl Default for SchemeTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SchemeTransport {
    fn get(&self, url: &str) -> Result<TransportResponse, FetchError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            self.http.get(url)
        } else if url.starts_with("file://") {
            self.file.get(url)
        } else {
            Err(FetchError::UnsupportedScheme(url.to_owned()))
        }
    }
}
