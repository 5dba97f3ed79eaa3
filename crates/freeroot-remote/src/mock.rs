//! In-memory transport for tests.
//!
//! Routes map a URL to a queue of canned responses. Each request pops the
//! front of the queue; the last response repeats once the queue is down to
//! one entry. Every request is recorded so callers can assert how often
//! the network was touched.

use crate::{FetchError, Transport, TransportResponse};
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Serve the bytes with an accurate length.
    Body(Vec<u8>),
    /// Serve the bytes but advertise a different length.
    BodyWithLength(Vec<u8>, u64),
    /// Serve the first `n` bytes, then fail with a connection reset.
    Truncated(Vec<u8>, usize),
    /// Fail before any byte with this HTTP status.
    Status(u16),
    /// Fail to connect.
    Unreachable,
}

#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, VecDeque<MockResponse>>>,
    requests: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for every request to `url`.
    pub fn serve(&self, url: &str, body: impl Into<Vec<u8>>) {
        self.serve_sequence(url, vec![MockResponse::Body(body.into())]);
    }

    pub fn serve_sequence(&self, url: &str, responses: Vec<MockResponse>) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.insert(url.to_owned(), responses.into());
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map_or(0, |r| r.len())
    }

    pub fn requests_for(&self, url: &str) -> usize {
        self.requests
            .lock()
            .map_or(0, |r| r.iter().filter(|u| u.as_str() == url).count())
    }

    fn next_response(&self, url: &str) -> Option<MockResponse> {
        let mut routes = self.routes.lock().ok()?;
        let queue = routes.get_mut(url)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl Transport for MockTransport {
    fn get(&self, url: &str) -> Result<TransportResponse, FetchError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_owned());
        }

        match self.next_response(url) {
            None => Err(FetchError::NotFound(url.to_owned())),
            Some(MockResponse::Body(data)) => Ok(TransportResponse {
                content_length: Some(data.len() as u64),
                body: Box::new(io::Cursor::new(data)),
            }),
            Some(MockResponse::BodyWithLength(data, len)) => Ok(TransportResponse {
                content_length: Some(len),
                body: Box::new(io::Cursor::new(data)),
            }),
            Some(MockResponse::Truncated(data, cut)) => Ok(TransportResponse {
                content_length: Some(data.len() as u64),
                body: Box::new(TruncatedReader {
                    data,
                    pos: 0,
                    cut,
                }),
            }),
            Some(MockResponse::Status(404)) => Err(FetchError::NotFound(url.to_owned())),
            Some(MockResponse::Status(code)) => Err(FetchError::Status {
                url: url.to_owned(),
                code,
            }),
            Some(MockResponse::Unreachable) => Err(FetchError::Network {
                url: url.to_owned(),
                message: "connection refused".to_owned(),
            }),
        }
    }
}

struct TruncatedReader {
    data: Vec<u8>,
    pos: usize,
    cut: usize,
}

impl Read for TruncatedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let end = self.cut.min(self.data.len());
        if self.pos >= end {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ));
        }
        let n = buf.len().min(end - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
