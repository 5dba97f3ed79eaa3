use crate::{FetchError, Transport, TransportResponse, USER_AGENT};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);
const BODY_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Blocking HTTP(S) transport.
///
/// Connect, response headers and the whole body read each have a deadline.
/// The body deadline is generous since a rootfs tarball on a slow link can
/// legitimately take minutes; a body that stalls past it fails the read
/// with a network error, which the fetcher retries.
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::with_timeouts(CONNECT_TIMEOUT, RESPONSE_TIMEOUT, BODY_TIMEOUT)
    }

    pub fn with_timeouts(connect: Duration, response: Duration, body: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(connect))
            .timeout_recv_response(Some(response))
            .timeout_recv_body(Some(body))
            .build();
        Self {
            agent: config.into(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<TransportResponse, FetchError> {
        tracing::debug!("GET {url}");
        let resp = match self.agent.get(url).header("User-Agent", USER_AGENT).call() {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(404)) => {
                return Err(FetchError::NotFound(url.to_owned()));
            }
            Err(ureq::Error::StatusCode(code)) => {
                return Err(FetchError::Status {
                    url: url.to_owned(),
                    code,
                });
            }
            Err(e) => {
                return Err(FetchError::Network {
                    url: url.to_owned(),
                    message: e.to_string(),
                });
            }
        };

        let code = resp.status().as_u16();
        if code >= 400 {
            return Err(FetchError::Status {
                url: url.to_owned(),
                code,
            });
        }

        // A transfer encoding changes the byte count we receive, so the
        // advertised length is only comparable for identity responses.
        let encoded = resp.headers().contains_key("content-encoding");
        let content_length = if encoded {
            None
        } else {
            resp.headers()
                .get("content-length")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
        };

        Ok(TransportResponse {
            content_length,
            body: Box::new(resp.into_body().into_reader()),
        })
    }
}
