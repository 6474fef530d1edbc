//! HTTP transport for release images and signatures.
//!
//! Provides a trait-based abstraction over a single HTTP GET so that the
//! orchestrator can be exercised without network access. Every non-2xx
//! response is surfaced as a [`DownloadError`]; response bodies of failed
//! requests are never handed to the caller.

use std::fmt;
use std::io::{self, Read};
use std::time::Duration;

use log::debug;

/// Default limit for establishing a connection to the release host.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for downloading a single resource.
///
/// Abstractions allow tests to mock HTTP behaviour without network access.
///
/// # Examples
///
/// ```
/// use boots::image::transport::HttpTransport;
///
/// let transport = HttpTransport::default();
/// // Use transport.download("https://...") in production
/// # let _ = transport;
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Issue a GET request for `url` and return the open response body.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be made or the server answers
    /// with a non-success status.
    fn download(&self, url: &str) -> Result<ArtifactStream, DownloadError>;
}

/// Errors arising from download operations.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// The request failed before a response arrived (DNS, connect, TLS, timeout).
    #[error("download failed for {url}: {reason}")]
    Request {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested resource was not found (HTTP 404).
    #[error("artifact not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// The server answered with a non-success status other than 404.
    #[error("download failed for {url}: HTTP status {status}")]
    HttpStatus {
        /// The URL that was requested.
        url: String,
        /// The HTTP status code returned.
        status: u16,
    },

    /// The response body could not be read to completion.
    #[error("download of {url} was interrupted: {source}")]
    Interrupted {
        /// The URL whose body failed.
        url: String,
        /// The underlying read error.
        #[source]
        source: io::Error,
    },
}

/// An open response body with the server-declared length.
///
/// The stream is consumed at most once and released when dropped. The
/// declared length is advisory: servers may omit it or report it wrongly.
pub struct ArtifactStream {
    body: Box<dyn Read>,
    declared_length: Option<u64>,
}

impl ArtifactStream {
    /// Wrap a reader and its advertised length.
    #[must_use]
    pub fn new(body: Box<dyn Read>, declared_length: Option<u64>) -> Self {
        Self {
            body,
            declared_length,
        }
    }

    /// Build a stream over in-memory bytes, declaring their exact length.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let length = u64::try_from(bytes.len()).ok();
        Self::new(Box::new(io::Cursor::new(bytes)), length)
    }

    /// The `Content-Length` reported by the server, if any.
    #[must_use]
    pub fn declared_length(&self) -> Option<u64> {
        self.declared_length
    }
}

impl Read for ArtifactStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.body.read(buf)
    }
}

impl fmt::Debug for ArtifactStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactStream")
            .field("declared_length", &self.declared_length)
            .finish_non_exhaustive()
    }
}

/// Timeout hook for the production transport.
///
/// Image downloads can legitimately take minutes, so there is no overall
/// deadline unless the caller sets one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Limit for establishing a connection.
    pub connect_timeout: Option<Duration>,
    /// Limit for the entire request, including the body.
    pub overall_timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Some(CONNECT_TIMEOUT),
            overall_timeout: None,
        }
    }
}

/// HTTP-based transport using `ureq`.
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    /// Create a transport with the given timeouts.
    #[must_use]
    pub fn new(config: TransportConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_connect(config.connect_timeout)
            .timeout_global(config.overall_timeout)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(agent_config),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

impl Transport for HttpTransport {
    fn download(&self, url: &str) -> Result<ArtifactStream, DownloadError> {
        debug!("GET {url}");
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let declared_length = parse_content_length(
            response
                .headers()
                .get(ureq::http::header::CONTENT_LENGTH)
                .and_then(|value| value.to_str().ok()),
        );
        debug!("{url}: declared length {declared_length:?}");
        let body = response.into_body().into_reader();
        Ok(ArtifactStream::new(Box::new(body), declared_length))
    }
}

/// Parse a `Content-Length` header value; anything unparsable is unknown.
fn parse_content_length(value: Option<&str>) -> Option<u64> {
    value.and_then(|raw| raw.trim().parse().ok())
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        ureq::Error::StatusCode(status) => DownloadError::HttpStatus {
            url: url.to_owned(),
            status: *status,
        },
        other => DownloadError::Request {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
