//! Fetch, persist, and verify orchestrator.
//!
//! Downloads a release image into a caller-supplied sink, rewinds the sink,
//! downloads the detached signature, and checks the persisted bytes against
//! the embedded keyring. Callers hand over a sink positioned at its start;
//! bytes a reused sink already holds past the artifact are never verified.
//! The stages run strictly in order and nothing is retried; the caller
//! decides whether to start over.
//!
//! On a trust failure the sink keeps the downloaded bytes. Deleting an
//! unverified artifact is the caller's decision.

use std::fmt;
use std::io::{self, Read, SeekFrom, Write};

use log::{debug, warn};
use serde::Serialize;

use super::keyring::{EmbeddedTrustAnchor, KeyringError, TrustAnchor};
use super::sink::ArtifactSink;
use super::transport::{ArtifactStream, DownloadError, HttpTransport, Transport};
use super::url::ArtifactRequest;
use super::verify::{PgpVerifier, SignatureVerifier, SignerIdentity, VerifyError};

/// Size of the buffer used to copy the network stream into the sink.
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// A verified artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchOutcome {
    /// Where the artifact was persisted.
    pub location: String,
    /// Number of bytes persisted.
    pub size: u64,
    /// The trusted key that signed the artifact.
    pub signer: SignerIdentity,
}

/// The collaborators used by the orchestrator.
pub struct FetchDeps<'a> {
    /// Downloads the artifact and its signature.
    pub transport: &'a dyn Transport,
    /// Supplies the trusted keyring.
    pub trust_anchor: &'a dyn TrustAnchor,
    /// Checks the signature.
    pub verifier: &'a dyn SignatureVerifier,
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    /// Downloading the artifact.
    Fetching,
    /// Copying the artifact into the sink.
    Persisting,
    /// Downloading the detached signature.
    FetchingSignature,
    /// Checking the signature against the persisted bytes.
    Verifying,
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetching => "fetching",
            Self::Persisting => "persisting",
            Self::FetchingSignature => "fetching signature",
            Self::Verifying => "verifying",
        };
        f.write_str(name)
    }
}

/// Broad classification of a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Network or HTTP failure; possibly transient.
    Transport,
    /// Local sink failure.
    Write,
    /// The signature did not verify. Never retry blindly.
    Trust,
    /// The embedded trust material is corrupt.
    Parse,
}

/// Errors arising from the fetch-and-verify pipeline.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The artifact could not be downloaded.
    #[error("failed to fetch artifact: {0}")]
    ArtifactDownload(#[source] DownloadError),

    /// The sink rejected a write.
    #[error("failed to write artifact to {location}: {source}")]
    Write {
        /// Where the artifact was being written.
        location: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The sink could not be rewound for verification.
    #[error("cannot rewind {location} for verification: {source}")]
    Rewind {
        /// Where the artifact was written.
        location: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The detached signature could not be downloaded.
    #[error("failed to fetch signature: {0}")]
    SignatureDownload(#[source] DownloadError),

    /// The embedded keyring could not be loaded.
    #[error("trusted keyring unavailable: {0}")]
    TrustAnchor(#[from] KeyringError),

    /// The persisted artifact could not be read back.
    #[error("failed to read {location} for verification: {source}")]
    Verification {
        /// Where the artifact was written.
        location: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The signature does not match any trusted key.
    #[error("signature check failed for {location}: {reason}; the artifact is not verified")]
    SignatureInvalid {
        /// Where the unverified artifact was left.
        location: String,
        /// Why verification failed.
        reason: String,
    },
}

impl FetchError {
    /// Classify the failure.
    #[must_use]
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::ArtifactDownload(_) | Self::SignatureDownload(_) => FetchErrorKind::Transport,
            Self::Write { .. } | Self::Rewind { .. } | Self::Verification { .. } => {
                FetchErrorKind::Write
            }
            Self::TrustAnchor(_) => FetchErrorKind::Parse,
            Self::SignatureInvalid { .. } => FetchErrorKind::Trust,
        }
    }

    /// Whether the artifact was rejected by signature verification.
    #[must_use]
    pub fn is_trust_failure(&self) -> bool {
        self.kind() == FetchErrorKind::Trust
    }
}

/// Fetch and verify an artifact using the production HTTP transport,
/// embedded trust anchor, and PGP verifier.
///
/// # Errors
///
/// Returns a [`FetchError`] describing the first stage that failed.
pub fn fetch_verified<S: ArtifactSink>(
    request: &ArtifactRequest,
    sink: &mut S,
) -> Result<FetchOutcome, FetchError> {
    let transport = HttpTransport::default();
    let deps = FetchDeps {
        transport: &transport,
        trust_anchor: &EmbeddedTrustAnchor,
        verifier: &PgpVerifier,
    };
    fetch_verified_with(request, sink, &deps)
}

/// Testable inner function with injected collaborators.
///
/// The production entry point [`fetch_verified`] delegates here with real
/// implementations; tests inject stubs.
///
/// # Errors
///
/// Returns a [`FetchError`] describing the first stage that failed.
pub fn fetch_verified_with<S: ArtifactSink>(
    request: &ArtifactRequest,
    sink: &mut S,
    deps: &FetchDeps<'_>,
) -> Result<FetchOutcome, FetchError> {
    let location = sink.location();

    // Stage 1: fetch. Nothing touches the sink until the response is open.
    let data_url = request.artifact_url();
    debug!("{}: {data_url}", FetchStage::Fetching);
    let mut data = deps
        .transport
        .download(&data_url)
        .map_err(FetchError::ArtifactDownload)?;

    // Stage 2: persist, then release the connection and rewind.
    debug!("{}: {location}", FetchStage::Persisting);
    let size = persist(&mut data, sink, &data_url, &location)?;
    match data.declared_length() {
        Some(declared) if declared != size => {
            warn!("{data_url}: server declared {declared} byte(s) but sent {size}");
        }
        _ => {}
    }
    drop(data);
    rewind(sink, &location)?;

    // Stage 3: fetch and buffer the detached signature.
    let signature_url = request.signature_url();
    debug!("{}: {signature_url}", FetchStage::FetchingSignature);
    let mut stream = deps
        .transport
        .download(&signature_url)
        .map_err(FetchError::SignatureDownload)?;
    let signature = read_signature(&mut stream, &signature_url)?;
    drop(stream);

    // Stage 4: verify exactly the bytes written in stage 2.
    debug!("{}: {location}", FetchStage::Verifying);
    let keyring = deps.trust_anchor.load_keyring()?;
    let mut persisted = Read::take(&mut *sink, size);
    let signer = deps
        .verifier
        .verify(&keyring, &mut persisted, &mut signature.as_slice())
        .map_err(|e| match e {
            VerifyError::SignatureInvalid { reason } => FetchError::SignatureInvalid {
                location: location.clone(),
                reason,
            },
            VerifyError::Io(source) => FetchError::Verification {
                location: location.clone(),
                source,
            },
        })?;

    debug!("{location}: verified, signed by {}", signer.key_id);
    Ok(FetchOutcome {
        location,
        size,
        signer,
    })
}

/// Copy the whole stream into the sink in order and flush it.
///
/// Read failures belong to the transport; write failures to the sink.
fn persist<S: ArtifactSink>(
    data: &mut ArtifactStream,
    sink: &mut S,
    url: &str,
    location: &str,
) -> Result<u64, FetchError> {
    let write_error = |source| FetchError::Write {
        location: location.to_owned(),
        source,
    };

    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut written: u64 = 0;
    loop {
        let bytes_read = match data.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(FetchError::ArtifactDownload(DownloadError::Interrupted {
                    url: url.to_owned(),
                    source,
                }));
            }
        };
        let chunk = buffer.get(..bytes_read).unwrap_or_default();
        sink.write_all(chunk).map_err(write_error)?;
        written += bytes_read as u64;
    }
    sink.flush().map_err(write_error)?;
    Ok(written)
}

/// Buffer the detached signature; read failures belong to the transport.
fn read_signature(stream: &mut ArtifactStream, url: &str) -> Result<Vec<u8>, FetchError> {
    let mut signature = Vec::new();
    stream.read_to_end(&mut signature).map_err(|source| {
        FetchError::SignatureDownload(DownloadError::Interrupted {
            url: url.to_owned(),
            source,
        })
    })?;
    Ok(signature)
}

/// Seek the sink back to its first byte.
fn rewind<S: ArtifactSink>(sink: &mut S, location: &str) -> Result<(), FetchError> {
    let position = sink
        .seek(SeekFrom::Start(0))
        .map_err(|source| FetchError::Rewind {
            location: location.to_owned(),
            source,
        })?;
    if position != 0 {
        return Err(FetchError::Rewind {
            location: location.to_owned(),
            source: io::Error::other(format!("sink reported position {position} after rewind")),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "fetch_tests.rs"]
mod tests;
