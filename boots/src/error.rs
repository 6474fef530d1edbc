//! Top-level error type for the boots CLI.
//!
//! Each command's failure is wrapped here so that `main` can render one
//! envelope and choose one exit code.

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::image::fetch::FetchError;
use crate::secret::SecretError;
use crate::secret::aws::AwsConfigError;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum BootsError {
    /// Fetching or verifying an image failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A secret operation failed.
    #[error(transparent)]
    Secret(#[from] SecretError),

    /// AWS settings could not be resolved.
    #[error(transparent)]
    AwsConfig(#[from] AwsConfigError),

    /// The image was downloaded but failed verification; the file is kept.
    #[error("{source}")]
    Unverified {
        /// Where the unverified file was left.
        path: Utf8PathBuf,
        /// The verification failure.
        source: FetchError,
    },

    /// The output file could not be created.
    #[error("failed to create {path}: {source}")]
    CreateOutput {
        /// Path that could not be created.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The result envelope could not be written to stdout.
    #[error("failed to write output: {source}")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },
}

impl BootsError {
    /// Whether the failure means a secret does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Secret(err) if err.is_not_found())
    }

    /// Envelope data describing an unverified download, if this is one.
    #[must_use]
    pub fn unverified_data(&self) -> Option<serde_json::Value> {
        match self {
            Self::Unverified { path, .. } => Some(serde_json::json!({
                "path": path,
                "verified": false,
            })),
            _ => None,
        }
    }
}

/// Convenience alias for results in the CLI layer.
pub type Result<T> = std::result::Result<T, BootsError>;
