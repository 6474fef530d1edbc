//! Command handlers.
//!
//! Handlers take their collaborators as arguments; `main` wires in the
//! production implementations and tests pass stubs.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use log::info;
use serde::Serialize;

use crate::cli::{FetchArgs, SecretCommand};
use crate::envelope::AppResult;
use crate::error::{BootsError, Result};
use crate::image::fetch::{FetchDeps, FetchError, fetch_verified_with};
use crate::image::sink::FileSink;
use crate::image::url::{ArtifactRequest, DEFAULT_ARTIFACT_NAME, default_output_filename};
use crate::image::verify::SignerIdentity;
use crate::secret::SecretProvider;

/// Result of `image fetch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchReport {
    /// Where the image was written.
    pub path: Utf8PathBuf,
    /// Bytes written.
    pub size: u64,
    /// Whether the signature checked out.
    pub verified: bool,
    /// The key that signed the image.
    pub signer: SignerIdentity,
}

/// Result of a `secret` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SecretOutput {
    /// The key operated on.
    Key {
        /// Secret key.
        key: String,
    },
    /// The key and its value.
    KeyValue {
        /// Secret key.
        key: String,
        /// Secret value.
        value: String,
    },
}

/// Choose where `image fetch` writes the artifact.
///
/// An explicit `--output` wins. Otherwise the production image is named after
/// its channel and architecture, and any other artifact keeps its own name.
#[must_use]
pub fn output_path(args: &FetchArgs) -> Utf8PathBuf {
    match &args.output {
        Some(path) => path.clone(),
        None if args.name == DEFAULT_ARTIFACT_NAME => {
            Utf8PathBuf::from(default_output_filename(&args.channel, &args.arch))
        }
        None => Utf8PathBuf::from(&args.name),
    }
}

/// Download and verify an image into a file.
///
/// The download is staged beside the output path. It replaces the output
/// once verification has run; a transport or write failure leaves any
/// existing file in place. A file that fails verification is still moved into
/// place and reported through [`BootsError::Unverified`].
///
/// # Errors
///
/// Returns an error if the file cannot be created or any fetch stage fails.
pub fn run_fetch(
    args: &FetchArgs,
    deps: &FetchDeps<'_>,
    quiet: bool,
    stderr: &mut dyn Write,
) -> Result<FetchReport> {
    let request = ArtifactRequest::new(&args.channel, &args.arch, &args.name);
    let path = output_path(args);
    let mut sink = FileSink::create(&path).map_err(|source| BootsError::CreateOutput {
        path: path.clone(),
        source,
    })?;

    if !quiet {
        write_stderr_line(stderr, format!("Fetching {request} to {path}..."));
    }
    let result = fetch_verified_with(&request, &mut sink, deps);
    let keep = match &result {
        Ok(_) => true,
        Err(err) => err.is_trust_failure(),
    };
    if keep {
        sink.commit().map_err(|source| BootsError::CreateOutput {
            path: path.clone(),
            source,
        })?;
    }
    let outcome = result.map_err(|err| fetch_failure(&path, err))?;
    info!("verified {path} signed by {}", outcome.signer.key_id);
    if !quiet {
        write_stderr_line(
            stderr,
            format!(
                "Verified {path} ({} bytes) signed by {}",
                outcome.size, outcome.signer.key_id
            ),
        );
    }

    Ok(FetchReport {
        path,
        size: outcome.size,
        verified: true,
        signer: outcome.signer,
    })
}

fn fetch_failure(path: &Utf8Path, err: FetchError) -> BootsError {
    if err.is_trust_failure() {
        BootsError::Unverified {
            path: path.to_owned(),
            source: err,
        }
    } else {
        BootsError::Fetch(err)
    }
}

/// Run a secret operation against `provider`.
///
/// # Errors
///
/// Returns the provider's error.
pub fn run_secret(command: &SecretCommand, provider: &dyn SecretProvider) -> Result<SecretOutput> {
    let output = match command {
        SecretCommand::Delete { key } => {
            provider.delete(key)?;
            SecretOutput::Key { key: key.clone() }
        }
        SecretCommand::Generate {
            key,
            length,
            digits,
            symbols,
        } => SecretOutput::KeyValue {
            key: key.clone(),
            value: provider.generate(key, *length, *digits, *symbols)?,
        },
        SecretCommand::Get { key } => SecretOutput::KeyValue {
            key: key.clone(),
            value: provider.get(key)?,
        },
        SecretCommand::Set { key, value } => {
            provider.set(key, value)?;
            SecretOutput::KeyValue {
                key: key.clone(),
                value: value.clone(),
            }
        }
    };
    Ok(output)
}

/// Turn a command result into the envelope printed on stdout.
#[must_use]
pub fn envelope_for<T: Serialize>(result: &Result<T>) -> AppResult {
    match result {
        Ok(data) => AppResult::ok(data).unwrap_or_else(|err| AppResult::failure(&err)),
        Err(err) => match err.unverified_data() {
            Some(data) => AppResult::failure_with(data, err),
            None => AppResult::failure(err),
        },
    }
}

/// Write one line to `stderr`, ignoring failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
