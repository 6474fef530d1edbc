//! JSON result envelope printed by every command.
//!
//! Each invocation writes a single line of the form
//! `{"data":…,"error":"…","success":bool}` to stdout unless quiet mode is on.

use std::fmt;
use std::io::{self, Write};

use crate::error::{BootsError, Result};

use serde::Serialize;
use serde_json::Value;

/// The outcome of one command, as printed to stdout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppResult {
    /// Command-specific payload; `null` on failure.
    pub data: Value,
    /// Error message; empty on success.
    pub error: String,
    /// Whether the command succeeded.
    pub success: bool,
}

impl AppResult {
    /// A successful result carrying `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` cannot be represented as JSON.
    pub fn ok(data: &impl Serialize) -> std::result::Result<Self, serde_json::Error> {
        Ok(Self {
            data: serde_json::to_value(data)?,
            error: String::new(),
            success: true,
        })
    }

    /// A failed result describing `err`.
    #[must_use]
    pub fn failure(err: &dyn fmt::Display) -> Self {
        Self {
            data: Value::Null,
            error: err.to_string(),
            success: false,
        }
    }

    /// A failed result that still carries data, e.g. an unverified download.
    #[must_use]
    pub fn failure_with(data: Value, err: &dyn fmt::Display) -> Self {
        Self {
            data,
            error: err.to_string(),
            success: false,
        }
    }

    /// Write the envelope as one JSON line, or nothing when `quiet`.
    ///
    /// # Errors
    ///
    /// Returns [`BootsError::WriteFailed`] if encoding or writing fails.
    pub fn emit(&self, quiet: bool, out: &mut dyn Write) -> Result<()> {
        if quiet {
            return Ok(());
        }
        self.write_line(out)
            .map_err(|source| BootsError::WriteFailed { source })
    }

    fn write_line(&self, out: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *out, self)?;
        writeln!(out)
    }
}
