//! Destinations for downloaded artifacts.
//!
//! The orchestrator writes the artifact into a sink, rewinds it, and reads it
//! back for verification, so every sink must be readable, writable, and
//! seekable.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::NamedTempFile;

/// A rewindable destination for a downloaded artifact.
pub trait ArtifactSink: Read + Write + Seek {
    /// A human-readable description of where the artifact lives.
    fn location(&self) -> String;
}

/// A sink that stages the artifact in a temporary file beside its
/// destination.
///
/// The destination is replaced only by [`FileSink::commit`]. Dropping the
/// sink without committing removes the staged file and leaves whatever was
/// already at the destination untouched.
#[derive(Debug)]
pub struct FileSink {
    path: Utf8PathBuf,
    staged: NamedTempFile,
}

impl FileSink {
    /// Open a staging file in the directory that will hold `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the staging file cannot be created.
    pub fn create(path: &Utf8Path) -> io::Result<Self> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };
        let staged = tempfile::Builder::new()
            .prefix(".boots-")
            .suffix(".partial")
            .tempfile_in(dir.as_std_path())?;
        Ok(Self {
            path: path.to_owned(),
            staged,
        })
    }

    /// The destination path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Move the staged file over the destination.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename fails; the staged file is removed.
    pub fn commit(self) -> io::Result<()> {
        self.staged
            .persist(self.path.as_std_path())
            .map(drop)
            .map_err(|err| err.error)
    }
}

impl Read for FileSink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.staged.read(buf)
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.staged.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.staged.flush()
    }
}

impl Seek for FileSink {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.staged.seek(pos)
    }
}

impl ArtifactSink for FileSink {
    fn location(&self) -> String {
        self.path.to_string()
    }
}

impl ArtifactSink for Cursor<Vec<u8>> {
    fn location(&self) -> String {
        "memory".to_owned()
    }
}
