//! Release image retrieval and authenticity checks.
//!
//! # Sub-modules
//!
//! - [`url`] - Canonical artifact and signature URLs (`ArtifactRequest`).
//! - [`transport`] - HTTP download capability and the `ureq` implementation.
//! - [`keyring`] - Embedded trust anchor and keyring parsing.
//! - [`verify`] - Detached PGP signature verification.
//! - [`sink`] - Rewindable destinations for downloaded artifacts.
//! - [`fetch`] - The fetch, persist, and verify orchestrator.

pub mod fetch;
pub mod keyring;
pub mod sink;
pub mod transport;
pub mod url;
pub mod verify;
