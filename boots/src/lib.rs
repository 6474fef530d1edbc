//! Boots library.
//!
//! This crate provides the fetch-then-verify pipeline for release disk images
//! and the secret-store plumbing used by the `boots` CLI. It can be consumed
//! programmatically for testing or custom bootstrap workflows.
//!
//! # Modules
//!
//! - [`cli`] - Command-line argument definitions
//! - [`commands`] - Command handlers with injected providers
//! - [`envelope`] - JSON result envelope rendering
//! - [`error`] - Top-level error type for the CLI
//! - [`image`] - Artifact URLs, transport, keyring, verification, orchestration
//! - [`secret`] - Secret provider capability and the AWS SSM backend

pub mod cli;
pub mod commands;
pub mod envelope;
pub mod error;
pub mod image;
pub mod secret;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
