//! Secret storage for bootstrap credentials.
//!
//! Secrets are plain key/value pairs held by a remote backend. The
//! [`SecretProvider`] trait is the seam the CLI depends on; the only
//! production backend is the AWS SSM Parameter Store.
//!
//! # Sub-modules
//!
//! - [`aws`] - Credential and region resolution from flags and environment.
//! - [`password`] - Random password generation.
//! - [`profile`] - AWS shared credentials and config files.
//! - [`sigv4`] - AWS Signature Version 4 request signing.
//! - [`ssm`] - `SecretProvider` over a parameter store, and the SSM client.

pub mod aws;
pub mod password;
pub mod profile;
pub mod sigv4;
pub mod ssm;

/// A backend capable of storing sensitive values by key.
#[cfg_attr(test, mockall::automock)]
pub trait SecretProvider {
    /// Delete the secret stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::NotFound`] if no such secret exists.
    fn delete(&self, key: &str) -> Result<(), SecretError>;

    /// Generate a random value, store it under `key`, and return it.
    ///
    /// Any previous value is overwritten. The value has `length` characters,
    /// of which `digits` are digits and `symbols` are symbols.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::Generate`] if the counts cannot be satisfied.
    fn generate(
        &self,
        key: &str,
        length: usize,
        digits: usize,
        symbols: usize,
    ) -> Result<String, SecretError>;

    /// Return the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::NotFound`] if no such secret exists.
    fn get(&self, key: &str) -> Result<String, SecretError>;

    /// Store `value` under `key`, overwriting any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    fn set(&self, key: &str, value: &str) -> Result<(), SecretError>;
}

/// Errors arising from secret operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecretError {
    /// No secret exists under the key.
    #[error("secret not found: {key}")]
    NotFound {
        /// The key that was looked up.
        key: String,
    },

    /// The backend was reached but refused or failed the request.
    #[error("secret backend error: {reason}")]
    Backend {
        /// Description of the backend failure.
        reason: String,
    },

    /// The backend could not be reached.
    #[error("secret backend unavailable: {reason}")]
    Unavailable {
        /// Description of the connectivity failure.
        reason: String,
    },

    /// A random value could not be generated.
    #[error("failed generating random password: {reason}")]
    Generate {
        /// Why generation failed.
        reason: String,
    },
}

impl SecretError {
    /// Whether the key does not exist, as opposed to a backend failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
