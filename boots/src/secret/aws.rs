//! AWS credential and region resolution.
//!
//! Explicit flags win over the standard `AWS_*` environment variables, which
//! win over the shared profile named by `AWS_PROFILE` (or `default`).
//! Environment lookups and the home directory are injected so tests never
//! depend on the process environment or the user's `~/.aws`.

use std::fmt;
use std::path::Path;

use super::profile::{DEFAULT_PROFILE, ProfileFiles, SharedProfile};

/// Errors raised while resolving AWS settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AwsConfigError {
    /// Only one half of a static key pair was given on the command line.
    #[error("must supply both access and secret keys")]
    PartialKeyPair,

    /// No credentials were found in flags, environment or shared profile.
    #[error(
        "no AWS credentials found; set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY or configure a shared profile"
    )]
    MissingCredentials,

    /// No region was found in flags, environment or shared profile.
    #[error("no AWS region found; pass --aws-region or set AWS_REGION or a profile region")]
    MissingRegion,

    /// `AWS_PROFILE` names a profile neither shared file defines.
    #[error("AWS profile {0} not found in the shared config or credentials file")]
    UnknownProfile(String),

    /// A shared config or credentials file exists but could not be read.
    #[error("failed to read {path}: {reason}")]
    ProfileFile {
        /// The file that could not be read.
        path: String,
        /// Why reading failed.
        reason: String,
    },
}

/// AWS settings supplied on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwsFlags {
    /// Access key id.
    pub access_key: Option<String>,
    /// Secret access key.
    pub secret_key: Option<String>,
    /// Region, e.g. `us-west-2`.
    pub region: Option<String>,
    /// KMS key used to encrypt stored parameters.
    pub kms_key: Option<String>,
}

/// Static credentials for request signing.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Session token for temporary credentials.
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Fully resolved settings for the SSM backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsConfig {
    /// Credentials used to sign requests.
    pub credentials: Credentials,
    /// Region hosting the parameter store.
    pub region: String,
    /// KMS key for SecureString parameters; the account default when `None`.
    pub kms_key: Option<String>,
}

impl AwsConfig {
    /// Resolve settings from flags, the process environment and the shared
    /// files under the user's home directory.
    ///
    /// # Errors
    ///
    /// Returns an error when credentials or region cannot be determined.
    pub fn resolve(flags: &AwsFlags) -> Result<Self, AwsConfigError> {
        let home = directories_next::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
        Self::resolve_with(flags, |name| std::env::var(name).ok(), home.as_deref())
    }

    /// Resolve settings using the supplied environment lookup and home
    /// directory.
    ///
    /// The shared files are only read when flags and environment leave
    /// credentials or region unset.
    ///
    /// # Errors
    ///
    /// Returns an error when credentials or region cannot be determined.
    pub fn resolve_with<F>(
        flags: &AwsFlags,
        env: F,
        home: Option<&Path>,
    ) -> Result<Self, AwsConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| env(name).filter(|value| !value.trim().is_empty());

        let credentials = match (&flags.access_key, &flags.secret_key) {
            (Some(access), Some(secret)) => Some(Credentials {
                access_key_id: access.clone(),
                secret_access_key: secret.clone(),
                session_token: None,
            }),
            (None, None) => environment_credentials(&lookup),
            _ => return Err(AwsConfigError::PartialKeyPair),
        };
        let region = flags
            .region
            .clone()
            .or_else(|| lookup("AWS_REGION"))
            .or_else(|| lookup("AWS_DEFAULT_REGION"));

        let shared = if credentials.is_none() || region.is_none() {
            shared_profile(&lookup, home)?
        } else {
            None
        };

        let credentials = credentials
            .or_else(|| shared.as_ref().and_then(SharedProfile::credentials))
            .ok_or(AwsConfigError::MissingCredentials)?;
        let region = region
            .or_else(|| shared.and_then(|profile| profile.region))
            .ok_or(AwsConfigError::MissingRegion)?;

        Ok(Self {
            credentials,
            region,
            kms_key: flags.kms_key.clone(),
        })
    }
}

fn environment_credentials(lookup: impl Fn(&str) -> Option<String>) -> Option<Credentials> {
    Some(Credentials {
        access_key_id: lookup("AWS_ACCESS_KEY_ID")?,
        secret_access_key: lookup("AWS_SECRET_ACCESS_KEY")?,
        session_token: lookup("AWS_SESSION_TOKEN"),
    })
}

/// Load the profile named by `AWS_PROFILE`, or `default`.
///
/// A missing `default` profile is not an error; a missing named one is.
fn shared_profile(
    lookup: impl Fn(&str) -> Option<String>,
    home: Option<&Path>,
) -> Result<Option<SharedProfile>, AwsConfigError> {
    let named = lookup("AWS_PROFILE");
    let profile = named.clone().unwrap_or_else(|| DEFAULT_PROFILE.to_owned());
    let files = ProfileFiles::locate(&lookup, home);
    match files.load(&profile)? {
        None if named.is_some() => Err(AwsConfigError::UnknownProfile(profile)),
        loaded => Ok(loaded),
    }
}
