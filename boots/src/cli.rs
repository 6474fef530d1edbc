//! CLI argument definitions for boots.
//!
//! Kept apart from the entrypoint so parsing can be tested without running
//! any command.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::image::url::DEFAULT_ARTIFACT_NAME;
use crate::secret::aws::AwsFlags;

/// Fetch verified Flatcar images and manage bootstrap secrets.
#[derive(Parser, Debug)]
#[command(name = "boots")]
#[command(version, about)]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Download and verify the stable amd64 production image:\n",
    "    $ boots image fetch stable amd64\n\n",
    "  Generate a 24 character password and store it in SSM:\n",
    "    $ boots secret --aws-region us-west-2 generate db/password -l 24\n",
))]
pub struct Cli {
    /// Suppress the JSON result and progress output.
    #[arg(short, long, global = true, conflicts_with = "verbosity")]
    pub quiet: bool,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        global = true,
        action = clap::ArgAction::Count
    )]
    pub verbosity: u8,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Work with Flatcar release images.
    #[command(subcommand)]
    Image(ImageCommand),

    /// Manage secrets in a remote store.
    Secret(SecretArgs),
}

/// Image subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ImageCommand {
    /// Download an image and verify its detached signature.
    Fetch(FetchArgs),
}

/// Arguments for `image fetch`.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct FetchArgs {
    /// Release channel, e.g. `stable`, `beta`, or `alpha`.
    pub channel: String,

    /// Architecture, e.g. `amd64` or `arm64`.
    pub arch: String,

    /// Artifact to download from the release directory.
    #[arg(long, value_name = "NAME", default_value = DEFAULT_ARTIFACT_NAME)]
    pub name: String,

    /// Destination file [default: flatcar_<CHANNEL>_<ARCH>.bin.bz2].
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<Utf8PathBuf>,
}

/// Supported secret backends.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backend {
    /// AWS SSM Parameter Store.
    #[default]
    Aws,
}

/// Arguments shared by every `secret` subcommand.
#[derive(Args, Debug, Clone)]
pub struct SecretArgs {
    /// Secret backend.
    #[arg(long, value_enum, default_value_t = Backend::Aws)]
    pub backend: Backend,

    /// AWS access key id.
    #[arg(long, value_name = "KEY", requires = "aws_secret_key")]
    pub aws_access_key: Option<String>,

    /// AWS secret access key.
    #[arg(long, value_name = "KEY", requires = "aws_access_key")]
    pub aws_secret_key: Option<String>,

    /// AWS region.
    #[arg(long, value_name = "REGION")]
    pub aws_region: Option<String>,

    /// KMS key used to encrypt stored values.
    #[arg(long, value_name = "KEY")]
    pub aws_kms_key: Option<String>,

    /// Secret operation.
    #[command(subcommand)]
    pub command: SecretCommand,
}

impl SecretArgs {
    /// The AWS flags as given on the command line.
    #[must_use]
    pub fn aws_flags(&self) -> AwsFlags {
        AwsFlags {
            access_key: self.aws_access_key.clone(),
            secret_key: self.aws_secret_key.clone(),
            region: self.aws_region.clone(),
            kms_key: self.aws_kms_key.clone(),
        }
    }
}

/// Secret subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SecretCommand {
    /// Delete a secret.
    Delete {
        /// Secret key.
        key: String,
    },

    /// Generate, store, and print a random secret.
    Generate {
        /// Secret key.
        key: String,

        /// Total length.
        #[arg(short, long, default_value_t = 16)]
        length: usize,

        /// How many digits to include.
        #[arg(short = 'n', long = "numbers", default_value_t = 1)]
        digits: usize,

        /// How many symbols to include.
        #[arg(short, long, default_value_t = 1)]
        symbols: usize,
    },

    /// Print a secret.
    Get {
        /// Secret key.
        key: String,
    },

    /// Store a secret.
    Set {
        /// Secret key.
        key: String,

        /// Secret value.
        value: String,
    },
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
