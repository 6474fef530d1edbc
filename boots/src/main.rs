//! boots CLI entrypoint.
//!
//! Parses arguments, installs logging, wires the production collaborators
//! into the command handlers, and prints the JSON result envelope.

use std::io::{self, Write};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use boots::cli::{Backend, Cli, Command, ImageCommand, SecretArgs};
use boots::commands::{envelope_for, run_fetch, run_secret, write_stderr_line};
use boots::envelope::AppResult;
use boots::error::Result;
use boots::image::fetch::FetchDeps;
use boots::image::keyring::EmbeddedTrustAnchor;
use boots::image::transport::HttpTransport;
use boots::image::verify::PgpVerifier;
use boots::secret::aws::AwsConfig;
use boots::secret::password::RandomPasswordGenerator;
use boots::secret::ssm::{SsmClient, SsmSecretProvider};

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbosity);

    let mut stderr = io::stderr();
    let envelope = run(&cli, &mut stderr);
    let exit_code = exit_code_for_envelope(&envelope, cli.quiet, &mut io::stdout(), &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stderr: &mut dyn Write) -> AppResult {
    match &cli.command {
        Command::Image(ImageCommand::Fetch(args)) => {
            let transport = HttpTransport::default();
            let deps = FetchDeps {
                transport: &transport,
                trust_anchor: &EmbeddedTrustAnchor,
                verifier: &PgpVerifier,
            };
            envelope_for(&run_fetch(args, &deps, cli.quiet, stderr))
        }
        Command::Secret(args) => envelope_for(&run_secret_with_backend(args)),
    }
}

fn run_secret_with_backend(args: &SecretArgs) -> Result<boots::commands::SecretOutput> {
    match args.backend {
        Backend::Aws => {
            let config = AwsConfig::resolve(&args.aws_flags())?;
            let client = SsmClient::new(config);
            let generator = RandomPasswordGenerator;
            let provider = SsmSecretProvider::new(&client, &generator);
            run_secret(&args.command, &provider)
        }
    }
}

/// Log level used when `RUST_LOG` is unset.
fn default_log_level(quiet: bool, verbosity: u8) -> &'static str {
    if quiet {
        return "error";
    }
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn init_logging(quiet: bool, verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(quiet, verbosity)));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .is_err()
    {
        // A subscriber is already installed.
    }
}

fn exit_code_for_envelope(
    envelope: &AppResult,
    quiet: bool,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> i32 {
    if let Err(err) = envelope.emit(quiet, stdout) {
        write_stderr_line(stderr, err.to_string());
        return 1;
    }
    if envelope.success {
        0
    } else {
        if quiet {
            write_stderr_line(stderr, &envelope.error);
        }
        1
    }
}
