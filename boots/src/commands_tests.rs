//! Tests for command handlers.

use super::*;
use crate::image::url::build_url;
use crate::secret::{MockSecretProvider, SecretError};
use crate::test_utils::{
    FIXTURE_IMAGE, FIXTURE_SIGNATURE, FixtureTrustAnchor, StubResponse, StubSecretProvider,
    StubTransport, StubTrustAnchor, StubVerifier,
};
use crate::image::verify::PgpVerifier;
use rstest::{fixture, rstest};
use tempfile::TempDir;

#[fixture]
fn temp_dir() -> TempDir {
    TempDir::new().expect("create temp dir")
}

fn fetch_args(dir: &TempDir, name: &str) -> FetchArgs {
    let output = Utf8PathBuf::from_path_buf(dir.path().join("out.bin")).expect("UTF-8 temp path");
    FetchArgs {
        channel: "stable".to_owned(),
        arch: "amd64".to_owned(),
        name: name.to_owned(),
        output: Some(output),
    }
}

fn served(name: &str, body: &[u8], signature: &[u8]) -> StubTransport {
    let url = build_url("stable", "amd64", name);
    StubTransport::new()
        .with(url.clone(), StubResponse::Body(body.to_vec()))
        .with(format!("{url}.sig"), StubResponse::Body(signature.to_vec()))
}

#[rstest]
#[case::explicit(Some("/tmp/custom.bin"), DEFAULT_ARTIFACT_NAME, "/tmp/custom.bin")]
#[case::production_image(None, DEFAULT_ARTIFACT_NAME, "flatcar_beta_arm64.bin.bz2")]
#[case::other_artifact(None, "version.txt", "version.txt")]
fn output_path_selection(
    #[case] output: Option<&str>,
    #[case] name: &str,
    #[case] expected: &str,
) {
    let args = FetchArgs {
        channel: "beta".to_owned(),
        arch: "arm64".to_owned(),
        name: name.to_owned(),
        output: output.map(Utf8PathBuf::from),
    };
    assert_eq!(output_path(&args), Utf8PathBuf::from(expected));
}

#[rstest]
fn fetch_writes_verified_file_and_reports_progress(temp_dir: TempDir) {
    let args = fetch_args(&temp_dir, "image.bin");
    let transport = served("image.bin", b"ABCD", b"sig");
    let verifier = StubVerifier::accepting(b"ABCD".to_vec());
    let deps = FetchDeps {
        transport: &transport,
        trust_anchor: &StubTrustAnchor::default(),
        verifier: &verifier,
    };
    let mut stderr = Vec::new();

    let report = run_fetch(&args, &deps, false, &mut stderr).expect("verified");

    assert!(report.verified);
    assert_eq!(report.size, 4);
    assert_eq!(std::fs::read(&report.path).expect("file written"), b"ABCD");
    let progress = String::from_utf8(stderr).expect("UTF-8");
    assert!(progress.contains("Fetching stable/amd64/image.bin"));
    assert!(progress.contains("Verified"));
}

#[rstest]
fn quiet_fetch_writes_no_progress(temp_dir: TempDir) {
    let args = fetch_args(&temp_dir, "image.bin");
    let transport = served("image.bin", b"ABCD", b"sig");
    let verifier = StubVerifier::accepting(b"ABCD".to_vec());
    let deps = FetchDeps {
        transport: &transport,
        trust_anchor: &StubTrustAnchor::default(),
        verifier: &verifier,
    };
    let mut stderr = Vec::new();

    run_fetch(&args, &deps, true, &mut stderr).expect("verified");
    assert!(stderr.is_empty());
}

#[rstest]
fn fetch_with_real_signature_names_the_signer(temp_dir: TempDir) {
    let args = fetch_args(&temp_dir, "image.bin");
    let transport = served("image.bin", FIXTURE_IMAGE, FIXTURE_SIGNATURE);
    let deps = FetchDeps {
        transport: &transport,
        trust_anchor: &FixtureTrustAnchor,
        verifier: &PgpVerifier,
    };

    let report = run_fetch(&args, &deps, true, &mut Vec::new()).expect("verified");
    assert_eq!(report.signer.key_id, "9FDDBCA74B5DC138");
    assert_eq!(report.signer.primary_key_id, "544F5BBC99F62F45");
}

#[rstest]
fn rejected_signature_leaves_unverified_file(temp_dir: TempDir) {
    let args = fetch_args(&temp_dir, "image.bin");
    let transport = served("image.bin", b"EVIL", b"sig");
    let verifier = StubVerifier::accepting(b"ABCD".to_vec());
    let deps = FetchDeps {
        transport: &transport,
        trust_anchor: &StubTrustAnchor::default(),
        verifier: &verifier,
    };

    let result = run_fetch(&args, &deps, true, &mut Vec::new());

    let path = args.output.clone().expect("output set");
    assert_eq!(std::fs::read(&path).expect("file kept"), b"EVIL");
    let envelope = envelope_for(&result);
    assert!(!envelope.success);
    assert_eq!(envelope.data["verified"], false);
    assert_eq!(envelope.data["path"], path.as_str());
    assert!(envelope.error.contains("not verified"));
}

#[rstest]
fn missing_artifact_is_a_plain_failure(temp_dir: TempDir) {
    let args = fetch_args(&temp_dir, "image.bin");
    let transport = StubTransport::new();
    let verifier = StubVerifier::accepting(b"ABCD".to_vec());
    let deps = FetchDeps {
        transport: &transport,
        trust_anchor: &StubTrustAnchor::default(),
        verifier: &verifier,
    };

    let result = run_fetch(&args, &deps, true, &mut Vec::new());

    assert!(matches!(result, Err(BootsError::Fetch(_))));
    assert_eq!(verifier.calls(), 0);
    let envelope = envelope_for(&result);
    assert_eq!(envelope.data, serde_json::Value::Null);
}

#[rstest]
#[case::unreachable(StubResponse::ConnectionRefused)]
#[case::missing(StubResponse::NotFound)]
fn failed_download_keeps_the_previous_file(temp_dir: TempDir, #[case] response: StubResponse) {
    let args = fetch_args(&temp_dir, "image.bin");
    let path = args.output.clone().expect("output set");
    std::fs::write(&path, b"previous image").expect("seed previous download");
    let transport = StubTransport::new().with(build_url("stable", "amd64", "image.bin"), response);
    let verifier = StubVerifier::accepting(b"ABCD".to_vec());
    let deps = FetchDeps {
        transport: &transport,
        trust_anchor: &StubTrustAnchor::default(),
        verifier: &verifier,
    };

    let result = run_fetch(&args, &deps, true, &mut Vec::new());

    assert!(matches!(result, Err(BootsError::Fetch(_))), "{result:?}");
    assert_eq!(std::fs::read(&path).expect("file kept"), b"previous image");
    let leftovers = std::fs::read_dir(temp_dir.path()).expect("list dir").count();
    assert_eq!(leftovers, 1);
}

#[rstest]
fn verified_download_replaces_the_previous_file(temp_dir: TempDir) {
    let args = fetch_args(&temp_dir, "image.bin");
    let path = args.output.clone().expect("output set");
    std::fs::write(&path, b"previous image").expect("seed previous download");
    let transport = served("image.bin", b"ABCD", b"sig");
    let verifier = StubVerifier::accepting(b"ABCD".to_vec());
    let deps = FetchDeps {
        transport: &transport,
        trust_anchor: &StubTrustAnchor::default(),
        verifier: &verifier,
    };

    run_fetch(&args, &deps, true, &mut Vec::new()).expect("verified");

    assert_eq!(std::fs::read(&path).expect("file written"), b"ABCD");
}

#[test]
fn unwritable_output_fails_before_download() {
    let args = FetchArgs {
        channel: "stable".to_owned(),
        arch: "amd64".to_owned(),
        name: "image.bin".to_owned(),
        output: Some(Utf8PathBuf::from("/nonexistent-boots-dir/out.bin")),
    };
    let transport = StubTransport::new();
    let verifier = StubVerifier::accepting(Vec::new());
    let deps = FetchDeps {
        transport: &transport,
        trust_anchor: &StubTrustAnchor::default(),
        verifier: &verifier,
    };

    let result = run_fetch(&args, &deps, true, &mut Vec::new());

    assert!(matches!(result, Err(BootsError::CreateOutput { .. })));
    assert!(transport.requested().is_empty());
}

#[test]
fn secret_set_then_get_round_trips_through_provider() {
    let provider = StubSecretProvider::new();
    let set = SecretCommand::Set {
        key: "db/password".to_owned(),
        value: "hunter2".to_owned(),
    };
    run_secret(&set, &provider).expect("stored");

    let output = run_secret(
        &SecretCommand::Get {
            key: "db/password".to_owned(),
        },
        &provider,
    )
    .expect("found");
    assert_eq!(
        output,
        SecretOutput::KeyValue {
            key: "db/password".to_owned(),
            value: "hunter2".to_owned(),
        }
    );
}

#[test]
fn secret_delete_reports_only_the_key() {
    let provider = StubSecretProvider::new().with_secret("db/password", "hunter2");
    let output = run_secret(
        &SecretCommand::Delete {
            key: "db/password".to_owned(),
        },
        &provider,
    )
    .expect("deleted");

    let envelope = envelope_for(&Ok::<_, BootsError>(output));
    assert_eq!(envelope.data, serde_json::json!({"key": "db/password"}));
    assert!(provider.stored("db/password").is_none());
}

#[test]
fn secret_generate_passes_policy_through() {
    let mut provider = MockSecretProvider::new();
    provider
        .expect_generate()
        .withf(|key, length, digits, symbols| {
            key == "api/token" && *length == 24 && *digits == 3 && *symbols == 2
        })
        .times(1)
        .returning(|_, _, _, _| Ok("generated".to_owned()));

    let output = run_secret(
        &SecretCommand::Generate {
            key: "api/token".to_owned(),
            length: 24,
            digits: 3,
            symbols: 2,
        },
        &provider,
    )
    .expect("generated");
    assert_eq!(
        output,
        SecretOutput::KeyValue {
            key: "api/token".to_owned(),
            value: "generated".to_owned(),
        }
    );
}

#[rstest]
#[case::missing(StubSecretProvider::new(), true)]
#[case::offline(StubSecretProvider::new().unreachable("db/password"), false)]
fn secret_get_failures_keep_not_found_distinct(
    #[case] provider: StubSecretProvider,
    #[case] not_found: bool,
) {
    let result = run_secret(
        &SecretCommand::Get {
            key: "db/password".to_owned(),
        },
        &provider,
    );
    let err = result.expect_err("fails");
    assert_eq!(err.is_not_found(), not_found);
    let envelope = envelope_for(&Err::<SecretOutput, _>(err));
    assert!(!envelope.success);
    assert!(!envelope.error.is_empty());
}

#[test]
fn provider_errors_pass_through_unchanged() {
    let mut provider = MockSecretProvider::new();
    provider.expect_set().returning(|_, _| {
        Err(SecretError::Backend {
            reason: "error querying AWS: AccessDeniedException: denied".to_owned(),
        })
    });

    let err = run_secret(
        &SecretCommand::Set {
            key: "k".to_owned(),
            value: "v".to_owned(),
        },
        &provider,
    )
    .expect_err("backend failure");
    assert!(err.to_string().contains("AccessDeniedException"));
}
