//! Detached PGP signature verification.
//!
//! The scheme is not streaming: the signature covers the whole artifact, so
//! both the signed data and the signature are read to completion before any
//! cryptographic check runs.

use std::io::{self, Read};

use log::{debug, trace};
use pgp::composed::{Deserializable, SignedPublicKey, SignedPublicSubKey, StandaloneSignature};
use pgp::packet::{KeyFlags, Signature};
use pgp::types::{Fingerprint, KeyId, PublicKeyTrait};
use serde::Serialize;

use super::keyring::{Keyring, format_key_id};

/// Prefix that marks an ASCII-armored signature.
const ARMOR_PREFIX: &[u8] = b"-----BEGIN PGP";

/// The key that produced a valid signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignerIdentity {
    /// Key id of the key or subkey that made the signature.
    pub key_id: String,
    /// Key id of the trusted primary key.
    pub primary_key_id: String,
    /// First user id bound to the primary key, if any.
    pub user_id: Option<String>,
}

/// Errors arising from signature verification.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// No trusted key produced this signature, or the signature is malformed.
    #[error("signature check failed: {reason}")]
    SignatureInvalid {
        /// Why the signature was rejected.
        reason: String,
    },

    /// The signed data or the signature could not be read.
    #[error("failed to read data for verification: {0}")]
    Io(#[from] io::Error),
}

impl VerifyError {
    /// Whether this is a trust failure rather than an I/O failure.
    #[must_use]
    pub fn is_signature_invalid(&self) -> bool {
        matches!(self, Self::SignatureInvalid { .. })
    }
}

/// Capability that checks a detached signature against a keyring.
pub trait SignatureVerifier {
    /// Read `signed` and `signature` fully and check them against `keyring`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::SignatureInvalid`] when no key in the keyring
    /// validates the signature, and [`VerifyError::Io`] when a stream fails.
    fn verify(
        &self,
        keyring: &Keyring,
        signed: &mut dyn Read,
        signature: &mut dyn Read,
    ) -> Result<SignerIdentity, VerifyError>;
}

/// The production verifier built on rPGP.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgpVerifier;

impl SignatureVerifier for PgpVerifier {
    fn verify(
        &self,
        keyring: &Keyring,
        signed: &mut dyn Read,
        signature: &mut dyn Read,
    ) -> Result<SignerIdentity, VerifyError> {
        let mut data = Vec::new();
        signed.read_to_end(&mut data)?;
        let mut raw_signature = Vec::new();
        signature.read_to_end(&mut raw_signature)?;
        debug!(
            "verifying {} byte(s) against a {} byte signature",
            data.len(),
            raw_signature.len()
        );

        let signature = parse_signature(&raw_signature)?;
        keyring
            .keys()
            .iter()
            .find_map(|key| match_key(key, &signature, &data))
            .ok_or_else(|| VerifyError::SignatureInvalid {
                reason: "no trusted key matches the signature".to_owned(),
            })
    }
}

/// Decode a binary or ASCII-armored detached signature.
fn parse_signature(raw: &[u8]) -> Result<StandaloneSignature, VerifyError> {
    let parsed = if raw.trim_ascii_start().starts_with(ARMOR_PREFIX) {
        let text = std::str::from_utf8(raw).map_err(|e| VerifyError::SignatureInvalid {
            reason: format!("armored signature is not UTF-8: {e}"),
        })?;
        StandaloneSignature::from_string(text).map(|(signature, _headers)| signature)
    } else {
        StandaloneSignature::from_bytes(raw)
    };
    parsed.map_err(|e| VerifyError::SignatureInvalid {
        reason: format!("malformed signature: {e}"),
    })
}

/// A key in the keyring that may have made the signature.
enum Candidate<'a> {
    Primary(&'a SignedPublicKey),
    Subkey(&'a SignedPublicSubKey),
}

impl Candidate<'_> {
    fn key_id(&self) -> String {
        match self {
            Self::Primary(key) => format_key_id(*key),
            Self::Subkey(key) => format_key_id(*key),
        }
    }

    fn verifies(&self, signature: &StandaloneSignature, data: &[u8]) -> bool {
        match self {
            Self::Primary(key) => signature.verify(*key, data).is_ok(),
            Self::Subkey(key) => signature.verify(*key, data).is_ok(),
        }
    }
}

/// Signing-capable keys of `key` named by the signature's issuer packets.
///
/// A signature without issuer packets names every key. Only candidates are
/// hashed against the data, so a keyring with unrelated subkeys costs one pass.
fn candidates<'a>(key: &'a SignedPublicKey, signature: &Signature) -> Vec<Candidate<'a>> {
    let key_ids = signature.issuer();
    let fingerprints = signature.issuer_fingerprint();
    let named = |id: KeyId, fingerprint: Fingerprint| {
        (key_ids.is_empty() && fingerprints.is_empty())
            || key_ids.iter().any(|issuer| **issuer == id)
            || fingerprints.iter().any(|issuer| **issuer == fingerprint)
    };

    let primary_bindings = key
        .details
        .users
        .iter()
        .flat_map(|user| user.signatures.iter())
        .chain(key.details.direct_signatures.iter());
    let primary = (named(key.key_id(), key.fingerprint()) && can_sign(primary_bindings))
        .then_some(Candidate::Primary(key));

    primary
        .into_iter()
        .chain(
            key.public_subkeys
                .iter()
                .filter(|subkey| {
                    named(subkey.key_id(), subkey.fingerprint())
                        && can_sign(subkey.signatures.iter())
                })
                .map(Candidate::Subkey),
        )
        .collect()
}

/// Whether the binding signatures allow signing data.
///
/// Keys whose bindings carry no key flags at all predate the flags
/// subpacket and are allowed to sign.
fn can_sign<'a>(bindings: impl Iterator<Item = &'a Signature>) -> bool {
    let flags: Vec<KeyFlags> = bindings.map(Signature::key_flags).collect();
    flags.iter().any(KeyFlags::sign) || flags.iter().all(|f| *f == KeyFlags::default())
}

/// Return the identity of the first candidate that validates the signature.
fn match_key(
    key: &SignedPublicKey,
    signature: &StandaloneSignature,
    data: &[u8],
) -> Option<SignerIdentity> {
    let primary_key_id = format_key_id(key);
    let found = candidates(key, &signature.signature)
        .into_iter()
        .find(|candidate| candidate.verifies(signature, data))?;
    let key_id = found.key_id();
    trace!("signature made by key {key_id} of {primary_key_id}");
    Some(SignerIdentity {
        key_id,
        primary_key_id,
        user_id: key
            .details
            .users
            .first()
            .map(|user| user.id.id().to_string()),
    })
}
