//! Trusted signing keys.
//!
//! The keyring is always built from key material compiled into the binary.
//! It is never read from user input or fetched from the release host, so a
//! compromised mirror cannot supply both an image and the key that vouches
//! for it. The build script embeds `keys/image-signing-key.asc`, or the file
//! named by `BOOTS_TRUST_ANCHOR` at build time.

use log::{debug, trace};
use pgp::composed::{Deserializable, SignedPublicKey};
use pgp::types::PublicKeyTrait;

/// The ASCII-armored release signing key embedded at build time.
pub const TRUST_ANCHOR: &str = include_str!(concat!(env!("OUT_DIR"), "/trust-anchor.asc"));

/// Errors raised while parsing trusted key material.
///
/// These indicate corrupt embedded material, which is a build defect rather
/// than a condition the caller can recover from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyringError {
    /// The armored blob could not be decoded into public keys.
    #[error("invalid trusted key material: {reason}")]
    Parse {
        /// Description of the parse failure.
        reason: String,
    },

    /// The blob decoded but contained no public keys.
    #[error("trusted key material contains no public keys")]
    Empty,
}

/// A set of trusted public keys.
#[derive(Debug, Clone)]
pub struct Keyring {
    keys: Vec<SignedPublicKey>,
}

impl Keyring {
    /// Parse one or more ASCII-armored public keys.
    ///
    /// Each key's self-signatures and subkey bindings are checked; a key that
    /// fails those checks makes the whole blob invalid.
    ///
    /// # Errors
    ///
    /// Returns [`KeyringError::Parse`] when the blob is malformed and
    /// [`KeyringError::Empty`] when it holds no keys.
    pub fn from_armored(material: &str) -> Result<Self, KeyringError> {
        let (parsed, _headers) =
            SignedPublicKey::from_string_many(material).map_err(|e| KeyringError::Parse {
                reason: e.to_string(),
            })?;

        let mut keys = Vec::new();
        for key in parsed {
            let key = key.map_err(|e| KeyringError::Parse {
                reason: e.to_string(),
            })?;
            key.verify().map_err(|e| KeyringError::Parse {
                reason: format!("key {} failed self-verification: {e}", key_id_hex(&key)),
            })?;
            trace!(
                "loaded trusted key {} with {} subkey(s)",
                key_id_hex(&key),
                key.public_subkeys.len()
            );
            keys.push(key);
        }

        if keys.is_empty() {
            return Err(KeyringError::Empty);
        }
        debug!("keyring holds {} trusted key(s)", keys.len());
        Ok(Self { keys })
    }

    /// The trusted primary keys, each carrying its subkeys.
    #[must_use]
    pub fn keys(&self) -> &[SignedPublicKey] {
        &self.keys
    }

    /// Number of trusted primary keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the keyring holds no keys.
    ///
    /// Only test doubles construct an empty keyring; parsing rejects one.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[cfg(any(test, feature = "test-support"))]
    pub(crate) fn empty() -> Self {
        Self { keys: Vec::new() }
    }
}

/// Capability that yields the keyring used for verification.
pub trait TrustAnchor {
    /// Load a fresh keyring.
    ///
    /// # Errors
    ///
    /// Returns an error if the key material is corrupt.
    fn load_keyring(&self) -> Result<Keyring, KeyringError>;
}

/// The production trust anchor backed by [`TRUST_ANCHOR`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedTrustAnchor;

impl TrustAnchor for EmbeddedTrustAnchor {
    fn load_keyring(&self) -> Result<Keyring, KeyringError> {
        Keyring::from_armored(TRUST_ANCHOR)
    }
}

/// Render a key id as sixteen upper-case hex digits.
pub(crate) fn format_key_id(key: &impl PublicKeyTrait) -> String {
    key.key_id()
        .as_ref()
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect()
}

fn key_id_hex(key: &SignedPublicKey) -> String {
    format_key_id(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNING_KEY: &str = include_str!("../../tests/fixtures/signing-key.asc");
    const COMBINED_KEYRING: &str = include_str!("../../tests/fixtures/combined-keyring.asc");

    #[test]
    fn embedded_trust_anchor_parses() {
        let keyring = EmbeddedTrustAnchor
            .load_keyring()
            .expect("embedded key material must parse");
        assert_eq!(keyring.len(), 1);
        assert!(!keyring.is_empty());
    }

    #[test]
    fn default_build_embeds_the_checked_in_key() {
        if option_env!("BOOTS_TRUST_ANCHOR").is_none() {
            assert_eq!(TRUST_ANCHOR, include_str!("../../keys/image-signing-key.asc"));
        }
    }

    #[test]
    fn fixture_key_carries_signing_subkey() {
        let keyring = Keyring::from_armored(SIGNING_KEY).expect("fixture key");
        let key = keyring.keys().first().expect("one key");
        assert_eq!(format_key_id(key), "544F5BBC99F62F45");
        assert_eq!(key.public_subkeys.len(), 1);
    }

    #[test]
    fn multiple_keys_in_one_armor_block_are_loaded() {
        let keyring = Keyring::from_armored(COMBINED_KEYRING).expect("combined keyring");
        assert_eq!(keyring.len(), 2);
    }

    #[test]
    fn garbage_material_is_a_parse_error() {
        let err = Keyring::from_armored("not a key").expect_err("must fail");
        assert!(
            matches!(err, KeyringError::Parse { .. } | KeyringError::Empty),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn truncated_armor_is_a_parse_error() {
        let truncated = SIGNING_KEY
            .lines()
            .take(6)
            .collect::<Vec<_>>()
            .join("\n");
        let err = Keyring::from_armored(&truncated).expect_err("must fail");
        assert!(
            matches!(err, KeyringError::Parse { .. } | KeyringError::Empty),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn each_load_builds_a_fresh_keyring() {
        let first = EmbeddedTrustAnchor.load_keyring().expect("first load");
        let second = EmbeddedTrustAnchor.load_keyring().expect("second load");
        assert_eq!(
            first.keys().first().map(format_key_id),
            second.keys().first().map(format_key_id)
        );
    }
}
