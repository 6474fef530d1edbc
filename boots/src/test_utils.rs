//! Shared test doubles for the boots crate.
//!
//! Each capability trait has one production implementation; the stubs here
//! are the matching test implementations used by unit and behaviour tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use crate::image::keyring::{Keyring, KeyringError, TrustAnchor};
use crate::image::sink::ArtifactSink;
use crate::image::transport::{ArtifactStream, DownloadError, Transport};
use crate::image::verify::{SignatureVerifier, SignerIdentity, VerifyError};
use crate::secret::{SecretError, SecretProvider};

/// Armored public key of the test signing key.
pub const FIXTURE_SIGNING_KEY: &str = include_str!("../tests/fixtures/signing-key.asc");

/// Payload signed by the test signing key.
pub const FIXTURE_IMAGE: &[u8] = include_bytes!("../tests/fixtures/image.bin");

/// Binary detached signature of [`FIXTURE_IMAGE`] by the test signing subkey.
pub const FIXTURE_SIGNATURE: &[u8] = include_bytes!("../tests/fixtures/image.bin.sig");

/// Detached signature of [`FIXTURE_IMAGE`] by a key outside every keyring.
pub const FIXTURE_UNTRUSTED_SIGNATURE: &[u8] =
    include_bytes!("../tests/fixtures/image.bin.untrusted.sig");

/// How a [`StubTransport`] answers a URL.
#[derive(Debug, Clone)]
pub enum StubResponse {
    /// Serve these bytes with their exact length declared.
    Body(Vec<u8>),
    /// Serve these bytes but declare a different length.
    BodyWithLength(Vec<u8>, Option<u64>),
    /// Fail with a 404.
    NotFound,
    /// Fail with the given HTTP status.
    Status(u16),
    /// Fail before any response arrives.
    ConnectionRefused,
}

/// A transport that serves canned responses keyed by URL and records requests.
///
/// Unknown URLs answer with [`StubResponse::NotFound`].
#[derive(Debug, Default)]
pub struct StubTransport {
    responses: HashMap<String, StubResponse>,
    requested: RefCell<Vec<String>>,
}

impl StubTransport {
    /// Create a transport with no responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the response for `url`.
    #[must_use]
    pub fn with(mut self, url: impl Into<String>, response: StubResponse) -> Self {
        self.responses.insert(url.into(), response);
        self
    }

    /// URLs requested so far, in order.
    #[must_use]
    pub fn requested(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }
}

impl Transport for StubTransport {
    fn download(&self, url: &str) -> Result<ArtifactStream, DownloadError> {
        self.requested.borrow_mut().push(url.to_owned());
        match self.responses.get(url).cloned() {
            Some(StubResponse::Body(bytes)) => Ok(ArtifactStream::from_bytes(bytes)),
            Some(StubResponse::BodyWithLength(bytes, declared)) => Ok(ArtifactStream::new(
                Box::new(Cursor::new(bytes)),
                declared,
            )),
            Some(StubResponse::Status(status)) => Err(DownloadError::HttpStatus {
                url: url.to_owned(),
                status,
            }),
            Some(StubResponse::ConnectionRefused) => Err(DownloadError::Request {
                url: url.to_owned(),
                reason: "connection refused".to_owned(),
            }),
            Some(StubResponse::NotFound) | None => Err(DownloadError::NotFound {
                url: url.to_owned(),
            }),
        }
    }
}

/// A verifier that accepts exactly one payload, regardless of the signature.
///
/// Both streams are read fully, as the real verifier does.
#[derive(Debug)]
pub struct StubVerifier {
    accepted: Vec<u8>,
    calls: RefCell<usize>,
}

impl StubVerifier {
    /// Accept only `payload`.
    #[must_use]
    pub fn accepting(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            accepted: payload.into(),
            calls: RefCell::new(0),
        }
    }

    /// Number of verification attempts so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        *self.calls.borrow()
    }

    /// The identity reported on success.
    #[must_use]
    pub fn identity() -> SignerIdentity {
        SignerIdentity {
            key_id: "0000000000000001".to_owned(),
            primary_key_id: "0000000000000001".to_owned(),
            user_id: Some("Stub Signer <stub@boots.test>".to_owned()),
        }
    }
}

impl SignatureVerifier for StubVerifier {
    fn verify(
        &self,
        _keyring: &Keyring,
        signed: &mut dyn Read,
        signature: &mut dyn Read,
    ) -> Result<SignerIdentity, VerifyError> {
        *self.calls.borrow_mut() += 1;
        let mut data = Vec::new();
        signed.read_to_end(&mut data)?;
        io::copy(signature, &mut io::sink())?;
        if data == self.accepted {
            Ok(Self::identity())
        } else {
            Err(VerifyError::SignatureInvalid {
                reason: "stub rejected payload".to_owned(),
            })
        }
    }
}

/// A trust anchor that yields an empty keyring, for use with [`StubVerifier`].
#[derive(Debug, Default)]
pub struct StubTrustAnchor {
    loads: RefCell<usize>,
}

impl StubTrustAnchor {
    /// Number of keyring loads so far.
    #[must_use]
    pub fn loads(&self) -> usize {
        *self.loads.borrow()
    }
}

impl TrustAnchor for StubTrustAnchor {
    fn load_keyring(&self) -> Result<Keyring, KeyringError> {
        *self.loads.borrow_mut() += 1;
        Ok(Keyring::empty())
    }
}

/// A trust anchor backed by the test signing key fixture.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureTrustAnchor;

impl TrustAnchor for FixtureTrustAnchor {
    fn load_keyring(&self) -> Result<Keyring, KeyringError> {
        Keyring::from_armored(FIXTURE_SIGNING_KEY)
    }
}

/// A trust anchor whose material is corrupt.
#[derive(Debug, Default, Clone, Copy)]
pub struct CorruptTrustAnchor;

impl TrustAnchor for CorruptTrustAnchor {
    fn load_keyring(&self) -> Result<Keyring, KeyringError> {
        Keyring::from_armored("-----BEGIN PGP PUBLIC KEY BLOCK-----\n\ncorrupt\n")
    }
}

/// An in-memory sink whose rewind always fails, like a pipe.
#[derive(Debug, Default)]
pub struct UnseekableSink {
    written: Vec<u8>,
}

impl UnseekableSink {
    /// Bytes written so far.
    #[must_use]
    pub fn written(&self) -> &[u8] {
        &self.written
    }
}

impl Read for UnseekableSink {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "sink is write-only",
        ))
    }
}

impl Write for UnseekableSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for UnseekableSink {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "illegal seek",
        ))
    }
}

impl ArtifactSink for UnseekableSink {
    fn location(&self) -> String {
        "pipe".to_owned()
    }
}

/// A secret provider backed by an in-memory map.
///
/// Keys listed with [`StubSecretProvider::unreachable`] fail as if the
/// backend could not be contacted.
#[derive(Debug, Default)]
pub struct StubSecretProvider {
    values: RefCell<BTreeMap<String, String>>,
    unreachable: Vec<String>,
}

impl StubSecretProvider {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a stored secret.
    #[must_use]
    pub fn with_secret(self, key: &str, value: &str) -> Self {
        self.values
            .borrow_mut()
            .insert(key.to_owned(), value.to_owned());
        self
    }

    /// Make every operation on `key` fail with a connectivity error.
    #[must_use]
    pub fn unreachable(mut self, key: &str) -> Self {
        self.unreachable.push(key.to_owned());
        self
    }

    /// The stored value for `key`, if any.
    #[must_use]
    pub fn stored(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    fn check_reachable(&self, key: &str) -> Result<(), SecretError> {
        if self.unreachable.iter().any(|k| k == key) {
            return Err(SecretError::Unavailable {
                reason: "connection refused".to_owned(),
            });
        }
        Ok(())
    }
}

impl SecretProvider for StubSecretProvider {
    fn delete(&self, key: &str) -> Result<(), SecretError> {
        self.check_reachable(key)?;
        self.values
            .borrow_mut()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| SecretError::NotFound {
                key: key.to_owned(),
            })
    }

    fn generate(
        &self,
        key: &str,
        length: usize,
        digits: usize,
        symbols: usize,
    ) -> Result<String, SecretError> {
        self.check_reachable(key)?;
        let letters = length
            .checked_sub(digits + symbols)
            .ok_or_else(|| SecretError::Generate {
                reason: "requested counts exceed the total length".to_owned(),
            })?;
        let value = format!(
            "{}{}{}",
            "a".repeat(letters),
            "1".repeat(digits),
            "!".repeat(symbols)
        );
        self.values
            .borrow_mut()
            .insert(key.to_owned(), value.clone());
        Ok(value)
    }

    fn get(&self, key: &str) -> Result<String, SecretError> {
        self.check_reachable(key)?;
        self.stored(key).ok_or_else(|| SecretError::NotFound {
            key: key.to_owned(),
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SecretError> {
        self.check_reachable(key)?;
        self.values
            .borrow_mut()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}
