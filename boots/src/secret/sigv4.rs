//! AWS Signature Version 4 for JSON-protocol POST requests.
//!
//! Only the shape used by the SSM client is supported: `POST /` with no
//! query string and a fixed set of signed headers.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use super::aws::Credentials;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Errors raised while signing.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    /// The HMAC key was rejected.
    #[error("invalid signing key: {0}")]
    InvalidKey(#[from] hmac::digest::InvalidLength),
}

/// A JSON request about to be sent.
#[derive(Debug, Clone, Copy)]
pub struct JsonRequest<'a> {
    /// Host header value, e.g. `ssm.us-east-1.amazonaws.com`.
    pub host: &'a str,
    /// `X-Amz-Target` header value.
    pub target: &'a str,
    /// `Content-Type` header value.
    pub content_type: &'a str,
    /// Request body.
    pub body: &'a [u8],
}

/// Headers to attach to a signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    /// `X-Amz-Date` header value.
    pub amz_date: String,
    /// `X-Amz-Security-Token` header value, for temporary credentials.
    pub security_token: Option<String>,
    /// `Authorization` header value.
    pub authorization: String,
}

/// Signs requests for one service in one region.
#[derive(Debug, Clone)]
pub struct Signer<'a> {
    credentials: &'a Credentials,
    region: &'a str,
    service: &'a str,
}

impl<'a> Signer<'a> {
    /// Build a signer.
    #[must_use]
    pub fn new(credentials: &'a Credentials, region: &'a str, service: &'a str) -> Self {
        Self {
            credentials,
            region,
            service,
        }
    }

    /// Sign `request` as of `now`.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] if the HMAC key is rejected.
    pub fn sign(
        &self,
        request: &JsonRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<SignedHeaders, SigningError> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let scope = format!("{date}/{}/{}/aws4_request", self.region, self.service);

        let mut headers = vec![
            ("content-type", request.content_type),
            ("host", request.host),
            ("x-amz-date", amz_date.as_str()),
        ];
        if let Some(token) = &self.credentials.session_token {
            headers.push(("x-amz-security-token", token.as_str()));
        }
        headers.push(("x-amz-target", request.target));

        let signed_headers = headers
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(";");
        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{name}:{}\n", value.trim()))
            .collect();
        let canonical_request = format!(
            "POST\n/\n\n{canonical_headers}\n{signed_headers}\n{:x}",
            Sha256::digest(request.body)
        );
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{:x}",
            Sha256::digest(canonical_request.as_bytes())
        );

        let key = signing_key(
            &self.credentials.secret_access_key,
            &date,
            self.region,
            self.service,
        )?;
        let signature = format!("{:x}", hmac(&key, string_to_sign.as_bytes())?);

        Ok(SignedHeaders {
            authorization: format!(
                "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
                self.credentials.access_key_id
            ),
            security_token: self.credentials.session_token.clone(),
            amz_date,
        })
    }
}

fn signing_key(
    secret: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, SigningError> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, service.as_bytes())?;
    Ok(hmac(&k_service, b"aws4_request")?.to_vec())
}

fn hmac(
    key: &[u8],
    data: &[u8],
) -> Result<hmac::digest::Output<HmacSha256>, SigningError> {
    let mut mac = HmacSha256::new_from_slice(key)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes())
}
