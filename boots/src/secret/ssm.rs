//! Secrets stored in the AWS SSM Parameter Store.
//!
//! [`SsmSecretProvider`] maps [`SecretProvider`] operations onto a
//! [`ParameterStore`]. [`SsmClient`] is the production store: it speaks the
//! AWS JSON 1.1 protocol over HTTPS and signs each request with SigV4.

use std::time::Duration;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use super::aws::AwsConfig;
use super::password::{PasswordGenerator, PasswordPolicy};
use super::sigv4::{JsonRequest, Signer};
use super::{SecretError, SecretProvider};

const SERVICE: &str = "ssm";
const TARGET_PREFIX: &str = "AmazonSSM";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const SECURE_STRING: &str = "SecureString";
const NOT_FOUND_CODE: &str = "ParameterNotFound";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised by a parameter store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParameterStoreError {
    /// The named parameter does not exist.
    #[error("parameter not found: {name}")]
    NotFound {
        /// Parameter name.
        name: String,
    },

    /// The service rejected the request.
    #[error("{code}: {message}")]
    Service {
        /// AWS error code, e.g. `AccessDeniedException`.
        code: String,
        /// Service-supplied message.
        message: String,
    },

    /// The service could not be reached.
    #[error("request failed: {reason}")]
    Transport {
        /// Description of the failure.
        reason: String,
    },

    /// The service answered with something unexpected.
    #[error("invalid response: {reason}")]
    InvalidResponse {
        /// Description of the problem.
        reason: String,
    },
}

/// Key/value storage for encrypted parameters.
#[cfg_attr(test, mockall::automock)]
pub trait ParameterStore {
    /// Fetch and decrypt the value of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterStoreError::NotFound`] if `name` does not exist.
    fn get_parameter(&self, name: &str) -> Result<String, ParameterStoreError>;

    /// Store `value` under `name` as an encrypted parameter, overwriting.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write.
    fn put_secure_parameter(&self, name: &str, value: &str) -> Result<(), ParameterStoreError>;

    /// Delete `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterStoreError::NotFound`] if `name` does not exist.
    fn delete_parameter(&self, name: &str) -> Result<(), ParameterStoreError>;
}

/// [`SecretProvider`] backed by a [`ParameterStore`].
pub struct SsmSecretProvider<'a> {
    store: &'a dyn ParameterStore,
    generator: &'a dyn PasswordGenerator,
}

impl<'a> SsmSecretProvider<'a> {
    /// Build a provider over `store`, generating values with `generator`.
    #[must_use]
    pub fn new(store: &'a dyn ParameterStore, generator: &'a dyn PasswordGenerator) -> Self {
        Self { store, generator }
    }
}

impl SecretProvider for SsmSecretProvider<'_> {
    fn delete(&self, key: &str) -> Result<(), SecretError> {
        self.store
            .delete_parameter(key)
            .map_err(|e| map_store_error(key, e))
    }

    fn generate(
        &self,
        key: &str,
        length: usize,
        digits: usize,
        symbols: usize,
    ) -> Result<String, SecretError> {
        let policy = PasswordPolicy {
            length,
            digits,
            symbols,
        };
        let value = self
            .generator
            .generate(&policy)
            .map_err(|e| SecretError::Generate {
                reason: e.to_string(),
            })?;
        self.set(key, &value)?;
        Ok(value)
    }

    fn get(&self, key: &str) -> Result<String, SecretError> {
        self.store
            .get_parameter(key)
            .map_err(|e| map_store_error(key, e))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SecretError> {
        self.store
            .put_secure_parameter(key, value)
            .map_err(|e| map_store_error(key, e))
    }
}

fn map_store_error(key: &str, err: ParameterStoreError) -> SecretError {
    match err {
        ParameterStoreError::NotFound { .. } => SecretError::NotFound {
            key: key.to_owned(),
        },
        ParameterStoreError::Transport { reason } => SecretError::Unavailable { reason },
        other @ (ParameterStoreError::Service { .. }
        | ParameterStoreError::InvalidResponse { .. }) => SecretError::Backend {
            reason: format!("error querying AWS: {other}"),
        },
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetParameterInput<'a> {
    name: &'a str,
    with_decryption: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PutParameterInput<'a> {
    name: &'a str,
    value: &'a str,
    #[serde(rename = "Type")]
    parameter_type: &'a str,
    overwrite: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_id: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteParameterInput<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetParameterOutput {
    parameter: ParameterValue,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParameterValue {
    value: String,
}

#[derive(Deserialize)]
struct ServiceErrorBody {
    #[serde(rename = "__type")]
    error_type: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

/// Parameter store client for one AWS region.
pub struct SsmClient {
    agent: ureq::Agent,
    config: AwsConfig,
    endpoint: String,
    host: String,
}

impl SsmClient {
    /// Build a client for the region in `config`.
    #[must_use]
    pub fn new(config: AwsConfig) -> Self {
        let host = format!("{SERVICE}.{}.amazonaws.com", config.region);
        let agent_config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(agent_config),
            endpoint: format!("https://{host}/"),
            host,
            config,
        }
    }

    /// The URL requests are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn call<T: Serialize>(
        &self,
        action: &str,
        name: &str,
        input: &T,
    ) -> Result<String, ParameterStoreError> {
        let body = serde_json::to_vec(input).map_err(|e| ParameterStoreError::InvalidResponse {
            reason: format!("failed to encode request: {e}"),
        })?;
        let target = format!("{TARGET_PREFIX}.{action}");
        let signed = Signer::new(&self.config.credentials, &self.config.region, SERVICE)
            .sign(
                &JsonRequest {
                    host: &self.host,
                    target: &target,
                    content_type: CONTENT_TYPE,
                    body: &body,
                },
                chrono::Utc::now(),
            )
            .map_err(|e| ParameterStoreError::Transport {
                reason: e.to_string(),
            })?;

        debug!("{action} {name} via {}", self.endpoint);
        let mut request = self
            .agent
            .post(&self.endpoint)
            .header("Content-Type", CONTENT_TYPE)
            .header("X-Amz-Target", &target)
            .header("X-Amz-Date", &signed.amz_date)
            .header("Authorization", &signed.authorization);
        if let Some(token) = &signed.security_token {
            request = request.header("X-Amz-Security-Token", token);
        }

        let mut response = request
            .send(&body[..])
            .map_err(|e| ParameterStoreError::Transport {
                reason: e.to_string(),
            })?;
        let status = response.status().as_u16();
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ParameterStoreError::Transport {
                reason: e.to_string(),
            })?;
        trace!("{action} answered {status}");
        interpret_response(name, status, text)
    }
}

impl ParameterStore for SsmClient {
    fn get_parameter(&self, name: &str) -> Result<String, ParameterStoreError> {
        let text = self.call(
            "GetParameter",
            name,
            &GetParameterInput {
                name,
                with_decryption: true,
            },
        )?;
        parse_get_parameter(&text)
    }

    fn put_secure_parameter(&self, name: &str, value: &str) -> Result<(), ParameterStoreError> {
        self.call(
            "PutParameter",
            name,
            &PutParameterInput {
                name,
                value,
                parameter_type: SECURE_STRING,
                overwrite: true,
                key_id: self.config.kms_key.as_deref(),
            },
        )
        .map(drop)
    }

    fn delete_parameter(&self, name: &str) -> Result<(), ParameterStoreError> {
        self.call("DeleteParameter", name, &DeleteParameterInput { name })
            .map(drop)
    }
}

fn interpret_response(
    name: &str,
    status: u16,
    text: String,
) -> Result<String, ParameterStoreError> {
    if (200..300).contains(&status) {
        return Ok(text);
    }
    Err(parse_service_error(name, status, &text))
}

fn parse_service_error(name: &str, status: u16, text: &str) -> ParameterStoreError {
    let Ok(body) = serde_json::from_str::<ServiceErrorBody>(text) else {
        return ParameterStoreError::Service {
            code: format!("HTTP {status}"),
            message: text.trim().to_owned(),
        };
    };
    let code = body
        .error_type
        .as_deref()
        .map(|t| t.rsplit('#').next().unwrap_or(t).to_owned())
        .unwrap_or_else(|| format!("HTTP {status}"));
    if code == NOT_FOUND_CODE {
        return ParameterStoreError::NotFound {
            name: name.to_owned(),
        };
    }
    ParameterStoreError::Service {
        code,
        message: body.message.unwrap_or_default(),
    }
}

fn parse_get_parameter(text: &str) -> Result<String, ParameterStoreError> {
    serde_json::from_str::<GetParameterOutput>(text)
        .map(|output| output.parameter.value)
        .map_err(|e| ParameterStoreError::InvalidResponse {
            reason: e.to_string(),
        })
}

#[cfg(test)]
#[path = "ssm_tests.rs"]
mod tests;
