//! AWS shared credentials and config files.
//!
//! Both files use the INI layout written by the AWS CLI. A profile is named
//! `[name]` in the credentials file and `[profile name]` in the config file,
//! except `default`, which is `[default]` in both.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use super::aws::{AwsConfigError, Credentials};

/// Profile used when `AWS_PROFILE` is unset.
pub const DEFAULT_PROFILE: &str = "default";

type Section = HashMap<String, String>;

/// Settings one profile contributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedProfile {
    /// `aws_access_key_id`.
    pub access_key_id: Option<String>,
    /// `aws_secret_access_key`.
    pub secret_access_key: Option<String>,
    /// `aws_session_token`.
    pub session_token: Option<String>,
    /// `region`.
    pub region: Option<String>,
}

impl SharedProfile {
    /// Static credentials, when the profile holds a complete key pair.
    #[must_use]
    pub fn credentials(&self) -> Option<Credentials> {
        Some(Credentials {
            access_key_id: self.access_key_id.clone()?,
            secret_access_key: self.secret_access_key.clone()?,
            session_token: self.session_token.clone(),
        })
    }

    fn from_sections(credentials: Option<&Section>, config: Option<&Section>) -> Self {
        let pick = |first: Option<&Section>, second: Option<&Section>, key: &str| {
            first
                .and_then(|section| section.get(key))
                .or_else(|| second.and_then(|section| section.get(key)))
                .filter(|value| !value.is_empty())
                .cloned()
        };
        Self {
            access_key_id: pick(credentials, config, "aws_access_key_id"),
            secret_access_key: pick(credentials, config, "aws_secret_access_key"),
            session_token: pick(credentials, config, "aws_session_token"),
            region: pick(config, credentials, "region"),
        }
    }
}

/// Locations of the shared files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileFiles {
    /// The credentials file, usually `~/.aws/credentials`.
    pub credentials: Option<PathBuf>,
    /// The config file, usually `~/.aws/config`.
    pub config: Option<PathBuf>,
}

impl ProfileFiles {
    /// Find the files, honouring `AWS_SHARED_CREDENTIALS_FILE` and
    /// `AWS_CONFIG_FILE` before falling back to `~/.aws`.
    #[must_use]
    pub fn locate(env: impl Fn(&str) -> Option<String>, home: Option<&Path>) -> Self {
        let aws_dir = home.map(|home| home.join(".aws"));
        Self {
            credentials: env("AWS_SHARED_CREDENTIALS_FILE")
                .map(PathBuf::from)
                .or_else(|| aws_dir.as_ref().map(|dir| dir.join("credentials"))),
            config: env("AWS_CONFIG_FILE")
                .map(PathBuf::from)
                .or_else(|| aws_dir.as_ref().map(|dir| dir.join("config"))),
        }
    }

    /// Read `profile` from both files.
    ///
    /// Missing files count as empty. Returns `None` when neither file has a
    /// section for the profile.
    ///
    /// # Errors
    ///
    /// Returns [`AwsConfigError::ProfileFile`] when a file exists but cannot
    /// be read.
    pub fn load(&self, profile: &str) -> Result<Option<SharedProfile>, AwsConfigError> {
        let credentials = read_sections(self.credentials.as_deref())?;
        let config = read_sections(self.config.as_deref())?;

        let config_section = if profile == DEFAULT_PROFILE {
            DEFAULT_PROFILE.to_owned()
        } else {
            format!("profile {profile}")
        };
        let from_credentials = credentials.get(profile);
        let from_config = config.get(&config_section);
        if from_credentials.is_none() && from_config.is_none() {
            return Ok(None);
        }
        debug!("using shared AWS profile {profile}");
        Ok(Some(SharedProfile::from_sections(
            from_credentials,
            from_config,
        )))
    }
}

fn read_sections(path: Option<&Path>) -> Result<HashMap<String, Section>, AwsConfigError> {
    let Some(path) = path else {
        return Ok(HashMap::new());
    };
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(parse_sections(&text)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(err) => Err(AwsConfigError::ProfileFile {
            path: path.display().to_string(),
            reason: err.to_string(),
        }),
    }
}

/// Split INI text into sections of lower-cased keys.
///
/// Comment lines start with `#` or `;`. Indented lines belong to a nested
/// block such as `s3 =` and are skipped, as are lines before the first
/// section header.
fn parse_sections(text: &str) -> HashMap<String, Section> {
    let mut sections: HashMap<String, Section> = HashMap::new();
    let mut current: Option<String> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            let name = name.trim().to_owned();
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }
        if raw.starts_with(char::is_whitespace) {
            continue;
        }
        let (Some(section), Some((key, value))) = (current.as_ref(), line.split_once('=')) else {
            continue;
        };
        if let Some(entries) = sections.get_mut(section) {
            entries.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
        }
    }
    sections
}
