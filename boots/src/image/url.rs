//! Canonical URLs for release images and their detached signatures.
//!
//! Release images are published per channel and architecture under a fixed
//! host layout. The URL builder is pure: malformed inputs still produce a URL,
//! which then fails at fetch time.

use std::fmt;

/// Host suffix under which each release channel is published.
pub const RELEASE_HOST: &str = "release.flatcar-linux.net";

/// The production image filename fetched when no name is given.
pub const DEFAULT_ARTIFACT_NAME: &str = "flatcar_production_image.bin.bz2";

/// Suffix appended to an artifact URL to locate its detached signature.
pub const SIGNATURE_SUFFIX: &str = ".sig";

/// Identifies a single artifact on the release host.
///
/// # Examples
///
/// ```
/// use boots::image::url::ArtifactRequest;
///
/// let request = ArtifactRequest::new("stable", "amd64", "image.bin");
/// assert_eq!(
///     request.artifact_url(),
///     "https://stable.release.flatcar-linux.net/amd64-usr/current/image.bin"
/// );
/// assert_eq!(request.signature_url(), format!("{}.sig", request.artifact_url()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactRequest {
    channel: String,
    architecture: String,
    artifact_name: String,
}

impl ArtifactRequest {
    /// Create a request for `artifact_name` on the given channel and architecture.
    #[must_use]
    pub fn new(
        channel: impl Into<String>,
        architecture: impl Into<String>,
        artifact_name: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            architecture: architecture.into(),
            artifact_name: artifact_name.into(),
        }
    }

    /// Create a request for the default production image.
    #[must_use]
    pub fn production_image(channel: impl Into<String>, architecture: impl Into<String>) -> Self {
        Self::new(channel, architecture, DEFAULT_ARTIFACT_NAME)
    }

    /// The release channel, e.g. `stable`.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// The CPU architecture, e.g. `amd64`.
    #[must_use]
    pub fn architecture(&self) -> &str {
        &self.architecture
    }

    /// The artifact filename on the release host.
    #[must_use]
    pub fn artifact_name(&self) -> &str {
        &self.artifact_name
    }

    /// The URL of the artifact itself.
    #[must_use]
    pub fn artifact_url(&self) -> String {
        build_url(&self.channel, &self.architecture, &self.artifact_name)
    }

    /// The URL of the artifact's detached signature.
    #[must_use]
    pub fn signature_url(&self) -> String {
        signature_url(&self.channel, &self.architecture, &self.artifact_name)
    }
}

impl fmt::Display for ArtifactRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.channel, self.architecture, self.artifact_name
        )
    }
}

/// Build the artifact URL for a channel, architecture, and artifact name.
#[must_use]
pub fn build_url(channel: &str, architecture: &str, artifact_name: &str) -> String {
    format!("https://{channel}.{RELEASE_HOST}/{architecture}-usr/current/{artifact_name}")
}

/// Build the detached-signature URL matching [`build_url`].
#[must_use]
pub fn signature_url(channel: &str, architecture: &str, artifact_name: &str) -> String {
    let mut url = build_url(channel, architecture, artifact_name);
    url.push_str(SIGNATURE_SUFFIX);
    url
}

/// Local filename used when the caller does not choose an output path.
#[must_use]
pub fn default_output_filename(channel: &str, architecture: &str) -> String {
    format!("flatcar_{channel}_{architecture}.bin.bz2")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("stable", "amd64", "image.bin")]
    #[case("alpha", "arm64", DEFAULT_ARTIFACT_NAME)]
    #[case("beta", "amd64", "version.txt")]
    fn build_url_substitutes_template(
        #[case] channel: &str,
        #[case] architecture: &str,
        #[case] name: &str,
    ) {
        let url = build_url(channel, architecture, name);
        assert_eq!(
            url,
            format!("https://{channel}.release.flatcar-linux.net/{architecture}-usr/current/{name}")
        );
    }

    #[rstest]
    #[case("stable", "amd64", "image.bin")]
    #[case("lts", "arm64", "flatcar_production_image.bin.bz2")]
    fn signature_url_appends_suffix(
        #[case] channel: &str,
        #[case] architecture: &str,
        #[case] name: &str,
    ) {
        let data = build_url(channel, architecture, name);
        let sig = signature_url(channel, architecture, name);
        assert_eq!(sig, format!("{data}.sig"));
    }

    #[test]
    fn empty_inputs_still_produce_a_url() {
        assert_eq!(
            build_url("", "", ""),
            "https://.release.flatcar-linux.net/-usr/current/"
        );
    }

    #[test]
    fn production_image_uses_default_name() {
        let request = ArtifactRequest::production_image("stable", "amd64");
        assert_eq!(request.artifact_name(), DEFAULT_ARTIFACT_NAME);
        assert!(request.artifact_url().ends_with(DEFAULT_ARTIFACT_NAME));
    }

    #[test]
    fn request_display_joins_components() {
        let request = ArtifactRequest::new("beta", "arm64", "image.bin");
        assert_eq!(request.to_string(), "beta/arm64/image.bin");
    }

    #[test]
    fn default_output_filename_includes_channel_and_arch() {
        assert_eq!(
            default_output_filename("stable", "arm64"),
            "flatcar_stable_arm64.bin.bz2"
        );
    }
}
