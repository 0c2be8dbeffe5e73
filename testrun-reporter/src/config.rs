// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reporter configuration.
//!
//! Configuration is layered: the embedded defaults, then an optional TOML
//! config file, then `TESTRUN_*` environment variables.

use camino::Utf8Path;
use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;
use std::{collections::BTreeSet, fmt, time::Duration};
use thiserror::Error;
use tracing::warn;

/// The embedded default configuration.
pub const DEFAULT_REPORTER_CONFIG: &str = include_str!("../default-reporter-config.toml");

/// Environment variables that override configuration keys.
static ENV_OVERRIDES: &[(&str, &str)] = &[
    ("reporting-enabled", "TESTRUN_REPORTING_ENABLED"),
    ("reporting-api-url", "TESTRUN_REPORTING_API_URL"),
    ("reporting-auth-token", "TESTRUN_REPORTING_AUTH_TOKEN"),
    ("request-timeout", "TESTRUN_REQUEST_TIMEOUT"),
    ("queue-capacity", "TESTRUN_QUEUE_CAPACITY"),
];

/// Configuration for a [`Reporter`](crate::Reporter).
#[derive(Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReporterConfig {
    /// Whether events are sent at all.
    pub reporting_enabled: bool,

    /// The collector's base URL.
    #[serde(default)]
    pub reporting_api_url: Option<String>,

    /// The bearer token sent with each request.
    #[serde(default)]
    pub reporting_auth_token: Option<String>,

    /// The timeout for a single request.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// The number of events that may wait for delivery.
    pub queue_capacity: usize,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            reporting_enabled: false,
            reporting_api_url: None,
            reporting_auth_token: None,
            request_timeout: Duration::from_secs(5),
            queue_capacity: 1024,
        }
    }
}

// The auth token must not end up in logs.
impl fmt::Debug for ReporterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReporterConfig")
            .field("reporting_enabled", &self.reporting_enabled)
            .field("reporting_api_url", &self.reporting_api_url)
            .field(
                "reporting_auth_token",
                &self.reporting_auth_token.as_ref().map(|_| "<redacted>"),
            )
            .field("request_timeout", &self.request_timeout)
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}

impl ReporterConfig {
    /// Loads configuration from the defaults, `config_file` if given, and the
    /// process environment.
    pub fn load(config_file: Option<&Utf8Path>) -> Result<Self, ReporterConfigError> {
        Self::load_with(
            config_file,
            |var| std::env::var(var).ok(),
            &mut DefaultReporterConfigWarnings,
        )
    }

    /// Loads configuration with a custom environment lookup and warning
    /// handler.
    pub fn load_with(
        config_file: Option<&Utf8Path>,
        env: impl Fn(&str) -> Option<String>,
        warnings: &mut impl ReporterConfigWarnings,
    ) -> Result<Self, ReporterConfigError> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_REPORTER_CONFIG, FileFormat::Toml));
        if let Some(config_file) = config_file {
            builder = builder.add_source(File::new(config_file.as_str(), FileFormat::Toml));
        }
        for (key, var) in ENV_OVERRIDES {
            if let Some(value) = env(var) {
                builder = builder
                    .set_override(*key, value)
                    .map_err(ReporterConfigError::Build)?;
            }
        }
        let config = builder.build().map_err(ReporterConfigError::Build)?;

        let mut unknown = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            unknown.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let mut parsed: Self = serde_path_to_error::deserialize(ignored_de)
            .map_err(|error| ReporterConfigError::Deserialize(Box::new(error)))?;

        if !unknown.is_empty() {
            warnings.unknown_config_keys(config_file, &unknown);
        }

        // An empty string means "not set", which is what unset env vars in CI
        // templates usually expand to.
        parsed.reporting_api_url = parsed.reporting_api_url.filter(|url| !url.trim().is_empty());
        parsed.reporting_auth_token = parsed
            .reporting_auth_token
            .filter(|token| !token.trim().is_empty());

        parsed.validate()?;
        Ok(parsed)
    }

    fn validate(&self) -> Result<(), ReporterConfigError> {
        if self.reporting_enabled && self.reporting_api_url.is_none() {
            return Err(ReporterConfigError::MissingApiUrl);
        }
        if self.queue_capacity == 0 {
            return Err(ReporterConfigError::ZeroQueueCapacity);
        }
        Ok(())
    }
}

/// An error that occurred while loading reporter configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReporterConfigError {
    /// The configuration sources could not be read or merged.
    #[error("failed to build reporter config")]
    Build(#[source] ConfigError),

    /// The merged configuration had an invalid value.
    #[error("failed to parse reporter config")]
    Deserialize(#[source] Box<serde_path_to_error::Error<ConfigError>>),

    /// Reporting is enabled but there is nowhere to send events.
    #[error("reporting is enabled but `reporting-api-url` is not set")]
    MissingApiUrl,

    /// The queue capacity was zero.
    #[error("`queue-capacity` must be at least 1")]
    ZeroQueueCapacity,
}

/// Receives warnings produced while loading configuration.
pub trait ReporterConfigWarnings {
    /// Called with the keys that were present but not recognized.
    fn unknown_config_keys(&mut self, config_file: Option<&Utf8Path>, unknown: &BTreeSet<String>);
}

/// Logs configuration warnings with `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultReporterConfigWarnings;

impl ReporterConfigWarnings for DefaultReporterConfigWarnings {
    fn unknown_config_keys(&mut self, config_file: Option<&Utf8Path>, unknown: &BTreeSet<String>) {
        let keys = unknown.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
        match config_file {
            Some(config_file) => warn!(
                "in reporter config file {config_file}, ignoring unknown configuration keys: {keys}"
            ),
            None => warn!("ignoring unknown reporter configuration keys: {keys}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[derive(Default)]
    struct RecordingWarnings {
        unknown: BTreeSet<String>,
    }

    impl ReporterConfigWarnings for RecordingWarnings {
        fn unknown_config_keys(&mut self, _: Option<&Utf8Path>, unknown: &BTreeSet<String>) {
            self.unknown.extend(unknown.iter().cloned());
        }
    }

    fn load(
        contents: Option<&str>,
        env: &[(&str, &str)],
    ) -> (Result<ReporterConfig, ReporterConfigError>, RecordingWarnings) {
        let dir = Utf8TempDir::new().unwrap();
        let path = dir.path().join("reporter.toml");
        if let Some(contents) = contents {
            std::fs::write(&path, contents).unwrap();
        }
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();

        let mut warnings = RecordingWarnings::default();
        let result = ReporterConfig::load_with(
            contents.map(|_| path.as_path()),
            |var| env.get(var).cloned(),
            &mut warnings,
        );
        (result, warnings)
    }

    #[test]
    fn embedded_defaults_match_default_impl() {
        let (config, warnings) = load(None, &[]);
        let config = config.expect("default config is valid");
        let default = ReporterConfig::default();

        assert!(warnings.unknown.is_empty(), "default config has no unknown keys");
        assert_eq!(config.reporting_enabled, default.reporting_enabled);
        assert_eq!(config.reporting_api_url, default.reporting_api_url);
        assert_eq!(config.request_timeout, default.request_timeout);
        assert_eq!(config.queue_capacity, default.queue_capacity);
    }

    #[test]
    fn file_then_env() {
        let contents = indoc! {r#"
            reporting-enabled = true
            reporting-api-url = "http://collector:8000"
            reporting-auth-token = "from-file"
            request-timeout = "250ms"
        "#};
        let (config, _) = load(
            Some(contents),
            &[
                ("TESTRUN_REPORTING_AUTH_TOKEN", "from-env"),
                ("TESTRUN_QUEUE_CAPACITY", "16"),
            ],
        );
        let config = config.expect("valid config");

        assert!(config.reporting_enabled);
        assert_eq!(config.reporting_api_url.as_deref(), Some("http://collector:8000"));
        assert_eq!(config.reporting_auth_token.as_deref(), Some("from-env"));
        assert_eq!(config.request_timeout, Duration::from_millis(250));
        assert_eq!(config.queue_capacity, 16);
    }

    #[test]
    fn env_enables_reporting() {
        let (config, _) = load(
            None,
            &[
                ("TESTRUN_REPORTING_ENABLED", "true"),
                ("TESTRUN_REPORTING_API_URL", "http://localhost:8000"),
            ],
        );
        let config = config.expect("valid config");
        assert!(config.reporting_enabled);
        assert_eq!(config.reporting_auth_token, None);
    }

    #[test]
    fn unknown_keys_are_reported() {
        let contents = indoc! {r#"
            reporting-enabled = false
            reporting-url = "typo"
        "#};
        let (config, warnings) = load(Some(contents), &[]);
        config.expect("unknown keys are not fatal");
        assert_eq!(
            warnings.unknown.into_iter().collect::<Vec<_>>(),
            vec!["reporting-url".to_owned()]
        );
    }

    #[test]
    fn enabled_without_url_is_an_error() {
        let (config, _) = load(
            None,
            &[
                ("TESTRUN_REPORTING_ENABLED", "true"),
                ("TESTRUN_REPORTING_API_URL", ""),
            ],
        );
        assert!(
            matches!(config, Err(ReporterConfigError::MissingApiUrl)),
            "{config:?}"
        );
    }

    #[test]
    fn debug_output_redacts_token() {
        let config = ReporterConfig {
            reporting_auth_token: Some("hunter2".to_owned()),
            ..ReporterConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"), "{debug}");
        assert!(debug.contains("<redacted>"), "{debug}");
    }
}
