// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collector configuration.

use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;
use std::{collections::BTreeSet, net::SocketAddr};
use thiserror::Error;

/// The embedded default configuration.
pub const DEFAULT_COLLECTOR_CONFIG: &str = include_str!("../default-collector-config.toml");

static ENV_OVERRIDES: &[(&str, &str)] = &[
    ("listen-addr", "TESTRUN_LISTEN_ADDR"),
    ("store-dir", "TESTRUN_STORE_DIR"),
    ("compact-on-shutdown", "TESTRUN_COMPACT_ON_SHUTDOWN"),
];

/// Configuration for the collector.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct CollectorConfig {
    /// The address the HTTP API listens on.
    pub listen_addr: SocketAddr,
    /// The directory records are persisted in.
    pub store_dir: Utf8PathBuf,
    /// Whether to compact the store on clean shutdown.
    pub compact_on_shutdown: bool,
}

/// A loaded configuration, along with the keys that weren't recognized.
#[derive(Clone, Debug)]
pub struct LoadedConfig {
    /// The configuration.
    pub config: CollectorConfig,
    /// Keys present in some source but not recognized.
    pub unknown_keys: BTreeSet<String>,
}

impl CollectorConfig {
    /// Loads configuration from the defaults, `config_file` if given, and the
    /// process environment.
    pub fn load(config_file: Option<&Utf8Path>) -> Result<LoadedConfig, CollectorConfigError> {
        Self::load_with(config_file, |var| std::env::var(var).ok())
    }

    /// Loads configuration with a custom environment lookup.
    pub fn load_with(
        config_file: Option<&Utf8Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<LoadedConfig, CollectorConfigError> {
        let mut builder = Config::builder()
            .add_source(File::from_str(DEFAULT_COLLECTOR_CONFIG, FileFormat::Toml));
        if let Some(config_file) = config_file {
            builder = builder.add_source(File::new(config_file.as_str(), FileFormat::Toml));
        }
        for (key, var) in ENV_OVERRIDES {
            if let Some(value) = env(var) {
                builder = builder
                    .set_override(*key, value)
                    .map_err(|error| CollectorConfigError::build(config_file, error))?;
            }
        }
        let config = builder
            .build()
            .map_err(|error| CollectorConfigError::build(config_file, error))?;

        let mut unknown_keys = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            unknown_keys.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: Self = serde_path_to_error::deserialize(ignored_de).map_err(|error| {
            CollectorConfigError::Deserialize {
                config_file: config_file.map(ToOwned::to_owned),
                error: Box::new(error),
            }
        })?;

        Ok(LoadedConfig {
            config,
            unknown_keys,
        })
    }
}

/// An error that occurred while loading collector configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CollectorConfigError {
    /// The configuration sources could not be read or merged.
    #[error("failed to read collector config{}", display_file(.config_file))]
    Build {
        /// The config file, if one was given.
        config_file: Option<Utf8PathBuf>,
        /// The underlying error.
        #[source]
        error: ConfigError,
    },

    /// The merged configuration had an invalid value.
    #[error("failed to parse collector config{}", display_file(.config_file))]
    Deserialize {
        /// The config file, if one was given.
        config_file: Option<Utf8PathBuf>,
        /// The underlying error, with the path to the offending key.
        #[source]
        error: Box<serde_path_to_error::Error<ConfigError>>,
    },
}

impl CollectorConfigError {
    fn build(config_file: Option<&Utf8Path>, error: ConfigError) -> Self {
        Self::Build {
            config_file: config_file.map(ToOwned::to_owned),
            error,
        }
    }
}

fn display_file(config_file: &Option<Utf8PathBuf>) -> String {
    config_file
        .as_ref()
        .map(|file| format!(" at `{file}`"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let loaded = CollectorConfig::load_with(None, |_| None).expect("defaults are valid");
        assert_eq!(
            loaded.config,
            CollectorConfig {
                listen_addr: "127.0.0.1:8000".parse().unwrap(),
                store_dir: "testrun-store".into(),
                compact_on_shutdown: true,
            }
        );
        assert!(loaded.unknown_keys.is_empty());
    }

    #[test]
    fn file_then_env() {
        let dir = Utf8TempDir::new().unwrap();
        let path = dir.path().join("collector.toml");
        std::fs::write(
            &path,
            indoc! {r#"
                listen-addr = "0.0.0.0:9000"
                store-dir = "/var/lib/testrun"
                retention = "30d"
            "#},
        )
        .unwrap();

        let loaded = CollectorConfig::load_with(Some(&path), |var| match var {
            "TESTRUN_STORE_DIR" => Some("/srv/testrun".to_owned()),
            "TESTRUN_COMPACT_ON_SHUTDOWN" => Some("false".to_owned()),
            _ => None,
        })
        .expect("valid config");

        assert_eq!(loaded.config.listen_addr, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(loaded.config.store_dir, "/srv/testrun");
        assert!(!loaded.config.compact_on_shutdown);
        assert_eq!(
            loaded.unknown_keys.into_iter().collect::<Vec<_>>(),
            vec!["retention".to_owned()]
        );
    }

    #[test]
    fn invalid_listen_addr() {
        let error = CollectorConfig::load_with(None, |var| {
            (var == "TESTRUN_LISTEN_ADDR").then(|| "not-an-address".to_owned())
        })
        .expect_err("address is invalid");

        let CollectorConfigError::Deserialize { error, .. } = error else {
            panic!("expected a deserialize error, found {error:?}");
        };
        assert_eq!(error.path().to_string(), "listen-addr");
    }
}
