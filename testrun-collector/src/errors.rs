// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{config::CollectorConfigError, output::StderrStyles};
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use std::{error::Error, net::SocketAddr};
use testrun_metadata::TestrunExitCode;
use testrun_store::{JournalError, StoreError};
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// The #[error()] strings are placeholders; errors are meant to be printed with
// display_to_stderr, which adds styling and the cause chain.

/// An error that the collector expects and reports with a dedicated exit code.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("config load error")]
    ConfigLoad {
        #[from]
        err: CollectorConfigError,
    },
    #[error("store open error")]
    StoreOpen {
        store_dir: Utf8PathBuf,
        #[source]
        err: JournalError,
    },
    #[error("store operation error")]
    StoreOperation {
        operation: &'static str,
        #[source]
        err: StoreError,
    },
    #[error("reset not confirmed")]
    ResetNotConfirmed,
    #[error("runtime build error")]
    RuntimeBuild {
        #[source]
        err: std::io::Error,
    },
    #[error("bind error")]
    Bind {
        addr: SocketAddr,
        #[source]
        err: std::io::Error,
    },
    #[error("serve error")]
    Serve {
        #[source]
        err: std::io::Error,
    },
    #[error("write output error")]
    WriteOutput {
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    pub(crate) fn store_open(store_dir: impl Into<Utf8PathBuf>, err: JournalError) -> Self {
        Self::StoreOpen {
            store_dir: store_dir.into(),
            err,
        }
    }

    pub(crate) fn store_operation(operation: &'static str, err: StoreError) -> Self {
        Self::StoreOperation { operation, err }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::ConfigLoad { .. } | Self::ResetNotConfirmed => TestrunExitCode::SETUP_ERROR,
            Self::StoreOpen { .. } | Self::StoreOperation { .. } => TestrunExitCode::STORE_ERROR,
            Self::RuntimeBuild { .. } | Self::Bind { .. } | Self::Serve { .. } => {
                TestrunExitCode::SERVER_ERROR
            }
            Self::WriteOutput { .. } => TestrunExitCode::WRITE_OUTPUT_ERROR,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::ConfigLoad { err } => {
                error!("{}", err);
                err.source()
            }
            Self::StoreOpen { store_dir, err } => {
                error!("failed to open store at `{}`", store_dir.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::StoreOperation { operation, err } => {
                error!("failed to {} store", operation);
                Some(err as &dyn Error)
            }
            Self::ResetNotConfirmed => {
                error!(
                    "resetting deletes every run and test; pass {} to confirm",
                    "--yes".style(styles.bold)
                );
                None
            }
            Self::RuntimeBuild { err } => {
                error!("failed to start the async runtime");
                Some(err as &dyn Error)
            }
            Self::Bind { addr, err } => {
                error!("failed to listen on {}", addr.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::Serve { err } => {
                error!("server exited with an error");
                Some(err as &dyn Error)
            }
            Self::WriteOutput { err } => {
                error!("failed to write output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: "testrun_collector::no_heading", "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn io_error() -> std::io::Error {
        std::io::Error::other("boom")
    }

    #[test_case(ExpectedError::ResetNotConfirmed, TestrunExitCode::SETUP_ERROR ; "reset not confirmed")]
    #[test_case(
        ExpectedError::Bind { addr: "127.0.0.1:0".parse().unwrap(), err: io_error() },
        TestrunExitCode::SERVER_ERROR
        ; "bind"
    )]
    #[test_case(
        ExpectedError::store_operation("compact", StoreError::InvalidRequest { message: "x".to_owned() }),
        TestrunExitCode::STORE_ERROR
        ; "store operation"
    )]
    #[test_case(ExpectedError::WriteOutput { err: io_error() }, TestrunExitCode::WRITE_OUTPUT_ERROR ; "write output")]
    fn exit_codes(error: ExpectedError, expected: i32) {
        assert_eq!(error.process_exit_code(), expected);
    }
}
